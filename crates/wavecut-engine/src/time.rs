//! Conversions between track time (seconds) and sample positions.
//!
//! Every conversion rounds half-up: `round(t * rate)`. Sample positions are
//! signed so that offsets to the left of zero stay representable while an edit
//! is in flight.

/// Signed sample position or count on the track timeline.
pub type SampleCount = i64;

#[inline]
pub fn time_to_samples(time: f64, rate: f64) -> SampleCount {
    (time * rate + 0.5).floor() as SampleCount
}

#[inline]
pub fn samples_to_time(samples: SampleCount, rate: f64) -> f64 {
    samples as f64 / rate
}

/// Snaps `time` to the nearest sample boundary.
#[inline]
pub fn quantize(time: f64, rate: f64) -> f64 {
    samples_to_time(time_to_samples(time, rate), rate)
}
