mod cut_line;
mod edit;

pub use cut_line::CUT_LINE_TOLERANCE;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::Result;
use crate::format::SampleFormat;
use crate::storage::SampleSequence;
use crate::time::{self, SampleCount};

static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle of a clip. Duplicates always receive a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(u64);

impl ClipId {
    fn next() -> Self {
        Self(NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}

/// A time-positioned run of samples with its own envelope and the cut lines
/// stashed inside it.
///
/// Cut lines are owned by their parent; their offsets are relative to the
/// parent's start.
#[derive(Debug)]
pub struct Clip {
    id: ClipId,
    offset: f64,
    rate: u32,
    sequence: Box<dyn SampleSequence>,
    envelope: Envelope,
    cut_lines: Vec<Clip>,
    placeholder: bool,
}

/// Serializable view of a clip for persistence and inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSummary {
    pub id: ClipId,
    pub offset: f64,
    pub rate: u32,
    pub num_samples: u64,
    pub placeholder: bool,
    pub cut_lines: Vec<ClipSummary>,
}

impl Clip {
    pub fn new(sequence: Box<dyn SampleSequence>, rate: u32) -> Self {
        let duration = sequence.num_samples() as f64 / rate as f64;
        Self {
            id: ClipId::next(),
            offset: 0.0,
            rate,
            sequence,
            envelope: Envelope::default().with_track_len(duration),
            cut_lines: Vec::new(),
            placeholder: false,
        }
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub(crate) fn rate_f64(&self) -> f64 {
        self.rate as f64
    }

    pub fn format(&self) -> SampleFormat {
        self.sequence.format()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    /// Moves the clip by `delta` seconds.
    pub fn shift(&mut self, delta: f64) {
        self.offset += delta;
    }

    pub fn num_samples(&self) -> u64 {
        self.sequence.num_samples()
    }

    pub fn duration(&self) -> f64 {
        self.num_samples() as f64 / self.rate_f64()
    }

    pub fn start_time(&self) -> f64 {
        self.offset
    }

    pub fn end_time(&self) -> f64 {
        self.offset + self.duration()
    }

    pub fn start_sample(&self) -> SampleCount {
        time::time_to_samples(self.offset, self.rate_f64())
    }

    pub fn end_sample(&self) -> SampleCount {
        self.start_sample() + self.num_samples() as SampleCount
    }

    /// Clip-relative sample index of track time `t`, clamped to the clip.
    pub fn time_to_samples_clip(&self, t: f64) -> u64 {
        if t < self.offset {
            return 0;
        }
        if t > self.end_time() {
            return self.num_samples();
        }
        let samples = time::time_to_samples(t - self.offset, self.rate_f64());
        (samples.max(0) as u64).min(self.num_samples())
    }

    /// True when `t` lies at or before the first sample.
    pub fn before_clip(&self, t: f64) -> bool {
        time::time_to_samples(t, self.rate_f64()) <= self.start_sample()
    }

    /// True when `t` lies at or after the end.
    pub fn after_clip(&self, t: f64) -> bool {
        time::time_to_samples(t, self.rate_f64()) >= self.end_sample()
    }

    /// True when `t` lies strictly inside the clip.
    pub fn within_clip(&self, t: f64) -> bool {
        let ts = time::time_to_samples(t, self.rate_f64());
        ts > self.start_sample() && ts < self.end_sample()
    }

    /// Whether `next` starts within a hundredth of a sample of this clip's end.
    pub fn shares_boundary_with_next(&self, next: &Clip) -> bool {
        let this_end = self.rate_f64() * self.offset + self.num_samples() as f64;
        let next_start = next.rate_f64() * next.offset;
        (next_start - this_end).abs() < 0.01
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn set_placeholder(&mut self, placeholder: bool) {
        self.placeholder = placeholder;
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    pub fn sequence(&self) -> &dyn SampleSequence {
        self.sequence.as_ref()
    }

    pub fn duplicate(&self, copy_cut_lines: bool) -> Result<Clip> {
        let sequence = self.sequence.copy_range(0, self.num_samples())?;
        let cut_lines = if copy_cut_lines {
            self.cut_lines
                .iter()
                .map(|cut| cut.duplicate(true))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Ok(Clip {
            id: ClipId::next(),
            offset: self.offset,
            rate: self.rate,
            sequence,
            envelope: self.envelope.clone(),
            cut_lines,
            placeholder: self.placeholder,
        })
    }

    /// Copy of the `[t0, t1)` portion. The copy starts where the copied
    /// material started on the track; cut lines inside the range come along
    /// when requested.
    pub fn duplicate_range(&self, t0: f64, t1: f64, copy_cut_lines: bool) -> Result<Clip> {
        let s0 = self.time_to_samples_clip(t0);
        let s1 = self.time_to_samples_clip(t1).max(s0);
        let rate = self.rate_f64();
        let sequence = self.sequence.copy_range(s0, s1)?;
        let start = self.offset + s0 as f64 / rate;

        let mut cut_lines = Vec::new();
        if copy_cut_lines {
            for cut in &self.cut_lines {
                let position = self.offset + cut.offset;
                if position >= t0 && position <= t1 {
                    let mut copy = cut.duplicate(true)?;
                    copy.offset = position - start;
                    cut_lines.push(copy);
                }
            }
        }

        Ok(Clip {
            id: ClipId::next(),
            offset: start,
            rate: self.rate,
            sequence,
            envelope: self
                .envelope
                .copy_range(s0 as f64 / rate, s1 as f64 / rate),
            cut_lines,
            placeholder: false,
        })
    }

    /// Reads clip-relative samples.
    pub fn read(&self, start: u64, out: &mut [f32]) -> Result<()> {
        self.sequence.read(start, out)?;
        Ok(())
    }

    pub fn write(&mut self, start: u64, samples: &[f32]) -> Result<()> {
        self.sequence.write(start, samples)?;
        Ok(())
    }

    /// Appends samples at the end. On failure whatever the storage accepted
    /// stays in place.
    pub fn append(&mut self, samples: &[f32]) -> Result<()> {
        let result = self.sequence.append(samples);
        self.sync_envelope_len();
        result?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sequence.flush()?;
        Ok(())
    }

    /// Envelope gain for consecutive samples starting at track time `t0`.
    pub fn envelope_values(&self, buffer: &mut [f64], t0: f64) {
        self.envelope
            .values(buffer, t0 - self.offset, 1.0 / self.rate_f64());
    }

    pub fn min_max(&self, t0: f64, t1: f64) -> Result<Option<(f32, f32)>> {
        let Some(samples) = self.samples_between(t0, t1)? else {
            return Ok(None);
        };
        let range = samples
            .iter()
            .fold((f32::MAX, f32::MIN), |(min, max), &sample| {
                (min.min(sample), max.max(sample))
            });
        Ok(Some(range))
    }

    pub fn rms(&self, t0: f64, t1: f64) -> Result<f32> {
        let (sum, count) = self.sum_of_squares(t0, t1)?;
        if count == 0 {
            return Ok(0.0);
        }
        Ok((sum / count as f64).sqrt() as f32)
    }

    pub(crate) fn sum_of_squares(&self, t0: f64, t1: f64) -> Result<(f64, u64)> {
        let Some(samples) = self.samples_between(t0, t1)? else {
            return Ok((0.0, 0));
        };
        let sum = samples
            .iter()
            .map(|&sample| sample as f64 * sample as f64)
            .sum();
        Ok((sum, samples.len() as u64))
    }

    fn samples_between(&self, t0: f64, t1: f64) -> Result<Option<Vec<f32>>> {
        let s0 = self.time_to_samples_clip(t0);
        let s1 = self.time_to_samples_clip(t1);
        if s1 <= s0 {
            return Ok(None);
        }
        let mut samples = vec![0.0; (s1 - s0) as usize];
        self.read(s0, &mut samples)?;
        Ok(Some(samples))
    }

    pub fn summary(&self) -> ClipSummary {
        ClipSummary {
            id: self.id,
            offset: self.offset,
            rate: self.rate,
            num_samples: self.num_samples(),
            placeholder: self.placeholder,
            cut_lines: self.cut_lines.iter().map(Clip::summary).collect(),
        }
    }

    pub(crate) fn lock(&self) {
        self.sequence.lock();
    }

    pub(crate) fn unlock(&self) {
        self.sequence.unlock();
    }

    pub(crate) fn close_lock(&self) {
        self.sequence.close_lock();
    }

    fn sync_envelope_len(&mut self) {
        let duration = self.duration();
        self.envelope.set_track_len(duration);
    }
}
