use super::Clip;
use crate::error::{EditError, Result};
use crate::format::SampleFormat;
use crate::time;

impl Clip {
    /// Deletes `[t0, t1)` from the clip. Cut lines inside the region are
    /// dropped and later ones move left with the audio.
    pub fn clear(&mut self, t0: f64, t1: f64) -> Result<()> {
        let s0 = self.time_to_samples_clip(t0);
        let s1 = self.time_to_samples_clip(t1).max(s0);
        let removed = t1.min(self.end_time()) - t0.max(self.start_time());

        self.sequence.delete(s0, s1 - s0)?;

        self.drop_cut_lines_in(t0, t1, removed.max(0.0));
        let rate = self.rate_f64();
        self.envelope
            .collapse_region(s0 as f64 / rate, s1 as f64 / rate);
        self.sync_envelope_len();
        if t0 < self.start_time() {
            self.offset = t0;
        }
        Ok(())
    }

    /// Deletes `[t0, t1)` like [`Clip::clear`] but keeps the removed span as
    /// a cut line at the deletion point.
    pub fn clear_and_add_cut_line(&mut self, t0: f64, t1: f64) -> Result<()> {
        if t0 > self.end_time() || t1 < self.start_time() {
            return Ok(());
        }
        let clip_t0 = t0.max(self.start_time());
        let clip_t1 = t1.min(self.end_time());

        let mut cut = self.duplicate_range(clip_t0, clip_t1, true)?;
        let s0 = self.time_to_samples_clip(t0);
        let s1 = self.time_to_samples_clip(t1).max(s0);
        self.sequence.delete(s0, s1 - s0)?;

        cut.offset = s0 as f64 / self.rate_f64();
        self.drop_cut_lines_in(t0, t1, clip_t1 - clip_t0);
        let rate = self.rate_f64();
        self.envelope
            .collapse_region(s0 as f64 / rate, s1 as f64 / rate);
        self.sync_envelope_len();
        if t0 < self.start_time() {
            self.offset = t0;
        }
        self.cut_lines.push(cut);
        Ok(())
    }

    /// Splices `other` into this clip at track time `t0`.
    ///
    /// A copy of `other` is resampled and converted first when its rate or
    /// format differ. Cut lines of `other` come along; existing cut lines at
    /// or after `t0` move right by the pasted duration.
    pub fn paste(&mut self, t0: f64, other: &Clip) -> Result<()> {
        let converted;
        let source = if other.rate != self.rate || other.format() != self.format() {
            let mut copy = other.duplicate(true)?;
            copy.resample(self.rate)?;
            copy.convert_format(self.format())?;
            converted = copy;
            &converted
        } else {
            other
        };

        let s0 = self.time_to_samples_clip(t0);
        let at = s0 as f64 / self.rate_f64();
        let mut new_cut_lines = Vec::with_capacity(source.cut_lines.len());
        for cut in &source.cut_lines {
            let mut copy = cut.duplicate(true)?;
            copy.offset += at;
            new_cut_lines.push(copy);
        }

        self.sequence.paste(s0, source.sequence.as_ref())?;

        self.envelope.paste(at, &source.envelope);
        self.offset_cut_lines(self.offset + at, source.duration());
        self.cut_lines.extend(new_cut_lines);
        self.sync_envelope_len();
        Ok(())
    }

    /// Inserts `len` seconds of silence at track time `t`.
    pub fn insert_silence(&mut self, t: f64, len: f64) -> Result<()> {
        let (at, inserted) = self.insert_silent_samples(t, len)?;
        self.envelope.insert_space(at, inserted);
        self.sync_envelope_len();
        Ok(())
    }

    /// Appends `len` seconds of silence, ramping the envelope to `value`
    /// across it.
    pub fn append_silence(&mut self, len: f64, value: f64) -> Result<()> {
        let end = self.end_time();
        let (_, inserted) = self.insert_silent_samples(end, len)?;
        self.envelope.extend_with_ramp(inserted, value);
        self.sync_envelope_len();
        Ok(())
    }

    fn insert_silent_samples(&mut self, t: f64, len: f64) -> Result<(f64, f64)> {
        if len < 0.0 {
            return Err(EditError::InvalidInput("negative silence length"));
        }
        let rate = self.rate_f64();
        let s0 = self.time_to_samples_clip(t);
        let count = time::time_to_samples(len, rate).max(0) as u64;
        self.sequence.insert_silence(s0, count)?;
        let at = s0 as f64 / rate;
        let inserted = count as f64 / rate;
        self.offset_cut_lines(self.offset + at, inserted);
        Ok((at, inserted))
    }

    /// Zeroes the samples within `[t0, t1)`.
    pub fn set_silence(&mut self, t0: f64, t1: f64) -> Result<()> {
        let s0 = self.time_to_samples_clip(t0);
        let s1 = self.time_to_samples_clip(t1);
        if s1 > s0 {
            self.sequence.set_silence(s0, s1 - s0)?;
        }
        Ok(())
    }

    /// Converts the samples to `rate`, keeping the clip's duration.
    pub fn resample(&mut self, rate: u32) -> Result<()> {
        if rate == self.rate {
            return Ok(());
        }
        self.sequence.resample(self.rate, rate)?;
        self.rate = rate;
        self.sync_envelope_len();
        Ok(())
    }

    /// Reinterprets the samples at `rate` without converting them. Cut lines
    /// follow, their offsets scaled to stay on the same samples.
    pub fn set_rate(&mut self, rate: u32) {
        let ratio = self.rate as f64 / rate as f64;
        self.rate = rate;
        let duration = self.duration();
        self.envelope.rescale_times(duration);
        for cut in &mut self.cut_lines {
            cut.set_rate(rate);
            cut.offset *= ratio;
        }
    }

    pub fn convert_format(&mut self, format: SampleFormat) -> Result<()> {
        self.sequence.convert_format(format)?;
        for cut in &mut self.cut_lines {
            cut.convert_format(format)?;
        }
        Ok(())
    }

    fn drop_cut_lines_in(&mut self, t0: f64, t1: f64, removed: f64) {
        let offset = self.offset;
        self.cut_lines.retain(|cut| {
            let position = offset + cut.offset;
            position < t0 || position > t1
        });
        for cut in &mut self.cut_lines {
            if offset + cut.offset >= t1 {
                cut.offset -= removed;
            }
        }
    }
}
