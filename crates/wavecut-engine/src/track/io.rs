use super::Track;
use crate::error::{ensure_ordered, Result};
use crate::format::SampleFormat;
use crate::time::SampleCount;

/// What `Track::get` writes where no clip has audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillMode {
    Zero,
    Constant(f32),
}

impl FillMode {
    fn value(self) -> f32 {
        match self {
            FillMode::Zero => 0.0,
            FillMode::Constant(value) => value,
        }
    }
}

impl Default for FillMode {
    fn default() -> Self {
        FillMode::Zero
    }
}

impl Track {
    /// Appends to the rightmost clip, creating one at the track offset on an
    /// empty track. Samples the storage accepted before a failure are kept.
    pub fn append(&mut self, samples: &[f32]) -> Result<()> {
        self.rightmost_or_new_clip().append(samples)
    }

    pub fn flush(&mut self) -> Result<()> {
        for clip in &mut self.clips {
            clip.flush()?;
        }
        Ok(())
    }

    /// Reads `buffer.len()` samples starting at track sample `start`.
    ///
    /// Positions without audio receive `fill`. When `may_throw` is false a
    /// failed clip read fills its span instead and the call returns
    /// `Ok(false)`.
    pub fn get(
        &self,
        buffer: &mut [f32],
        start: SampleCount,
        fill: FillMode,
        may_throw: bool,
    ) -> Result<bool> {
        let len = buffer.len() as SampleCount;
        let end = start + len;
        let covered = self
            .clips
            .iter()
            .any(|clip| start >= clip.start_sample() && end <= clip.end_sample());
        if !covered {
            buffer.fill(fill.value());
        }

        let mut complete = true;
        for clip in &self.clips {
            let clip_start = clip.start_sample();
            let clip_end = clip.end_sample();
            if clip_end <= start || clip_start >= end {
                continue;
            }
            let (from, read_start) = if clip_start > start {
                ((clip_start - start) as usize, 0u64)
            } else {
                (0usize, (start - clip_start) as u64)
            };
            let trailing = (end - clip_end).max(0) as usize;
            let to = buffer.len() - trailing;
            let span = &mut buffer[from..to];
            if let Err(err) = clip.read(read_start, span) {
                if may_throw {
                    return Err(err);
                }
                tracing::warn!(%err, clip = %clip.id(), "clip read failed, filling span");
                span.fill(fill.value());
                complete = false;
            }
        }
        Ok(complete)
    }

    /// Like [`Track::get`] but encodes the result into `out` as `format`.
    pub fn get_encoded(
        &self,
        out: &mut Vec<u8>,
        format: SampleFormat,
        start: SampleCount,
        len: usize,
        may_throw: bool,
    ) -> Result<bool> {
        let mut samples = vec![0.0; len];
        let complete = self.get(&mut samples, start, FillMode::Zero, may_throw)?;
        out.clear();
        format.encode(&samples, out);
        Ok(complete)
    }

    /// Overwrites samples from track sample `start` in every clip the buffer
    /// overlaps. Gaps between clips are skipped.
    pub fn set(&mut self, buffer: &[f32], start: SampleCount) -> Result<()> {
        let end = start + buffer.len() as SampleCount;
        for clip in &mut self.clips {
            let clip_start = clip.start_sample();
            let clip_end = clip.end_sample();
            if clip_end <= start || clip_start >= end {
                continue;
            }
            let (from, write_start) = if clip_start > start {
                ((clip_start - start) as usize, 0u64)
            } else {
                (0usize, (start - clip_start) as u64)
            };
            let trailing = (end - clip_end).max(0) as usize;
            clip.write(write_start, &buffer[from..buffer.len() - trailing])?;
        }
        Ok(())
    }

    /// Envelope gain for each sample from `t0`, 1.0 where there is no clip.
    pub fn envelope_values(&self, buffer: &mut [f64], t0: f64) {
        buffer.fill(1.0);
        let rate = self.rate_f64();
        let len = buffer.len();
        let t_end = t0 + len as f64 / rate;
        for clip in &self.clips {
            let clip_start = clip.start_time();
            let clip_end = clip.end_time();
            if clip_start >= t_end || clip_end <= t0 {
                continue;
            }
            let mut from = 0usize;
            let mut count = len;
            let mut rt0 = t0;
            if rt0 < clip_start {
                let skip = (((clip_start - rt0) * rate) + 0.5).floor() as usize;
                from = skip.min(len);
                count -= from;
                rt0 = clip_start;
            }
            if rt0 + count as f64 / rate > clip_end {
                let inside = (((clip_end - rt0) * rate) + 0.5).floor().max(0.0) as usize;
                count = count.min(inside);
            }
            clip.envelope_values(&mut buffer[from..from + count], rt0);
        }
    }

    /// Smallest and largest sample within `[t0, t1]`; `(0, 0)` when no clip
    /// has audio there.
    pub fn min_max(&self, t0: f64, t1: f64, may_throw: bool) -> Result<(f32, f32)> {
        if t0 > t1 {
            if may_throw {
                ensure_ordered(t0, t1)?;
            }
            return Ok((0.0, 0.0));
        }
        if t0 == t1 {
            return Ok((0.0, 0.0));
        }
        let mut range: Option<(f32, f32)> = None;
        for clip in &self.clips {
            if t1 < clip.start_time() || t0 > clip.end_time() {
                continue;
            }
            match clip.min_max(t0, t1) {
                Ok(Some((lo, hi))) => {
                    range = Some(match range {
                        Some((min, max)) => (min.min(lo), max.max(hi)),
                        None => (lo, hi),
                    });
                }
                Ok(None) => {}
                Err(err) if may_throw => return Err(err),
                Err(err) => tracing::warn!(%err, clip = %clip.id(), "skipping unreadable clip"),
            }
        }
        Ok(range.unwrap_or((0.0, 0.0)))
    }

    /// Root mean square over `[t0, t1]`; 0 when no clip has audio there.
    pub fn rms(&self, t0: f64, t1: f64, may_throw: bool) -> Result<f32> {
        if t0 > t1 {
            if may_throw {
                ensure_ordered(t0, t1)?;
            }
            return Ok(0.0);
        }
        if t0 == t1 {
            return Ok(0.0);
        }
        let mut sum = 0.0f64;
        let mut count = 0u64;
        for clip in &self.clips {
            if t1 < clip.start_time() || t0 > clip.end_time() {
                continue;
            }
            match clip.sum_of_squares(t0, t1) {
                Ok((clip_sum, clip_count)) => {
                    sum += clip_sum;
                    count += clip_count;
                }
                Err(err) if may_throw => return Err(err),
                Err(err) => tracing::warn!(%err, clip = %clip.id(), "skipping unreadable clip"),
            }
        }
        if count == 0 {
            return Ok(0.0);
        }
        Ok((sum / count as f64).sqrt() as f32)
    }

    /// Track sample at which the storage block holding `sample` begins.
    pub fn block_start(&self, sample: SampleCount) -> Option<SampleCount> {
        self.clips.iter().find_map(|clip| {
            let start = clip.start_sample();
            if sample < start || sample >= clip.end_sample() {
                return None;
            }
            clip.sequence()
                .block_start((sample - start) as u64)
                .map(|block| start + block as SampleCount)
        })
    }

    /// Preferred read length starting at `sample`.
    pub fn best_block_size(&self, sample: SampleCount) -> usize {
        self.clips
            .iter()
            .find_map(|clip| {
                let start = clip.start_sample();
                if sample < start || sample >= clip.end_sample() {
                    return None;
                }
                Some(clip.sequence().best_block_size((sample - start) as u64))
            })
            .unwrap_or_else(|| self.max_block_size())
    }

    pub fn max_block_size(&self) -> usize {
        self.clips
            .iter()
            .map(|clip| clip.sequence().max_block_size())
            .max()
            .unwrap_or_else(|| self.storage.max_block_size(self.format))
    }

    pub fn ideal_block_size(&self) -> usize {
        self.clips
            .last()
            .map(|clip| clip.sequence().ideal_block_size())
            .unwrap_or_else(|| self.storage.max_block_size(self.format))
    }
}
