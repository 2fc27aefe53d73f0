use super::Track;
use crate::clip::{Clip, ClipId};
use crate::error::{ensure_ordered, EditError, Result};
use crate::time;

impl Track {
    /// Removes the audio in `[t0, t1)`.
    ///
    /// Every clip touching the region is replaced by edited duplicates built
    /// before the collection changes, so a failure leaves the track as it
    /// was. `add_cut_lines` keeps the removed audio as a cut line, but only
    /// when the region lies inside a single clip. `split` leaves a gap
    /// instead of closing it.
    pub fn handle_clear(
        &mut self,
        t0: f64,
        t1: f64,
        add_cut_lines: bool,
        split: bool,
    ) -> Result<()> {
        ensure_ordered(t0, t1)?;
        let add_cut_lines = add_cut_lines
            && !self.clips.iter().any(|clip| {
                !clip.before_clip(t1)
                    && !clip.after_clip(t0)
                    && (clip.before_clip(t0) || clip.after_clip(t1))
            });

        let mut removed: Vec<ClipId> = Vec::new();
        let mut added: Vec<Clip> = Vec::new();
        for clip in &self.clips {
            if clip.before_clip(t0) && clip.after_clip(t1) {
                removed.push(clip.id());
                continue;
            }
            if clip.before_clip(t1) || clip.after_clip(t0) {
                continue;
            }
            removed.push(clip.id());

            if add_cut_lines {
                let mut copy = clip.duplicate(true)?;
                copy.clear_and_add_cut_line(t0, t1)?;
                added.push(copy);
            } else if split {
                if !clip.after_clip(t1) {
                    let mut right = clip.duplicate(true)?;
                    right.clear(clip.start_time(), t1)?;
                    right.shift(t1 - clip.start_time());
                    added.push(right);
                }
                if !clip.before_clip(t0) {
                    let mut left = clip.duplicate(true)?;
                    left.clear(t0, clip.end_time())?;
                    added.push(left);
                }
            } else {
                let mut copy = clip.duplicate(true)?;
                copy.clear(t0, t1)?;
                added.push(copy);
            }
        }
        added.retain(|clip| clip.num_samples() > 0);

        if !split && self.config.clips_can_move {
            for clip in &mut self.clips {
                if clip.before_clip(t1) {
                    clip.shift(-(t1 - t0));
                }
            }
        }
        tracing::debug!(
            t0,
            t1,
            removed = removed.len(),
            added = added.len(),
            "cleared region"
        );
        self.clips.retain(|clip| !removed.contains(&clip.id()));
        self.clips.extend(added);
        Ok(())
    }

    /// Deletes `[t0, t1)`, closing the gap when clips can move.
    pub fn clear(&mut self, t0: f64, t1: f64) -> Result<()> {
        self.handle_clear(t0, t1, false, false)
    }

    /// Deletes `[t0, t1)` and leaves the space empty.
    pub fn split_delete(&mut self, t0: f64, t1: f64) -> Result<()> {
        self.handle_clear(t0, t1, false, true)
    }

    pub fn clear_and_add_cut_line(&mut self, t0: f64, t1: f64) -> Result<()> {
        self.handle_clear(t0, t1, true, false)
    }

    /// Splits the clip containing `t` at the nearest sample boundary. The
    /// left part keeps the clip's identity.
    pub fn split_at(&mut self, t: f64) -> Result<()> {
        let Some(index) = self.clips.iter().position(|clip| clip.within_clip(t)) else {
            return Ok(());
        };
        let rate = self.rate_f64();
        let t = time::quantize(t, rate);
        let clip = &self.clips[index];
        let start = clip.start_time();
        let end = clip.end_time();

        let mut right = clip.duplicate(true)?;
        right.clear(start, t)?;
        let here = time::time_to_samples(t - start, rate);
        right.shift(time::samples_to_time(here, rate));

        self.clips[index].clear(t, end)?;
        tracing::debug!(t, left = %self.clips[index].id(), right = %right.id(), "split clip");
        self.clips.push(right);
        Ok(())
    }

    pub fn split(&mut self, t0: f64, t1: f64) -> Result<()> {
        self.split_at(t0)?;
        if t0 != t1 {
            self.split_at(t1)?;
        }
        Ok(())
    }

    /// Copies `[t0, t1)` into a new track whose time zero is `t0`.
    ///
    /// Clipboard copies leave cut lines behind and, when the material ends
    /// more than a sample short of `t1 - t0`, carry a placeholder clip for
    /// the trailing silence.
    pub fn copy(&self, t0: f64, t1: f64, for_clipboard: bool) -> Result<Track> {
        ensure_ordered(t0, t1)?;
        let mut out = self.empty_like();
        out.offset = 0.0;

        for clip in &self.clips {
            if t0 <= clip.start_time() && t1 >= clip.end_time() {
                let mut copy = clip.duplicate(!for_clipboard)?;
                copy.shift(-t0);
                out.clips.push(copy);
            } else if t1 > clip.start_time() && t0 < clip.end_time() {
                let clip_t0 = t0.max(clip.start_time());
                let clip_t1 = t1.min(clip.end_time());
                let mut copy = clip.duplicate_range(clip_t0, clip_t1, !for_clipboard)?;
                copy.shift(-t0);
                if copy.offset() < 0.0 {
                    copy.set_offset(0.0);
                }
                if copy.num_samples() > 0 {
                    out.clips.push(copy);
                }
            }
        }

        if for_clipboard {
            let end = out.end_time();
            if end + 1.0 / self.rate_f64() < t1 - t0 {
                let mut placeholder = Clip::new(self.storage.create(self.format), self.rate);
                placeholder.set_placeholder(true);
                placeholder.insert_silence(0.0, (t1 - t0) - end)?;
                placeholder.set_offset(end);
                out.clips.push(placeholder);
            }
        }
        Ok(out)
    }

    /// Copies `[t0, t1)` for the clipboard, then clears it.
    pub fn cut(&mut self, t0: f64, t1: f64) -> Result<Track> {
        let copied = self.copy(t0, t1, true)?;
        self.clear(t0, t1)?;
        Ok(copied)
    }

    /// Like [`Track::cut`] but leaves a gap.
    pub fn split_cut(&mut self, t0: f64, t1: f64) -> Result<Track> {
        let copied = self.copy(t0, t1, true)?;
        self.split_delete(t0, t1)?;
        Ok(copied)
    }

    /// Drops all audio outside `[t0, t1]`. Clips straddling a bound are
    /// shortened in place; a failure part way keeps earlier changes.
    pub fn trim(&mut self, t0: f64, t1: f64) -> Result<()> {
        ensure_ordered(t0, t1)?;
        let mut inside0 = false;
        let mut inside1 = false;
        for clip in &mut self.clips {
            if t1 > clip.start_time() && t1 < clip.end_time() {
                let end = clip.end_time();
                clip.clear(t1, end)?;
                inside1 = true;
            }
            if t0 > clip.start_time() && t0 < clip.end_time() {
                let start = clip.start_time();
                clip.clear(start, t0)?;
                clip.set_offset(t0);
                inside0 = true;
            }
        }

        if !inside1 && t1 < self.end_time() {
            let end = self.end_time();
            self.clear(t1, end)?;
        }
        if !inside0 && t0 > self.start_time() {
            let start = self.start_time();
            self.split_delete(start, t0)?;
        }
        Ok(())
    }

    /// Zeroes the audio in `[t0, t1)` without moving anything.
    pub fn silence(&mut self, t0: f64, t1: f64) -> Result<()> {
        ensure_ordered(t0, t1)?;
        let start = self.time_to_samples(t0);
        let end = self.time_to_samples(t1);
        for clip in &mut self.clips {
            if clip.end_sample() > start && clip.start_sample() < end {
                clip.set_silence(t0, t1)?;
            }
        }
        Ok(())
    }

    /// Inserts `len` seconds of silence at `t`, pushing later clips right.
    /// An empty track gets a silent clip starting at `t`.
    pub fn insert_silence(&mut self, t: f64, len: f64) -> Result<()> {
        if len == 0.0 {
            return Ok(());
        }
        if len < 0.0 {
            return Err(EditError::InvalidInput("negative silence length"));
        }

        if self.clips.is_empty() {
            let mut clip = Clip::new(self.storage.create(self.format), self.rate);
            clip.insert_silence(0.0, len)?;
            clip.set_offset(t);
            self.clips.push(clip);
            return Ok(());
        }

        if let Some(index) = self.clips.iter().position(|clip| clip.within_clip(t)) {
            self.clips[index].insert_silence(t, len)?;
        }
        for clip in &mut self.clips {
            if clip.before_clip(t) {
                clip.shift(len);
            }
        }
        Ok(())
    }
}
