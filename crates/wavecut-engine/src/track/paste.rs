use super::Track;
use crate::clip::{Clip, ClipId};
use crate::error::{ensure_ordered, EditError, Result};
use crate::time;
use crate::warp::TimeWarper;

/// Samples scanned per read while looking for silent runs.
const DISJOIN_CHUNK: u64 = 1 << 20;

impl Track {
    /// Inserts the clips of `src` at `t0`.
    ///
    /// A source made of one clip starting at zero is spliced into the clip
    /// containing `t0` when there is one. Otherwise every source clip is
    /// added as a new clip. When clips may move, existing audio after `t0`
    /// is pushed right to make room; when they may not, an insertion that
    /// would overlap fails with [`EditError::Capacity`].
    pub fn paste(&mut self, t0: f64, src: &Track) -> Result<()> {
        if src.clips.is_empty() {
            return Ok(());
        }
        let rate = self.rate_f64();
        let period = 1.0 / rate;
        let can_move = self.config.clips_can_move;
        let single_clip_mode = src.clips.len() == 1 && src.start_time() == 0.0;
        let insert_duration = src.end_time();
        if insert_duration != 0.0 && insert_duration < period {
            return Ok(());
        }
        tracing::debug!(t0, insert_duration, single_clip_mode, "pasting");

        if can_move {
            if single_clip_mode {
                for clip in &mut self.clips {
                    if clip.start_time() > t0 - period {
                        clip.shift(insert_duration);
                    }
                }
            } else {
                let end = self.end_time();
                if !self.is_empty(t0, end) {
                    let tail = self.cut(t0, end + period)?;
                    self.paste(t0 + insert_duration, &tail)?;
                }
            }
        }

        if single_clip_mode {
            let start_sample = self.time_to_samples(t0);
            let host = self.clips.iter().position(|clip| {
                clip.within_clip(t0) || (!can_move && clip.start_sample() == start_sample)
            });
            if let Some(index) = host {
                if !can_move {
                    let host = &self.clips[index];
                    let limit = host.end_time() + insert_duration;
                    let blocked = self.clips.iter().any(|clip| {
                        clip.start_time() > host.start_time() && limit > clip.start_time()
                    });
                    if blocked {
                        tracing::warn!(t0, insert_duration, "no room to splice pasted audio");
                        return Err(EditError::Capacity("paste"));
                    }
                }
                return self.clips[index].paste(t0, &src.clips[0]);
            }
        }

        if !can_move && !self.is_empty(t0, t0 + insert_duration - period) {
            tracing::warn!(t0, insert_duration, "no room for pasted clips");
            return Err(EditError::Capacity("paste"));
        }

        let mut inserted = Vec::with_capacity(src.clips.len());
        for clip in src.clips.iter().filter(|clip| !clip.is_placeholder()) {
            let mut copy = clip.duplicate(true)?;
            copy.resample(self.rate)?;
            if copy.format() != self.format {
                copy.convert_format(self.format)?;
            }
            copy.shift(t0);
            inserted.push(copy);
        }
        self.clips.extend(inserted);
        Ok(())
    }

    /// Replaces `[t0, t1)` with the contents of `src`.
    ///
    /// Clip boundaries and cut lines inside the region are remembered before
    /// clearing. With `merge`, clips meeting the edges of the pasted audio
    /// are fused. With `preserve`, the remembered boundaries are split again
    /// and the cut lines put back, both at positions mapped through `warper`.
    /// Cut lines taken out of the region are lost if a later step fails.
    pub fn clear_and_paste(
        &mut self,
        t0: f64,
        t1: f64,
        src: &Track,
        preserve: bool,
        merge: bool,
        warper: &dyn TimeWarper,
    ) -> Result<()> {
        ensure_ordered(t0, t1)?;
        let dur = (t1 - t0).min(src.end_time());
        if dur == 0.0 {
            return self.paste(t0, src);
        }

        let rate = self.rate_f64();
        let t0 = time::quantize(t0, rate);
        let t1 = time::quantize(t1, rate);
        tracing::debug!(t0, t1, preserve, merge, "clear and paste");

        let mut splits: Vec<f64> = Vec::new();
        let mut cuts: Vec<Clip> = Vec::new();
        for clip in &mut self.clips {
            for boundary in [clip.start_time(), clip.end_time()] {
                let st = time::quantize(boundary, rate);
                if st >= t0 && st <= t1 && !splits.contains(&st) {
                    splits.push(st);
                }
            }
            let offset = clip.offset();
            let taken = clip.take_cut_lines(|position| {
                let cs = time::quantize(position, rate);
                cs >= t0 && cs <= t1
            });
            for mut cut in taken {
                let absolute = time::quantize(offset + cut.offset(), rate);
                cut.set_offset(absolute);
                cuts.push(cut);
            }
        }

        self.handle_clear(t0, t1, false, false)?;
        self.paste(t0, src)?;

        if merge {
            let tolerance = self.config.paste_merge_tolerance(rate);
            if !splits.is_empty() {
                let end = t0 + src.end_time();
                let ids = self.sorted_clip_ids();
                let found = ids.iter().position(|&id| {
                    self.clip(id)
                        .map_or(false, |clip| (end - clip.start_time()).abs() < tolerance)
                });
                if let Some(pos) = found.filter(|&pos| pos > 0) {
                    self.merge_clip_ids(ids[pos - 1], ids[pos])?;
                }
            }

            let ids = self.sorted_clip_ids();
            let found = ids.iter().position(|&id| {
                self.clip(id)
                    .map_or(false, |clip| (t0 - clip.end_time()).abs() < tolerance)
            });
            if let Some(pos) = found.filter(|&pos| pos + 1 < ids.len()) {
                self.merge_clip_ids(ids[pos], ids[pos + 1])?;
            }
        }

        if preserve {
            for &split in &splits {
                self.split_at(warper.warp(split))?;
            }
            for clip in &mut self.clips {
                let st = clip.start_time();
                let et = clip.end_time();
                let (inside, rest): (Vec<Clip>, Vec<Clip>) = std::mem::take(&mut cuts)
                    .into_iter()
                    .partition(|cut| cut.offset() >= st && cut.offset() <= et);
                cuts = rest;
                for mut cut in inside {
                    cut.set_offset(warper.warp(cut.offset()) - st);
                    clip.push_cut_line(cut);
                }
            }
        }
        Ok(())
    }

    /// Keeps this track aligned with an edit on a linked track that moved
    /// its end from `old_t1` to `new_t1`.
    pub fn sync_lock_adjust(&mut self, old_t1: f64, new_t1: f64) -> Result<()> {
        if new_t1 > old_t1 {
            if old_t1 >= self.end_time() {
                return Ok(());
            }
            if self.is_empty(old_t1, old_t1) {
                if self.config.clips_can_move {
                    let end = self.end_time() + 1.0 / self.rate_f64();
                    let tail = self.cut(old_t1, end)?;
                    self.paste(new_t1, &tail)?;
                }
                return Ok(());
            }
            let mut silence = self.empty_like();
            silence.offset = 0.0;
            silence.insert_silence(0.0, new_t1 - old_t1)?;
            silence.flush()?;
            self.paste(old_t1, &silence)
        } else if new_t1 < old_t1 {
            self.clear(new_t1, old_t1)
        } else {
            Ok(())
        }
    }

    /// Concatenates every clip overlapping `[t0, t1)` by more than a sample
    /// into one clip, filling gaps with silence.
    pub fn join(&mut self, t0: f64, t1: f64) -> Result<()> {
        let period = 1.0 / self.rate_f64();
        let mut selected: Vec<&Clip> = self
            .clips
            .iter()
            .filter(|clip| clip.start_time() < t1 - period && clip.end_time() - period > t0)
            .collect();
        if selected.is_empty() {
            return Ok(());
        }
        selected.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));

        let mut joined = Clip::new(self.storage.create(self.format), self.rate);
        let mut t = selected[0].offset();
        joined.set_offset(t);
        for clip in &selected {
            if clip.offset() - t > period {
                let gap = clip.offset() - t;
                joined.append_silence(gap, clip.envelope().value_at(0.0))?;
                t += gap;
            }
            joined.paste(t, clip)?;
            t = joined.end_time();
        }

        let ids: Vec<ClipId> = selected.iter().map(|clip| clip.id()).collect();
        tracing::debug!(t0, t1, clips = ids.len(), joined = %joined.id(), "joined clips");
        self.clips.retain(|clip| !ids.contains(&clip.id()));
        self.clips.push(joined);
        Ok(())
    }

    /// Turns runs of exact silence longer than the merge-point tolerance
    /// inside `[t0, t1]` into gaps between clips.
    pub fn disjoin(&mut self, t0: f64, t1: f64) -> Result<()> {
        let rate = self.rate_f64();
        let min_samples = self.time_to_samples(self.config.merge_point_tolerance).max(0) as u64;
        let mut regions: Vec<(f64, f64)> = Vec::new();
        let mut buffer: Vec<f32> = Vec::new();

        for clip in &self.clips {
            let mut start_time = clip.start_time();
            let mut end_time = clip.end_time();
            if end_time < t0 || start_time > t1 {
                continue;
            }
            start_time = start_time.max(t0);
            end_time = end_time.min(t1);

            let start = clip.time_to_samples_clip(start_time);
            let end = clip.time_to_samples_clip(end_time);
            let len = end.saturating_sub(start);
            let mut seq_start: Option<u64> = None;
            let mut done = 0;
            while done < len {
                let count = (len - done).min(DISJOIN_CHUNK) as usize;
                buffer.resize(count, 0.0);
                clip.read(start + done, &mut buffer)?;
                for (i, &sample) in buffer.iter().enumerate() {
                    let position = start + done + i as u64;
                    if sample == 0.0 && seq_start.is_none() {
                        seq_start = Some(position);
                    } else if sample != 0.0 || position == end - 1 {
                        if let Some(first) = seq_start.take() {
                            let last = if position == end - 1 && sample == 0.0 {
                                end
                            } else {
                                position
                            };
                            if last - first + 1 > min_samples {
                                regions.push((
                                    first as f64 / rate + clip.start_time(),
                                    last as f64 / rate + clip.start_time(),
                                ));
                            }
                        }
                    }
                }
                done += count as u64;
            }
        }

        tracing::debug!(t0, t1, regions = regions.len(), "disjoining silence");
        for (start, end) in regions {
            self.split_delete(start, end)?;
        }
        Ok(())
    }

    /// Appends the clip at index `second` onto the clip at index `first` and
    /// removes it. Unknown or equal indices do nothing.
    pub fn merge_clips(&mut self, first: usize, second: usize) -> Result<()> {
        let len = self.clips.len();
        if first == second || first >= len || second >= len {
            return Ok(());
        }
        let (target, source) = if first < second {
            let (head, tail) = self.clips.split_at_mut(second);
            (&mut head[first], &tail[0])
        } else {
            let (head, tail) = self.clips.split_at_mut(first);
            (&mut tail[0], &head[second])
        };
        let end = target.end_time();
        target.paste(end, source)?;
        self.clips.remove(second);
        Ok(())
    }

    fn merge_clip_ids(&mut self, first: ClipId, second: ClipId) -> Result<()> {
        match (self.clip_index(first), self.clip_index(second)) {
            (Some(first), Some(second)) => self.merge_clips(first, second),
            _ => Ok(()),
        }
    }
}
