use super::Clip;
use crate::error::Result;

/// Seconds within which a position addresses a cut line.
pub const CUT_LINE_TOLERANCE: f64 = 0.0001;

impl Clip {
    pub fn cut_lines(&self) -> &[Clip] {
        &self.cut_lines
    }

    pub fn num_cut_lines(&self) -> usize {
        self.cut_lines.len()
    }

    pub(crate) fn push_cut_line(&mut self, cut: Clip) {
        self.cut_lines.push(cut);
    }

    /// Removes and returns every cut line whose track position satisfies
    /// `predicate`. Returned clips keep offsets relative to this clip.
    pub(crate) fn take_cut_lines<F>(&mut self, mut predicate: F) -> Vec<Clip>
    where
        F: FnMut(f64) -> bool,
    {
        let offset = self.offset;
        let (taken, kept): (Vec<Clip>, Vec<Clip>) = self
            .cut_lines
            .drain(..)
            .partition(|cut| predicate(offset + cut.offset));
        self.cut_lines = kept;
        taken
    }

    fn cut_line_index(&self, position: f64) -> Option<usize> {
        self.cut_lines
            .iter()
            .position(|cut| (self.offset + cut.offset - position).abs() < CUT_LINE_TOLERANCE)
    }

    /// Track span the cut line at `position` would occupy once expanded.
    pub fn find_cut_line(&self, position: f64) -> Option<(f64, f64)> {
        self.cut_line_index(position).map(|index| {
            let cut = &self.cut_lines[index];
            let start = self.offset + cut.offset;
            (start, start + cut.duration())
        })
    }

    /// Puts the audio of the cut line at `position` back into the clip.
    /// Returns whether a cut line was found. The clip is unchanged on error.
    pub fn expand_cut_line(&mut self, position: f64) -> Result<bool> {
        let Some(index) = self.cut_line_index(position) else {
            return Ok(false);
        };
        let cut = self.cut_lines.remove(index);
        match self.paste(self.offset + cut.offset, &cut) {
            Ok(()) => Ok(true),
            Err(err) => {
                self.cut_lines.insert(index, cut);
                Err(err)
            }
        }
    }

    pub fn remove_cut_line(&mut self, position: f64) -> bool {
        match self.cut_line_index(position) {
            Some(index) => {
                self.cut_lines.remove(index);
                true
            }
            None => false,
        }
    }

    /// Moves every cut line at or after track time `t0` right by `len`.
    pub fn offset_cut_lines(&mut self, t0: f64, len: f64) {
        let offset = self.offset;
        for cut in &mut self.cut_lines {
            if offset + cut.offset >= t0 {
                cut.shift(len);
            }
        }
    }
}
