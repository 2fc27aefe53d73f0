use super::Track;
use crate::clip::Clip;
use crate::error::{EditError, Result};

impl Track {
    /// Restores the cut line at `position` into its clip and returns the
    /// span it now occupies. Later clips move right when clips can move;
    /// otherwise the call fails unless the restored audio fits before the
    /// next clip.
    pub fn expand_cut_line(&mut self, position: f64) -> Result<Option<(f64, f64)>> {
        let found = self.clips.iter().enumerate().find_map(|(index, clip)| {
            clip.find_cut_line(position)
                .map(|(start, end)| (index, start, end))
        });
        let Some((index, start, end)) = found else {
            return Ok(None);
        };
        let len = end - start;
        let clip_start = self.clips[index].start_time();

        if !self.config.clips_can_move {
            let limit = self.clips[index].end_time() + len;
            let blocked = self
                .clips
                .iter()
                .any(|other| other.start_time() > clip_start && limit > other.start_time());
            if blocked {
                tracing::warn!(position, len, "no room to expand cut line");
                return Err(EditError::Capacity("expand cut line"));
            }
        }

        self.clips[index].expand_cut_line(position)?;
        if self.config.clips_can_move {
            for other in &mut self.clips {
                if other.start_time() > clip_start {
                    other.shift(len);
                }
            }
        }
        tracing::debug!(position, start, end, "expanded cut line");
        Ok(Some((start, end)))
    }

    /// Discards the cut line at `position` without restoring its audio.
    pub fn remove_cut_line(&mut self, position: f64) -> bool {
        self.clips
            .iter_mut()
            .any(|clip| clip.remove_cut_line(position))
    }

    /// Every clip of the track and, depth first, every cut line nested in
    /// them. Cut lines come before the clip holding them.
    pub fn all_clips(&self) -> AllClips<'_> {
        AllClips::new(&self.clips)
    }
}

/// Post-order walk over a clip tree, kept on an explicit stack of
/// `(siblings, position)` frames.
#[derive(Debug, Clone)]
pub struct AllClips<'a> {
    stack: Vec<(&'a [Clip], usize)>,
}

impl<'a> AllClips<'a> {
    fn new(clips: &'a [Clip]) -> Self {
        let mut iter = Self { stack: Vec::new() };
        iter.descend(clips);
        iter
    }

    /// Pushes frames along the first-child path below `clips`.
    fn descend(&mut self, mut clips: &'a [Clip]) {
        while let Some(first) = clips.first() {
            self.stack.push((clips, 0));
            clips = first.cut_lines();
        }
    }
}

impl<'a> Iterator for AllClips<'a> {
    type Item = &'a Clip;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.stack.last_mut()?;
        let (clips, index) = *frame;
        frame.1 += 1;
        if index + 1 < clips.len() {
            self.descend(clips[index + 1].cut_lines());
        } else {
            self.stack.pop();
        }
        Some(&clips[index])
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{add_counting, empty_track, spans};
    use super::*;
    use crate::config::EditConfig;

    #[test]
    fn expand_restores_audio_and_pushes_neighbours() {
        let mut track = empty_track();
        add_counting(&mut track, 0.0, 100, 1.0);
        add_counting(&mut track, 2.0, 10, 1.0);
        track.clear_and_add_cut_line(0.2, 0.4).expect("cut line");
        assert_eq!(spans(&track), vec![(0.0, 0.8), (1.8, 1.9)]);

        let span = track.expand_cut_line(0.2).expect("expand");
        let (start, end) = span.expect("found");
        assert!((start - 0.2).abs() < 1e-9 && (end - 0.4).abs() < 1e-9);
        assert_eq!(spans(&track), vec![(0.0, 1.0), (2.0, 2.1)]);
        assert_eq!(track.expand_cut_line(0.2).expect("gone"), None);
    }

    #[test]
    fn fixed_clips_refuse_expansion_without_room() {
        let mut track = empty_track().with_config(EditConfig::default().with_clips_can_move(false));
        add_counting(&mut track, 0.0, 100, 1.0);
        track.clear_and_add_cut_line(0.2, 0.4).expect("cut line");
        add_counting(&mut track, 0.9, 10, 1.0);
        assert_eq!(
            track.expand_cut_line(0.2),
            Err(EditError::Capacity("expand cut line"))
        );
        assert_eq!(spans(&track), vec![(0.0, 0.8), (0.9, 1.0)]);
        assert_eq!(track.sorted_clips()[0].num_cut_lines(), 1);
    }

    #[test]
    fn remove_cut_line_reports_whether_found() {
        let mut track = empty_track();
        add_counting(&mut track, 0.0, 100, 1.0);
        track.clear_and_add_cut_line(0.2, 0.4).expect("cut line");
        assert!(!track.remove_cut_line(0.5));
        assert!(track.remove_cut_line(0.2));
        assert_eq!(track.all_clips().count(), 1);
    }

    #[test]
    fn all_clips_visits_nested_cut_lines_first() {
        let mut track = empty_track();
        add_counting(&mut track, 0.0, 10, 1.0);
        let other = add_counting(&mut track, 1.0, 10, 1.0);
        track.clear_and_add_cut_line(0.03, 0.05).expect("inner");
        track.clear_and_add_cut_line(0.02, 0.04).expect("outer");

        let outer = track
            .clips()
            .iter()
            .find(|clip| clip.num_cut_lines() == 1)
            .expect("clip with cut line");
        let cut = &outer.cut_lines()[0];
        let nested = &cut.cut_lines()[0];

        let order: Vec<_> = track.all_clips().map(Clip::id).collect();
        let position = |id| order.iter().position(|&seen| seen == id).expect("visited");
        assert_eq!(order.len(), 4);
        assert!(position(nested.id()) < position(cut.id()));
        assert!(position(cut.id()) < position(outer.id()));
        assert!(order.contains(&other));
    }
}
