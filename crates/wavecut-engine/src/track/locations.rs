use serde::{Deserialize, Serialize};

use crate::clip::ClipId;

use super::Track;

/// A point of interest drawn on the track: a collapsed cut line or a
/// boundary where two clips meet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Location {
    CutLine {
        position: f64,
    },
    /// `left` and `right` index the clips in [`Track::clips`].
    MergePoint {
        position: f64,
        left: usize,
        right: usize,
    },
}

impl Location {
    pub fn position(&self) -> f64 {
        match *self {
            Location::CutLine { position } | Location::MergePoint { position, .. } => position,
        }
    }
}

/// Clip geometry the cached locations were derived from. Any edit that
/// moves, adds, removes or reorders clips or cut lines changes it.
#[derive(Debug, Clone, PartialEq)]
struct ClipLayout {
    id: ClipId,
    start: u64,
    end: u64,
    cut_lines: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct LocationsCache {
    layout: Vec<ClipLayout>,
    tolerance: u64,
    locations: Vec<Location>,
}

impl Track {
    /// Rebuilds the location list from the current clips, in start-time
    /// order.
    pub fn update_locations_cache(&mut self) {
        let locations = self.compute_locations();
        self.locations = LocationsCache {
            layout: self.clip_layout(),
            tolerance: self.config.merge_point_tolerance.to_bits(),
            locations,
        };
    }

    /// Cut lines and merge points of the current clips. The list is rebuilt
    /// whenever the clip layout or the merge tolerance changed since the
    /// last call.
    pub fn locations(&mut self) -> &[Location] {
        let stale = self.locations.tolerance != self.config.merge_point_tolerance.to_bits()
            || self.locations.layout != self.clip_layout();
        if stale {
            tracing::trace!(clips = self.clips.len(), "rebuilding locations");
            self.update_locations_cache();
        }
        &self.locations.locations
    }

    fn clip_layout(&self) -> Vec<ClipLayout> {
        self.clips
            .iter()
            .map(|clip| ClipLayout {
                id: clip.id(),
                start: clip.start_time().to_bits(),
                end: clip.end_time().to_bits(),
                cut_lines: clip
                    .cut_lines()
                    .iter()
                    .map(|cut| cut.offset().to_bits())
                    .collect(),
            })
            .collect()
    }

    fn compute_locations(&self) -> Vec<Location> {
        let tolerance = self.config.merge_point_tolerance;
        let mut locations = Vec::new();
        let mut previous: Option<usize> = None;
        for id in self.sorted_clip_ids() {
            let Some(index) = self.clip_index(id) else {
                continue;
            };
            let clip = &self.clips[index];
            locations.extend(clip.cut_lines().iter().map(|cut| Location::CutLine {
                position: clip.offset() + cut.offset(),
            }));
            if let Some(left) = previous {
                let end = self.clips[left].end_time();
                if (end - clip.start_time()).abs() < tolerance {
                    locations.push(Location::MergePoint {
                        position: end,
                        left,
                        right: index,
                    });
                }
            }
            previous = Some(index);
        }
        locations
    }
}
