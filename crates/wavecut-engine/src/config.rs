use serde::{Deserialize, Serialize};

/// Edit policy injected into a [`Track`](crate::Track).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Whether edits may offset other clips to make room. When false, edits
    /// that need room fail with a capacity error instead.
    pub clips_can_move: bool,
    /// Seconds within which two clip boundaries count as one merge point.
    pub merge_point_tolerance: f64,
    /// Samples within which a pasted edge fuses with a neighbouring clip.
    pub paste_merge_tolerance_samples: f64,
}

pub const DEFAULT_MERGE_POINT_TOLERANCE: f64 = 0.01;

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            clips_can_move: true,
            merge_point_tolerance: DEFAULT_MERGE_POINT_TOLERANCE,
            paste_merge_tolerance_samples: 2.0,
        }
    }
}

impl EditConfig {
    pub fn with_clips_can_move(mut self, clips_can_move: bool) -> Self {
        self.clips_can_move = clips_can_move;
        self
    }

    pub fn with_merge_point_tolerance(mut self, seconds: f64) -> Self {
        self.merge_point_tolerance = seconds;
        self
    }

    pub fn with_paste_merge_tolerance_samples(mut self, samples: f64) -> Self {
        self.paste_merge_tolerance_samples = samples;
        self
    }

    pub fn paste_merge_tolerance(&self, rate: f64) -> f64 {
        self.paste_merge_tolerance_samples / rate
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
