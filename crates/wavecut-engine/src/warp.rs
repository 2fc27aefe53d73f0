//! Time maps applied to remembered split and cut-line positions when an
//! edit changes the timing of the audio it replaces.

/// Maps a time before an edit to the matching time after it.
pub trait TimeWarper {
    fn warp(&self, t: f64) -> f64;
}

impl<F> TimeWarper for F
where
    F: Fn(f64) -> f64,
{
    fn warp(&self, t: f64) -> f64 {
        self(t)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdentityTimeWarper;

impl TimeWarper for IdentityTimeWarper {
    fn warp(&self, t: f64) -> f64 {
        t
    }
}

/// Moves every time by a constant amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftTimeWarper {
    shift: f64,
}

impl ShiftTimeWarper {
    pub fn new(shift: f64) -> Self {
        Self { shift }
    }
}

impl TimeWarper for ShiftTimeWarper {
    fn warp(&self, t: f64) -> f64 {
        t + self.shift
    }
}

/// Straight-line map through `(before0, after0)` and `(before1, after1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTimeWarper {
    scale: f64,
    shift: f64,
}

impl LinearTimeWarper {
    pub fn new(before0: f64, after0: f64, before1: f64, after1: f64) -> Self {
        let span = before1 - before0;
        let scale = if span == 0.0 {
            1.0
        } else {
            (after1 - after0) / span
        };
        Self {
            scale,
            shift: after0 - scale * before0,
        }
    }
}

impl TimeWarper for LinearTimeWarper {
    fn warp(&self, t: f64) -> f64 {
        self.scale * t + self.shift
    }
}
