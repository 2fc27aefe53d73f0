use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    pub time: f64,
    pub value: f64,
}

impl EnvelopePoint {
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Piecewise-linear gain curve of a clip.
///
/// Point times are relative to the clip start. Two points may share a time to
/// describe a step: the earlier one is the limit from the left, the later one
/// governs the value at and after that time. An envelope without points is
/// flat at its default value.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    points: Vec<EnvelopePoint>,
    default_value: f64,
    min_value: f64,
    max_value: f64,
    track_len: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(1.0, 0.0, 2.0)
    }
}

impl Envelope {
    pub fn new(default_value: f64, min_value: f64, max_value: f64) -> Self {
        Self {
            points: Vec::new(),
            default_value,
            min_value,
            max_value,
            track_len: 0.0,
        }
    }

    pub fn with_track_len(mut self, track_len: f64) -> Self {
        self.track_len = track_len.max(0.0);
        self
    }

    pub fn points(&self) -> &[EnvelopePoint] {
        &self.points
    }

    pub fn is_flat(&self) -> bool {
        self.points.is_empty()
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn track_len(&self) -> f64 {
        self.track_len
    }

    /// Inserts a point, replacing any point already at exactly `time`.
    pub fn insert(&mut self, time: f64, value: f64) {
        let point = EnvelopePoint::new(time, self.clamp(value));
        let index = self.points.partition_point(|existing| existing.time < time);
        let end = self.points.partition_point(|existing| existing.time <= time);
        if index < end {
            self.points.drain(index..end);
        }
        self.points.insert(index, point);
    }

    pub fn value_at(&self, time: f64) -> f64 {
        let Some(first) = self.points.first() else {
            return self.default_value;
        };
        let index = self.points.partition_point(|point| point.time <= time);
        if index == 0 {
            return first.value;
        }
        if index == self.points.len() {
            return self.points[index - 1].value;
        }
        interpolate(&self.points[index - 1], &self.points[index], time)
    }

    /// Value approached from the left of `time`.
    pub fn left_limit(&self, time: f64) -> f64 {
        let Some(first) = self.points.first() else {
            return self.default_value;
        };
        let index = self.points.partition_point(|point| point.time < time);
        if index == 0 {
            return first.value;
        }
        if index == self.points.len() {
            return self.points[index - 1].value;
        }
        interpolate(&self.points[index - 1], &self.points[index], time)
    }

    /// Fills `buffer` with values sampled every `step` seconds from `t0`.
    pub fn values(&self, buffer: &mut [f64], t0: f64, step: f64) {
        if self.points.is_empty() {
            buffer.fill(self.default_value);
            return;
        }
        for (index, value) in buffer.iter_mut().enumerate() {
            *value = self.value_at(t0 + index as f64 * step);
        }
    }

    pub fn set_track_len(&mut self, track_len: f64) {
        let track_len = track_len.max(0.0);
        if self.points.iter().any(|point| point.time > track_len) {
            let tail = self.value_at(track_len);
            self.points.retain(|point| point.time <= track_len);
            self.points.push(EnvelopePoint::new(track_len, tail));
            self.simplify();
        }
        self.track_len = track_len;
    }

    /// Stretches point times so the envelope spans `track_len`.
    pub fn rescale_times(&mut self, track_len: f64) {
        if self.track_len > 0.0 {
            let factor = track_len / self.track_len;
            for point in &mut self.points {
                point.time *= factor;
            }
        }
        self.track_len = track_len.max(0.0);
    }

    /// Removes `[t0, t1)` and closes the gap, keeping the value left of `t0`
    /// and the value from `t1` onward.
    pub fn collapse_region(&mut self, t0: f64, t1: f64) {
        let t0 = t0.clamp(0.0, self.track_len);
        let t1 = t1.clamp(t0, self.track_len);
        let removed = t1 - t0;
        if removed <= 0.0 {
            return;
        }
        if !self.points.is_empty() {
            let left = self.left_limit(t0);
            let right = self.value_at(t1);
            let mut points = Vec::with_capacity(self.points.len() + 2);
            points.extend(self.points.iter().copied().filter(|point| point.time < t0));
            if t0 > 0.0 {
                points.push(EnvelopePoint::new(t0, left));
            }
            if t1 < self.track_len {
                points.push(EnvelopePoint::new(t0, right));
            }
            points.extend(
                self.points
                    .iter()
                    .filter(|point| point.time > t1)
                    .map(|point| EnvelopePoint::new(point.time - removed, point.value)),
            );
            self.points = points;
            self.simplify();
        }
        self.track_len -= removed;
    }

    /// Opens `other.track_len()` of room at `t0` and copies `other`'s shape
    /// into it. Values on both sides of `t0` are kept.
    pub fn paste(&mut self, t0: f64, other: &Envelope) {
        let t0 = t0.clamp(0.0, self.track_len);
        let len = other.track_len;
        if self.points.is_empty()
            && other.points.is_empty()
            && self.default_value == other.default_value
        {
            self.track_len += len;
            return;
        }

        let left = self.left_limit(t0);
        let right = self.value_at(t0);
        let mut points = Vec::with_capacity(self.points.len() + other.points.len() + 4);
        points.extend(self.points.iter().copied().filter(|point| point.time < t0));
        points.push(EnvelopePoint::new(t0, left));
        points.push(EnvelopePoint::new(t0, self.clamp(other.value_at(0.0))));
        points.extend(
            other
                .points
                .iter()
                .filter(|point| point.time > 0.0 && point.time < len)
                .map(|point| EnvelopePoint::new(point.time + t0, self.clamp(point.value))),
        );
        points.push(EnvelopePoint::new(t0 + len, self.clamp(other.left_limit(len))));
        points.push(EnvelopePoint::new(t0 + len, right));
        points.extend(
            self.points
                .iter()
                .filter(|point| point.time >= t0)
                .map(|point| EnvelopePoint::new(point.time + len, point.value)),
        );
        self.points = points;
        self.track_len += len;
        self.simplify();
    }

    /// Opens `len` seconds at `t`, holding the value found at `t`.
    pub fn insert_space(&mut self, t: f64, len: f64) {
        let t = t.clamp(0.0, self.track_len);
        if !self.points.is_empty() {
            let left = self.left_limit(t);
            let value = self.value_at(t);
            let mut points = Vec::with_capacity(self.points.len() + 3);
            points.extend(self.points.iter().copied().filter(|point| point.time < t));
            points.push(EnvelopePoint::new(t, left));
            points.push(EnvelopePoint::new(t, value));
            points.push(EnvelopePoint::new(t + len, value));
            points.extend(
                self.points
                    .iter()
                    .filter(|point| point.time >= t)
                    .map(|point| EnvelopePoint::new(point.time + len, point.value)),
            );
            self.points = points;
            self.simplify();
        }
        self.track_len += len;
    }

    /// Extends the envelope by `len`, ramping from the current end value to
    /// `value`.
    pub fn extend_with_ramp(&mut self, len: f64, value: f64) {
        let value = self.clamp(value);
        if self.points.is_empty() && value == self.default_value {
            self.track_len += len;
            return;
        }
        let end_value = self.value_at(self.track_len);
        if self
            .points
            .last()
            .map_or(true, |point| point.time < self.track_len)
        {
            self.points
                .push(EnvelopePoint::new(self.track_len, end_value));
        }
        self.track_len += len;
        self.points.push(EnvelopePoint::new(self.track_len, value));
        self.simplify();
    }

    /// Copy of the `[t0, t1)` portion, rebased to start at zero.
    pub fn copy_range(&self, t0: f64, t1: f64) -> Envelope {
        let t0 = t0.clamp(0.0, self.track_len);
        let t1 = t1.clamp(t0, self.track_len);
        let mut copy = Envelope::new(self.default_value, self.min_value, self.max_value)
            .with_track_len(t1 - t0);
        if !self.points.is_empty() {
            copy.points.push(EnvelopePoint::new(0.0, self.value_at(t0)));
            copy.points.extend(
                self.points
                    .iter()
                    .filter(|point| point.time > t0 && point.time < t1)
                    .map(|point| EnvelopePoint::new(point.time - t0, point.value)),
            );
            copy.points
                .push(EnvelopePoint::new(t1 - t0, self.left_limit(t1)));
            copy.simplify();
        }
        copy
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_value, self.max_value)
    }

    /// Drops points that carry no information.
    fn simplify(&mut self) {
        let mut kept: Vec<EnvelopePoint> = Vec::with_capacity(self.points.len());
        for point in self.points.drain(..) {
            let len = kept.len();
            if let Some(last) = kept.last() {
                if last.time == point.time && last.value == point.value {
                    continue;
                }
                if len >= 2 && kept[len - 2].time == point.time && last.time == point.time {
                    kept[len - 1] = point;
                    continue;
                }
            }
            kept.push(point);
        }
        if kept.iter().all(|point| point.value == self.default_value) {
            kept.clear();
        }
        self.points = kept;
    }
}

fn interpolate(prev: &EnvelopePoint, next: &EnvelopePoint, time: f64) -> f64 {
    let span = next.time - prev.time;
    if span <= 0.0 {
        return next.value;
    }
    let t = ((time - prev.time) / span).clamp(0.0, 1.0);
    prev.value + (next.value - prev.value) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: f64) -> Envelope {
        let mut env = Envelope::default().with_track_len(len);
        env.insert(0.0, 0.0);
        env.insert(len, 1.0);
        env
    }

    #[test]
    fn flat_envelope_reports_default() {
        let env = Envelope::default().with_track_len(4.0);
        assert_eq!(env.value_at(2.0), 1.0);
        let mut values = [0.0; 4];
        env.values(&mut values, 0.0, 1.0);
        assert_eq!(values, [1.0; 4]);
    }

    #[test]
    fn interpolates_between_points() {
        let env = ramp(10.0);
        assert!((env.value_at(5.0) - 0.5).abs() < 1e-9);
        assert_eq!(env.value_at(-1.0), 0.0);
        assert_eq!(env.value_at(20.0), 1.0);
    }

    #[test]
    fn insert_replaces_same_time() {
        let mut env = ramp(10.0);
        env.insert(10.0, 0.5);
        assert_eq!(env.points().len(), 2);
        assert_eq!(env.value_at(10.0), 0.5);
    }

    #[test]
    fn collapse_keeps_values_on_both_sides() {
        let mut env = ramp(10.0);
        env.collapse_region(2.0, 6.0);
        assert!((env.track_len() - 6.0).abs() < 1e-12);
        assert!((env.left_limit(2.0) - 0.2).abs() < 1e-9);
        assert!((env.value_at(2.0) - 0.6).abs() < 1e-9);
        assert!((env.value_at(6.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn paste_inserts_shape_and_preserves_neighbours() {
        let mut env = ramp(10.0);
        let mut other = Envelope::default().with_track_len(2.0);
        other.insert(0.0, 0.25);
        env.paste(5.0, &other);
        assert!((env.track_len() - 12.0).abs() < 1e-12);
        assert!((env.left_limit(5.0) - 0.5).abs() < 1e-9);
        assert!((env.value_at(6.0) - 0.25).abs() < 1e-9);
        assert!((env.value_at(7.0) - 0.5).abs() < 1e-9);
        assert!((env.value_at(12.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn paste_of_flat_into_flat_only_extends() {
        let mut env = Envelope::default().with_track_len(1.0);
        env.paste(0.5, &Envelope::default().with_track_len(3.0));
        assert!(env.is_flat());
        assert!((env.track_len() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn insert_space_holds_value() {
        let mut env = ramp(10.0);
        env.insert_space(5.0, 2.0);
        assert!((env.value_at(6.0) - 0.5).abs() < 1e-9);
        assert!((env.value_at(12.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ramp_extension_reaches_target() {
        let mut env = Envelope::default().with_track_len(1.0);
        env.extend_with_ramp(1.0, 0.0);
        assert_eq!(env.value_at(0.5), 1.0);
        assert!((env.value_at(1.5) - 0.5).abs() < 1e-9);
        assert_eq!(env.value_at(2.0), 0.0);
    }

    #[test]
    fn copy_range_rebases() {
        let env = ramp(10.0);
        let copy = env.copy_range(2.0, 4.0);
        assert!((copy.track_len() - 2.0).abs() < 1e-12);
        assert!((copy.value_at(0.0) - 0.2).abs() < 1e-9);
        assert!((copy.value_at(2.0) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn values_clamped_to_range() {
        let mut env = Envelope::default().with_track_len(1.0);
        env.insert(0.5, 5.0);
        assert_eq!(env.value_at(0.5), 2.0);
    }
}
