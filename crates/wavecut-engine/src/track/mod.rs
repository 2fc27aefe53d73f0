//! The clip collection of a waveform track and every edit expressed on it.
//!
//! Edits follow one discipline: fallible work (duplicating clips, touching
//! storage) runs first against copies, then the collection is updated in a
//! pass that cannot fail.

mod cut_lines;
mod io;
mod locations;
mod paste;
mod region;

pub use cut_lines::AllClips;
pub use io::FillMode;
pub use locations::Location;

use locations::LocationsCache;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipId, ClipSummary};
use crate::config::EditConfig;
use crate::error::Result;
use crate::format::SampleFormat;
use crate::storage::StorageFactory;
use crate::time::{self, SampleCount};

#[derive(Debug)]
pub struct Track {
    name: String,
    rate: u32,
    format: SampleFormat,
    gain: f32,
    pan: f32,
    offset: f64,
    config: EditConfig,
    storage: Arc<dyn StorageFactory>,
    clips: Vec<Clip>,
    locations: LocationsCache,
}

/// Serializable view of a track's attributes and clip layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub name: String,
    pub rate: u32,
    pub format: SampleFormat,
    pub gain: f32,
    pub pan: f32,
    pub offset: f64,
    pub clips: Vec<ClipSummary>,
}

impl Track {
    pub fn new(storage: Arc<dyn StorageFactory>, format: SampleFormat, rate: u32) -> Self {
        Self {
            name: String::new(),
            rate: rate.max(1),
            format,
            gain: 1.0,
            pan: 0.0,
            offset: 0.0,
            config: EditConfig::default(),
            storage,
            clips: Vec::new(),
            locations: LocationsCache::default(),
        }
    }

    pub fn with_config(mut self, config: EditConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A track with the same settings and storage but no clips.
    pub fn empty_like(&self) -> Track {
        Track {
            name: self.name.clone(),
            rate: self.rate,
            format: self.format,
            gain: self.gain,
            pan: self.pan,
            offset: self.offset,
            config: self.config.clone(),
            storage: Arc::clone(&self.storage),
            clips: Vec::new(),
            locations: LocationsCache::default(),
        }
    }

    /// Deep copy, cut lines included.
    pub fn duplicate(&self) -> Result<Track> {
        let mut copy = self.empty_like();
        copy.clips = self
            .clips
            .iter()
            .map(|clip| clip.duplicate(true))
            .collect::<Result<Vec<_>>>()?;
        Ok(copy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EditConfig) {
        self.config = config;
    }

    pub fn storage(&self) -> &Arc<dyn StorageFactory> {
        &self.storage
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub(crate) fn rate_f64(&self) -> f64 {
        self.rate as f64
    }

    /// Reinterprets every clip at `rate`. Clip offsets scale by
    /// `old / new` so each clip stays on the same sample position.
    pub fn set_rate(&mut self, rate: u32) {
        let rate = rate.max(1);
        let ratio = self.rate as f64 / rate as f64;
        self.rate = rate;
        for clip in &mut self.clips {
            clip.set_rate(rate);
            let offset = clip.offset() * ratio;
            clip.set_offset(offset);
        }
    }

    /// Converts every clip to `rate`. A failure part way leaves earlier
    /// clips converted.
    pub fn resample(&mut self, rate: u32) -> Result<()> {
        let rate = rate.max(1);
        tracing::debug!(from = self.rate, to = rate, "resampling track");
        for clip in &mut self.clips {
            clip.resample(rate)?;
        }
        self.rate = rate;
        Ok(())
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.format
    }

    pub fn convert_to_sample_format(&mut self, format: SampleFormat) -> Result<()> {
        for clip in &mut self.clips {
            clip.convert_format(format)?;
        }
        self.format = format;
        Ok(())
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    /// Gain applied to output `channel`: even channels are left, odd right.
    pub fn channel_gain(&self, channel: usize) -> f32 {
        let mut left = 1.0;
        let mut right = 1.0;
        if self.pan < 0.0 {
            right = self.pan + 1.0;
        } else if self.pan > 0.0 {
            left = 1.0 - self.pan;
        }
        if channel % 2 == 0 {
            left * self.gain
        } else {
            right * self.gain
        }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Moves the track, and every clip with it, to `offset`.
    pub fn set_offset(&mut self, offset: f64) {
        let delta = offset - self.offset;
        for clip in &mut self.clips {
            clip.shift(delta);
        }
        self.offset = offset;
    }

    pub fn time_to_samples(&self, t: f64) -> SampleCount {
        time::time_to_samples(t, self.rate_f64())
    }

    pub fn samples_to_time(&self, samples: SampleCount) -> f64 {
        time::samples_to_time(samples, self.rate_f64())
    }

    /// Earliest clip start, or 0 for an empty track.
    pub fn start_time(&self) -> f64 {
        self.clips
            .iter()
            .map(Clip::start_time)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Latest clip end, or 0 for an empty track.
    pub fn end_time(&self) -> f64 {
        self.clips
            .iter()
            .map(Clip::end_time)
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// Whether no clip has audio within `[t0, t1]`. A reversed interval is
    /// empty.
    pub fn is_empty(&self, t0: f64, t1: f64) -> bool {
        if t0 > t1 {
            return true;
        }
        self.clips
            .iter()
            .all(|clip| clip.before_clip(t1) || clip.after_clip(t0))
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn num_clips(&self) -> usize {
        self.clips.len()
    }

    /// Clips ordered by start time.
    pub fn sorted_clips(&self) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self.clips.iter().collect();
        clips.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        clips
    }

    pub(crate) fn sorted_clip_ids(&self) -> Vec<ClipId> {
        self.sorted_clips().into_iter().map(Clip::id).collect()
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.id() == id)
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|clip| clip.id() == id)
    }

    pub fn clip_index(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|clip| clip.id() == id)
    }

    pub fn clip_by_index(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn clip_at_sample(&self, sample: SampleCount) -> Option<&Clip> {
        self.clips
            .iter()
            .find(|clip| clip.start_sample() <= sample && sample < clip.end_sample())
    }

    /// Clip covering `time`. Where two clips meet, the later one wins even if
    /// rounding puts the earlier clip's end marginally short of its start.
    pub fn clip_at_time(&self, time: f64) -> Option<&Clip> {
        let clips = self.sorted_clips();
        let found = clips
            .iter()
            .rposition(|clip| time >= clip.start_time() && time <= clip.end_time())?;
        if found + 1 < clips.len()
            && time == clips[found].end_time()
            && clips[found].shares_boundary_with_next(clips[found + 1])
        {
            return Some(clips[found + 1]);
        }
        Some(clips[found])
    }

    /// Adds an empty clip at time zero.
    pub fn create_clip(&mut self) -> &mut Clip {
        let clip = Clip::new(self.storage.create(self.format), self.rate);
        self.push_clip(clip)
    }

    /// The most recently added clip, or a new one at the track offset.
    pub fn newest_or_new_clip(&mut self) -> &mut Clip {
        if self.clips.is_empty() {
            let offset = self.offset;
            let clip = self.create_clip();
            clip.set_offset(offset);
        }
        let last = self.clips.len() - 1;
        &mut self.clips[last]
    }

    /// The clip starting last, or a new one at the track offset.
    pub fn rightmost_or_new_clip(&mut self) -> &mut Clip {
        let rightmost = self
            .clips
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.offset().total_cmp(&b.offset()))
            .map(|(index, _)| index);
        match rightmost {
            Some(index) => &mut self.clips[index],
            None => {
                let offset = self.offset;
                let clip = self.create_clip();
                clip.set_offset(offset);
                clip
            }
        }
    }

    /// Takes ownership of `clip`, converting it to the track's rate and
    /// format first when needed.
    pub fn add_clip(&mut self, mut clip: Clip) -> Result<ClipId> {
        clip.resample(self.rate)?;
        if clip.format() != self.format {
            clip.convert_format(self.format)?;
        }
        Ok(self.push_clip(clip).id())
    }

    pub fn remove_and_return_clip(&mut self, id: ClipId) -> Option<Clip> {
        let index = self.clip_index(id)?;
        Some(self.clips.remove(index))
    }

    pub(crate) fn push_clip(&mut self, clip: Clip) -> &mut Clip {
        self.clips.push(clip);
        let last = self.clips.len() - 1;
        &mut self.clips[last]
    }

    /// How far the clip `id` may move towards `amount` without overlapping
    /// another clip. Returns `amount` itself when nothing is in the way and
    /// `Some(0.0)` when the clip cannot move in that direction at all. `None`
    /// means no clip has that id.
    pub fn can_offset_clip(&self, id: ClipId, amount: f64) -> Option<f64> {
        let clip = self.clip(id)?;
        let mut allowed = amount;
        for other in self.clips.iter().filter(|other| other.id() != id) {
            if !overlaps_after_shift(other, clip, amount) {
                continue;
            }
            if amount > 0.0 {
                allowed = allowed.min(other.start_time() - clip.end_time()).max(0.0);
            } else {
                allowed = allowed.max(other.end_time() - clip.start_time()).min(0.0);
            }
        }
        if allowed == amount {
            return Some(amount);
        }
        let blocked = self
            .clips
            .iter()
            .filter(|other| other.id() != id)
            .any(|other| overlaps_after_shift(other, clip, allowed));
        Some(if blocked { 0.0 } else { allowed })
    }

    /// Whether `clip`, moved by `slide_by`, fits between the existing clips.
    /// An overlap shorter than `tolerance` is resolved by sliding the clip
    /// clear of it; the tolerance then drops a thousandfold so later clips
    /// only get rounding-sized corrections. The final slide is returned.
    pub fn can_insert_clip(&self, clip: &Clip, slide_by: f64, tolerance: f64) -> Option<f64> {
        let mut slide_by = slide_by;
        let mut tolerance = tolerance;
        for other in &self.clips {
            let d1 = other.start_time() - (clip.end_time() + slide_by);
            let d2 = (clip.start_time() + slide_by) - other.end_time();
            if d1 < 0.0 && d2 < 0.0 {
                if -d1 < tolerance {
                    slide_by += d1;
                } else if -d2 < tolerance {
                    slide_by -= d2;
                } else {
                    return None;
                }
                tolerance /= 1000.0;
            }
        }
        Some(slide_by)
    }

    pub fn lock(&self) {
        for clip in self.all_clips() {
            clip.lock();
        }
    }

    pub fn unlock(&self) {
        for clip in self.all_clips() {
            clip.unlock();
        }
    }

    pub fn close_lock(&self) {
        for clip in self.all_clips() {
            clip.close_lock();
        }
    }

    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            name: self.name.clone(),
            rate: self.rate,
            format: self.format,
            gain: self.gain,
            pan: self.pan,
            offset: self.offset,
            clips: self.clips.iter().map(Clip::summary).collect(),
        }
    }
}

fn overlaps_after_shift(other: &Clip, clip: &Clip, amount: f64) -> bool {
    other.start_time() < clip.end_time() + amount && other.end_time() > clip.start_time() + amount
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    pub(crate) const RATE: u32 = 100;

    pub(crate) fn empty_track() -> Track {
        let storage = Arc::new(MemoryStorage::new().with_max_block_size(32));
        Track::new(storage, SampleFormat::Float32, RATE)
    }

    /// Adds a clip at `offset` whose samples count up from `first`.
    pub(crate) fn add_counting(track: &mut Track, offset: f64, len: usize, first: f32) -> ClipId {
        let samples: Vec<f32> = (0..len).map(|i| first + i as f32).collect();
        let clip = track.create_clip();
        clip.set_offset(offset);
        clip.append(&samples).expect("append");
        clip.id()
    }

    pub(crate) fn spans(track: &Track) -> Vec<(f64, f64)> {
        track
            .sorted_clips()
            .iter()
            .map(|clip| (round(clip.start_time()), round(clip.end_time())))
            .collect()
    }

    pub(crate) fn round(t: f64) -> f64 {
        (t * 1e6).round() / 1e6
    }

    #[test]
    fn empty_track_spans_nothing() {
        let track = empty_track();
        assert_eq!(track.start_time(), 0.0);
        assert_eq!(track.end_time(), 0.0);
        assert!(track.is_empty(0.0, 100.0));
    }

    #[test]
    fn start_and_end_cover_every_clip() {
        let mut track = empty_track();
        add_counting(&mut track, 2.0, 50, 1.0);
        add_counting(&mut track, 0.5, 10, 1.0);
        assert_eq!(track.start_time(), 0.5);
        assert_eq!(round(track.end_time()), 2.5);
        assert!(!track.is_empty(0.55, 0.7));
        assert!(track.is_empty(0.6, 2.0));
        assert!(track.is_empty(3.0, 1.0));
    }

    #[test]
    fn clip_at_time_prefers_next_clip_at_shared_boundary() {
        let mut track = empty_track();
        let first = add_counting(&mut track, 0.0, 100, 1.0);
        let second = add_counting(&mut track, 1.0, 100, 1.0);
        assert_eq!(track.clip_at_time(0.5).map(Clip::id), Some(first));
        assert_eq!(track.clip_at_time(1.0).map(Clip::id), Some(second));
        assert_eq!(track.clip_at_sample(99).map(Clip::id), Some(first));
        assert!(track.clip_at_time(3.0).is_none());
    }

    #[test]
    fn set_offset_moves_clips() {
        let mut track = empty_track();
        let id = add_counting(&mut track, 1.0, 10, 1.0);
        track.set_offset(2.0);
        assert_eq!(track.clip(id).map(Clip::offset), Some(3.0));
    }

    #[test]
    fn pan_law_attenuates_opposite_side() {
        let mut track = empty_track();
        track.set_gain(0.5);
        track.set_pan(0.5);
        assert_eq!(track.channel_gain(0), 0.25);
        assert_eq!(track.channel_gain(1), 0.5);
        track.set_pan(-3.0);
        assert_eq!(track.pan(), -1.0);
        assert_eq!(track.channel_gain(1), 0.0);
    }

    #[test]
    fn offsetting_stops_at_neighbour() {
        let mut track = empty_track();
        let left = add_counting(&mut track, 0.0, 100, 1.0);
        add_counting(&mut track, 1.5, 100, 1.0);
        assert_eq!(track.can_offset_clip(left, 0.25), Some(0.25));
        let allowed = track.can_offset_clip(left, 1.0).expect("partial move");
        assert!((allowed - 0.5).abs() < 1e-9);
    }

    #[test]
    fn offsetting_into_a_touching_neighbour_allows_nothing() {
        let mut track = empty_track();
        let left = add_counting(&mut track, 0.0, 100, 1.0);
        let right = add_counting(&mut track, 1.0, 100, 1.0);
        assert_eq!(track.can_offset_clip(left, 0.3), Some(0.0));
        assert_eq!(track.can_offset_clip(right, -0.3), Some(0.0));
        assert_eq!(track.can_offset_clip(right, 0.3), Some(0.3));

        let missing = track.remove_and_return_clip(right).expect("removed").id();
        assert_eq!(track.can_offset_clip(missing, 0.3), None);
    }

    #[test]
    fn insertion_slides_within_tolerance() {
        let mut track = empty_track();
        add_counting(&mut track, 0.0, 100, 1.0);
        let mut other = empty_track();
        let id = add_counting(&mut other, 0.98, 50, 1.0);
        let candidate = other.clip(id).expect("candidate");
        let slide = track.can_insert_clip(candidate, 0.0, 0.05).expect("fits");
        assert!((slide - 0.02).abs() < 1e-9);
        assert!(track.can_insert_clip(candidate, 0.0, 0.01).is_none());
    }

    #[test]
    fn insertion_tolerance_shrinks_after_a_slide() {
        let mut track = empty_track();
        add_counting(&mut track, 0.0, 100, 1.0);
        add_counting(&mut track, 1.49, 50, 1.0);
        let mut other = empty_track();
        let id = add_counting(&mut other, 0.98, 50, 1.0);
        let candidate = other.clip(id).expect("candidate");
        assert!(track.can_insert_clip(candidate, 0.0, 0.05).is_none());
    }

    #[test]
    fn set_rate_rescales_offsets() {
        let mut track = empty_track();
        let id = add_counting(&mut track, 1.0, 100, 1.0);
        track.set_rate(200);
        let clip = track.clip(id).expect("clip");
        assert_eq!(clip.start_sample(), 100);
        assert!((clip.end_time() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn summary_serializes() {
        let mut track = empty_track().with_name("vox");
        add_counting(&mut track, 0.0, 10, 1.0);
        let json = serde_json::to_string(&track.summary()).expect("json");
        let parsed: TrackSummary = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, track.summary());
    }

    #[test]
    fn lock_reaches_cut_lines() {
        let mut track = empty_track();
        add_counting(&mut track, 0.0, 100, 1.0);
        track.clear_and_add_cut_line(0.2, 0.4).expect("cut line");
        track.lock();
        let locked = track.all_clips().all(|clip| {
            clip.sequence()
                .as_any()
                .downcast_ref::<crate::storage::MemorySequence>()
                .map_or(false, |seq| seq.blocks().all(|block| block.is_locked()))
        });
        assert!(locked);
        track.unlock();
    }
}
