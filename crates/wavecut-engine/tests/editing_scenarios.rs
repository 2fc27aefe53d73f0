use std::sync::Arc;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wavecut_engine::{
    ClipId, EditConfig, EditError, FillMode, IdentityTimeWarper, Location, MemoryStorage,
    SampleFormat, Track,
};

const RATE: u32 = 44_100;

fn empty_track() -> Track {
    Track::new(Arc::new(MemoryStorage::new()), SampleFormat::Float32, RATE)
}

fn noise(seconds: f64, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = (seconds * RATE as f64).round() as usize;
    (0..len).map(|_| rng.gen_range(-0.5..0.5)).collect()
}

fn add_noise(track: &mut Track, offset: f64, seconds: f64, seed: u64) -> ClipId {
    let clip = track.create_clip();
    clip.set_offset(offset);
    clip.append(&noise(seconds, seed)).expect("append");
    clip.id()
}

fn read(track: &Track, start: i64, len: usize) -> Vec<f32> {
    let mut buffer = vec![0.0; len];
    let complete = track
        .get(&mut buffer, start, FillMode::Zero, true)
        .expect("read");
    assert!(complete);
    buffer
}

fn spans(track: &Track) -> Vec<(i64, i64)> {
    track
        .sorted_clips()
        .iter()
        .map(|clip| (clip.start_sample(), clip.end_sample()))
        .collect()
}

/// Clip layout without ids: `(start, samples, [(cut offset, cut samples)])`.
fn layout(track: &Track) -> Vec<(i64, u64, Vec<(i64, u64)>)> {
    track
        .sorted_clips()
        .iter()
        .map(|clip| {
            let cuts = clip
                .cut_lines()
                .iter()
                .map(|cut| (cut.start_sample(), cut.num_samples()))
                .collect();
            (clip.start_sample(), clip.num_samples(), cuts)
        })
        .collect()
}

#[test]
fn split_delete_leaves_a_gap() {
    let mut track = empty_track();
    add_noise(&mut track, 0.0, 10.0, 1);
    track.split_delete(3.0, 4.0).expect("split delete");

    assert_eq!(track.num_clips(), 2);
    assert_eq!(spans(&track), vec![(0, 3 * 44_100), (4 * 44_100, 10 * 44_100)]);
    assert!(track.is_empty(3.0, 4.0));
}

#[test]
fn clear_closes_the_gap() {
    let mut track = empty_track();
    add_noise(&mut track, 0.0, 10.0, 2);
    let tail = read(&track, 4 * 44_100, 1_000);
    track.clear(3.0, 4.0).expect("clear");

    assert_eq!(spans(&track), vec![(0, 9 * 44_100)]);
    assert_eq!(read(&track, 3 * 44_100, 1_000), tail);
}

#[test]
fn insert_silence_into_empty_track() {
    let mut track = empty_track();
    track.insert_silence(0.0, 2.0).expect("insert silence");
    assert_eq!(track.end_time(), 2.0);
    assert_eq!(track.num_clips(), 1);
    assert_eq!(track.insert_silence(0.0, 0.0), Ok(()));
    assert_eq!(
        track.insert_silence(0.0, -1.0),
        Err(EditError::InvalidInput("negative silence length"))
    );
}

#[test]
fn fixed_clips_refuse_paste_without_room() {
    let mut track =
        empty_track().with_config(EditConfig::default().with_clips_can_move(false));
    add_noise(&mut track, 0.0, 5.0, 3);
    add_noise(&mut track, 5.0, 1.0, 4);
    let mut src = empty_track();
    src.append(&noise(1.0, 5)).expect("append");

    let before = track.summary();
    let samples = read(&track, 0, 6 * 44_100);
    assert_eq!(track.paste(2.0, &src), Err(EditError::Capacity("paste")));
    assert_eq!(track.summary(), before);
    assert_eq!(read(&track, 0, 6 * 44_100), samples);
}

#[test]
fn near_touching_clips_form_one_merge_point() {
    let mut track = empty_track();
    let left = add_noise(&mut track, 0.0, 2.0, 6);
    let right = add_noise(&mut track, 2.0 + 1e-7, 2.0, 7);
    track.update_locations_cache();

    let locations = track.locations().to_vec();
    assert_eq!(locations.len(), 1);
    match locations[0] {
        Location::MergePoint {
            position,
            left: l,
            right: r,
        } => {
            assert!((position - 2.0).abs() < 1e-6);
            assert_eq!(track.clip_by_index(l).map(|clip| clip.id()), Some(left));
            assert_eq!(track.clip_by_index(r).map(|clip| clip.id()), Some(right));
        }
        other => panic!("expected a merge point, got {other:?}"),
    }
}

#[test]
fn merge_point_tolerance_is_exclusive() {
    let mut track = empty_track();
    add_noise(&mut track, 0.0, 1.0, 8);
    add_noise(&mut track, 1.0 + 0.01, 1.0, 9);
    track.update_locations_cache();
    assert!(track.locations().is_empty());

    track.set_config(EditConfig::default().with_merge_point_tolerance(0.0101));
    track.update_locations_cache();
    assert_eq!(track.locations().len(), 1);
}

const PERIOD: f64 = 1.0 / RATE as f64;

fn fixed_track() -> Track {
    empty_track().with_config(EditConfig::default().with_clips_can_move(false))
}

/// Pastes half a second over `[1.0, 1.5)` of a fixed-clip track that holds
/// one clip ending `gap` samples before 1.0.
fn paste_after_left_neighbour(gap: f64, merge: bool) -> (Track, Vec<f32>) {
    let mut track = fixed_track();
    add_noise(&mut track, 0.5 - gap * PERIOD, 0.5, 20);
    let mut src = empty_track();
    src.append(&noise(0.5, 21)).expect("append");
    track
        .clear_and_paste(1.0, 1.5, &src, false, merge, &IdentityTimeWarper)
        .expect("clear and paste");
    let mut expected = noise(0.5, 20);
    expected.extend(noise(0.5, 21));
    (track, expected)
}

/// Pastes half a second over `[1.0, 1.5)` of a fixed-clip track with a
/// short clip inside the region and one clip starting `gap` samples after
/// 1.5.
fn paste_before_right_neighbour(gap: f64) -> (Track, Vec<f32>) {
    let mut track = fixed_track();
    add_noise(&mut track, 1.2, 0.1, 22);
    add_noise(&mut track, 1.5 + gap * PERIOD, 0.5, 23);
    let mut src = empty_track();
    src.append(&noise(0.5, 24)).expect("append");
    track
        .clear_and_paste(1.0, 1.5, &src, false, true, &IdentityTimeWarper)
        .expect("clear and paste");
    let mut expected = noise(0.5, 24);
    expected.extend(noise(0.5, 23));
    (track, expected)
}

#[test]
fn paste_merges_left_neighbour_within_two_samples() {
    let (track, expected) = paste_after_left_neighbour(1.25, true);
    assert_eq!(spans(&track), vec![(22_049, 66_149)]);
    assert_eq!(read(&track, 22_049, 44_100), expected);

    let (track, _) = paste_after_left_neighbour(1.25, false);
    assert_eq!(track.num_clips(), 2);
}

#[test]
fn paste_keeps_left_neighbour_beyond_two_samples() {
    let (track, _) = paste_after_left_neighbour(2.75, true);
    assert_eq!(spans(&track), vec![(22_047, 44_097), (44_100, 66_150)]);
}

#[test]
fn paste_merges_right_neighbour_within_two_samples() {
    let (track, expected) = paste_before_right_neighbour(1.25);
    assert_eq!(spans(&track), vec![(44_100, 88_200)]);
    assert_eq!(read(&track, 44_100, 44_100), expected);
}

#[test]
fn paste_keeps_right_neighbour_beyond_two_samples() {
    let (track, _) = paste_before_right_neighbour(2.75);
    assert_eq!(spans(&track), vec![(44_100, 66_150), (66_153, 88_203)]);
}

#[test]
fn copy_then_paste_reproduces_the_region() {
    let mut track = empty_track();
    add_noise(&mut track, 0.0, 1.0, 10);
    let region = read(&track, 11_025, 11_025);
    let after = read(&track, 22_050, 22_050);

    let clipboard = track.copy(0.25, 0.5, true).expect("copy");
    assert_eq!(clipboard.num_clips(), 1);
    assert_eq!(clipboard.start_time(), 0.0);
    track.paste(0.25, &clipboard).expect("paste");

    assert_eq!(track.num_clips(), 1);
    assert!((track.end_time() - 1.25).abs() < 1e-9);
    assert_eq!(read(&track, 11_025, 11_025), region);
    assert_eq!(read(&track, 22_050, 11_025), region);
    assert_eq!(read(&track, 33_075, 22_050), after);
}

#[test]
fn clipboard_copy_pads_trailing_silence() {
    let mut track = empty_track();
    add_noise(&mut track, 0.0, 1.0, 11);
    let clipboard = track.copy(0.5, 2.0, true).expect("copy");

    let placeholders: Vec<_> = clipboard
        .clips()
        .iter()
        .filter(|clip| clip.is_placeholder())
        .collect();
    assert_eq!(placeholders.len(), 1);
    assert!((placeholders[0].start_time() - 0.5).abs() < 1e-9);
    assert!((clipboard.end_time() - 1.5).abs() < 1e-6);

    let mut target = empty_track();
    target.paste(0.0, &clipboard).expect("paste");
    assert_eq!(target.num_clips(), 1);
    assert!(target.clips().iter().all(|clip| !clip.is_placeholder()));
}

#[test]
fn split_then_join_restores_the_clip() {
    let mut track = empty_track();
    let id = add_noise(&mut track, 0.0, 1.0, 12);
    if let Some(clip) = track.clip_mut(id) {
        clip.envelope_mut().insert(0.0, 1.0);
        clip.envelope_mut().insert(0.9, 0.5);
    }
    let samples = read(&track, 0, 44_100);
    let mut gains = vec![0.0; 44_100];
    track.envelope_values(&mut gains, 0.0);

    track.split_at(0.4).expect("split");
    assert_eq!(track.num_clips(), 2);
    track.join(0.0, 1.0).expect("join");

    assert_eq!(track.num_clips(), 1);
    assert_eq!(spans(&track), vec![(0, 44_100)]);
    assert_eq!(read(&track, 0, 44_100), samples);
    let mut joined = vec![0.0; 44_100];
    track.envelope_values(&mut joined, 0.0);
    for (index, (before, after)) in gains.iter().zip(&joined).enumerate() {
        assert!(
            (before - after).abs() < 1e-6,
            "gain at sample {index} changed from {before} to {after}"
        );
    }
}

#[test]
fn expanding_and_recutting_restores_the_cut_line() {
    let mut track = empty_track();
    add_noise(&mut track, 0.0, 1.0, 13);
    let original = read(&track, 0, 44_100);

    track.clear_and_add_cut_line(0.3, 0.5).expect("cut line");
    let cut_layout = layout(&track);
    let cut_samples = read(&track, 0, 35_280);
    assert_eq!(cut_layout, vec![(0, 35_280, vec![(13_230, 8_820)])]);

    let (start, end) = track
        .expand_cut_line(0.3)
        .expect("expand")
        .expect("cut line found");
    assert_eq!(layout(&track), vec![(0, 44_100, vec![])]);
    assert_eq!(read(&track, 0, 44_100), original);

    track.clear_and_add_cut_line(start, end).expect("cut again");
    assert_eq!(layout(&track), cut_layout);
    assert_eq!(read(&track, 0, 35_280), cut_samples);
}

#[test]
fn cut_line_lookup_tolerance() {
    let mut track = empty_track();
    add_noise(&mut track, 0.0, 1.0, 14);
    track.clear_and_add_cut_line(0.3, 0.5).expect("cut line");

    assert!(!track.remove_cut_line(0.3002));
    assert!(track.expand_cut_line(0.300_05).expect("expand").is_some());
    assert_eq!(track.all_clips().count(), 1);
}

#[test]
fn reversed_intervals_are_rejected() {
    let mut track = empty_track();
    add_noise(&mut track, 0.0, 1.0, 15);
    let before = track.summary();

    assert_eq!(
        track.clear(0.6, 0.2),
        Err(EditError::Ordering { t0: 0.6, t1: 0.2 })
    );
    assert!(matches!(
        track.copy(0.6, 0.2, true),
        Err(EditError::Ordering { .. })
    ));
    assert!(track.is_empty(0.6, 0.2));
    assert_eq!(track.summary(), before);
}

#[test]
fn fixed_clips_paste_into_free_space() {
    let mut track =
        empty_track().with_config(EditConfig::default().with_clips_can_move(false));
    add_noise(&mut track, 0.0, 1.0, 16);
    add_noise(&mut track, 3.0, 1.0, 17);
    let mut src = empty_track();
    src.append(&noise(1.0, 18)).expect("append");

    track.paste(1.5, &src).expect("paste");
    assert_eq!(
        spans(&track),
        vec![(0, 44_100), (66_150, 110_250), (132_300, 176_400)]
    );
}

#[test]
fn config_loads_from_json() {
    let config = EditConfig::from_json(r#"{ "clips_can_move": false }"#).expect("config");
    assert!(!config.clips_can_move);
    assert_eq!(config.merge_point_tolerance, 0.01);
    assert_eq!(config.paste_merge_tolerance_samples, 2.0);
}
