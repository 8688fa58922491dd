use beatline::beat::{BeatPos, TempoMap, TempoSegment, calculate_abs_beat, calculate_beat_pos};
use proptest::prelude::*;

fn two_tempo_map() -> TempoMap {
    TempoMap::from_segments(vec![
        TempoSegment::new(BeatPos::new(0, 1, 0), 4, 120.0, 0.0),
        TempoSegment::new(BeatPos::new(4, 1, 0), 4, 180.0, 0.0),
    ])
    .unwrap()
}

#[test]
fn four_measures_of_common_time_is_sixteen_beats() {
    let map = two_tempo_map();
    let beat = calculate_abs_beat(BeatPos::new(4, 1, 0), map.segments());
    assert!(
        (beat - 16.0).abs() < 1e-9,
        "4 measures x 4 beats at the first tempo, got {beat}"
    );
}

#[test]
fn tempo_change_does_not_warp_beat_positions() {
    // BPM affects time, not the beat count; measure 6 is still 16 + 8 beats.
    let map = two_tempo_map();
    let beat = calculate_abs_beat(BeatPos::new(6, 1, 0), map.segments());
    assert!((beat - 24.0).abs() < 1e-9);
}

#[test]
fn time_signature_change_scales_beats() {
    let map = TempoMap::from_segments(vec![
        TempoSegment::new(BeatPos::new(0, 1, 0), 4, 120.0, 0.0),
        TempoSegment::new(BeatPos::new(4, 1, 0), 7, 120.0, 0.0),
    ])
    .unwrap();
    let beat = calculate_abs_beat(BeatPos::new(6, 1, 0), map.segments());
    assert!((beat - 30.0).abs() < 1e-9, "16 beats then two 7/4 measures");
}

#[test]
fn positions_before_the_map_extrapolate_with_the_first_segment() {
    let map = two_tempo_map();
    let beat = calculate_abs_beat(BeatPos::new(-1, 1, 0), map.segments());
    assert!((beat + 4.0).abs() < 1e-9);
}

#[test]
fn segment_times_follow_bpm() {
    let map = two_tempo_map();
    let second = map.segments()[1];
    // 16 beats at 120 BPM is 8 seconds.
    assert!((second.abs_time_start - 8.0).abs() < 1e-9);
}

proptest! {
    /// calculate_beat_pos(calculate_abs_beat(p)) == p whenever p is
    /// representable at the queried denominator.
    #[test]
    fn abs_beat_round_trips_through_beat_pos(
        measure in 0i64..64,
        denom in 1i64..32,
        split in 0i64..32,
    ) {
        let pos = BeatPos::new(measure, denom, split % denom.max(1));
        let map = two_tempo_map();
        let beat = calculate_abs_beat(pos, map.segments());
        let back = calculate_beat_pos(beat, pos.measure_split, map.segments());
        prop_assert_eq!(back, pos);
    }

    #[test]
    fn add_sub_inverse(
        m1 in -16i64..16, d1 in 1i64..24, s1 in 0i64..24,
        m2 in -16i64..16, d2 in 1i64..24, s2 in 0i64..24,
    ) {
        let a = BeatPos::new(m1, d1, s1 % d1);
        let b = BeatPos::new(m2, d2, s2 % d2);
        prop_assert_eq!((a + b) - b, a);
    }

    #[test]
    fn ordering_consistent_with_real_position(
        m1 in -16i64..16, d1 in 1i64..24, s1 in 0i64..24,
        m2 in -16i64..16, d2 in 1i64..24, s2 in 0i64..24,
    ) {
        let a = BeatPos::new(m1, d1, s1 % d1);
        let b = BeatPos::new(m2, d2, s2 % d2);
        let real = a.as_measures().partial_cmp(&b.as_measures()).unwrap();
        if real != std::cmp::Ordering::Equal {
            prop_assert_eq!(a.cmp(&b), real);
        }
    }
}
