use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ItemKind, Lane, NoteType, Timeline, TimelineItem};
use crate::beat::{BeatPos, TempoMap, TempoSegment, calculate_abs_beat, calculate_beat_pos};
use crate::error::ChartError;

/// Interchange shape of a chart: the tempo map plus the placed items,
/// positions encoded as `[measure, measureSplit, split]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartData {
    pub tempo_map: Vec<TempoRow>,
    pub stops: Vec<StopRow>,
    pub skips: Vec<SkipRow>,
    pub notes: Vec<NoteRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoRow {
    pub pos: [i64; 3],
    pub bpm: f64,
    pub beats_per_measure: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub interpolate_beat_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRow {
    pub pos: [i64; 3],
    /// Duration in beats.
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipRow {
    pub pos: [i64; 3],
    /// Duration in beats.
    pub duration: f64,
    /// Wall-clock seconds the spanned beats compress into.
    pub skiptime: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRow {
    pub pos: [i64; 3],
    pub key: String,
    /// 0 = press, 1 = hold start, 2 = hold release.
    #[serde(rename = "type")]
    pub note_type: u8,
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

fn pos_of(raw: [i64; 3]) -> BeatPos {
    BeatPos::new(raw[0], raw[1], raw[2])
}

fn pos_to_raw(pos: BeatPos) -> [i64; 3] {
    [pos.measure, pos.measure_split, pos.split]
}

fn check_duration(kind: &'static str, value: f64, measure: i64) -> Result<f64, ChartError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ChartError::InvalidDuration { kind, value, measure });
    }
    Ok(value)
}

/// Maps note key labels to their physical keyboard row, which decides the
/// note lane. Labels outside the layout are a load failure.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    lanes: HashMap<String, Lane>,
}

impl KeyLayout {
    /// Standard QWERTY rows: digits and the top letter row feed the top
    /// lane, home row the middle, bottom row the bottom.
    pub fn qwerty() -> Self {
        let rows: [(&str, Lane); 3] = [
            ("1234567890qwertyuiop", Lane::TopNote),
            ("asdfghjkl;", Lane::MidNote),
            ("zxcvbnm,./", Lane::BotNote),
        ];
        let mut lanes = HashMap::new();
        for (keys, lane) in rows {
            for key in keys.chars() {
                lanes.insert(key.to_string(), lane);
            }
        }
        Self { lanes }
    }

    pub fn lane_for(&self, key: &str) -> Option<Lane> {
        self.lanes.get(&key.to_lowercase()).copied()
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::qwerty()
    }
}

/// Build the engine state from interchange data. All-or-nothing: any failure
/// leaves no partially constructed state behind.
pub fn load_chart(data: &ChartData, layout: &KeyLayout) -> Result<(TempoMap, Timeline), ChartError> {
    let map = TempoMap::from_segments(
        data.tempo_map
            .iter()
            .map(|row| {
                TempoSegment::new(
                    pos_of(row.pos),
                    row.beats_per_measure,
                    row.bpm,
                    row.interpolate_beat_duration,
                )
            })
            .collect(),
    )?;
    let segments = map.segments();

    let mut timeline = Timeline::new();

    for stop in &data.stops {
        let pos = pos_of(stop.pos);
        let duration = check_duration("stop", stop.duration, pos.measure)?;
        let abs_beat = calculate_abs_beat(pos, segments);
        let beat_end = abs_beat + duration;
        let end_pos = calculate_beat_pos(beat_end, pos.measure_split, segments);
        timeline.insert(TimelineItem::stop(abs_beat, beat_end, pos, end_pos));
    }

    for skip in &data.skips {
        let pos = pos_of(skip.pos);
        let duration = check_duration("skip", skip.duration, pos.measure)?;
        let skiptime = check_duration("skip time", skip.skiptime, pos.measure)?;
        let abs_beat = calculate_abs_beat(pos, segments);
        let beat_end = abs_beat + duration;
        let end_pos = calculate_beat_pos(beat_end, pos.measure_split, segments);
        timeline.insert(TimelineItem::skip(abs_beat, beat_end, pos, end_pos, skiptime));
    }

    // Hold notes arrive as start/release pairs sharing a key label; pair each
    // release with the most recent open start for that key.
    let mut open_holds: HashMap<String, (BeatPos, f64)> = HashMap::new();
    let mut rows: Vec<&NoteRow> = data.notes.iter().collect();
    rows.sort_by(|a, b| pos_of(a.pos).cmp(&pos_of(b.pos)));

    for row in rows {
        let lane = layout
            .lane_for(&row.key)
            .ok_or_else(|| ChartError::UnsupportedKey { key: row.key.clone() })?;
        let pos = pos_of(row.pos);
        let abs_beat = calculate_abs_beat(pos, segments);
        match NoteType::from_wire(row.note_type) {
            Some(NoteType::KeyPress) => {
                timeline.insert(TimelineItem::note(abs_beat, pos, lane, row.key.clone()));
            }
            Some(NoteType::HoldStart) => {
                if open_holds
                    .insert(row.key.clone(), (pos, abs_beat))
                    .is_some()
                {
                    warn!(key = %row.key, "hold start while previous hold still open");
                    return Err(ChartError::UnmatchedHold { key: row.key.clone() });
                }
            }
            Some(NoteType::HoldRelease) => {
                let (start_pos, start_beat) = open_holds
                    .remove(&row.key)
                    .ok_or_else(|| ChartError::UnmatchedHold { key: row.key.clone() })?;
                timeline.insert(TimelineItem::hold(
                    start_beat,
                    abs_beat,
                    start_pos,
                    pos,
                    lane,
                    row.key.clone(),
                ));
            }
            None => return Err(ChartError::UnknownNoteType(row.note_type)),
        }
    }

    if let Some(key) = open_holds.into_keys().next() {
        return Err(ChartError::UnmatchedHold { key });
    }

    Ok((map, timeline))
}

/// Parse a JSON document into engine state.
pub fn parse_chart(json: &str, layout: &KeyLayout) -> Result<(TempoMap, Timeline), ChartError> {
    let data: ChartData = serde_json::from_str(json)?;
    load_chart(&data, layout)
}

/// Flatten engine state back into the interchange shape. Held notes split
/// into matched start/release rows sharing their key label.
pub fn save_chart(map: &TempoMap, timeline: &Timeline) -> ChartData {
    let mut data = ChartData::default();

    for seg in map.segments() {
        data.tempo_map.push(TempoRow {
            pos: pos_to_raw(seg.beat_pos),
            bpm: seg.bpm,
            beats_per_measure: seg.beats_per_measure,
            interpolate_beat_duration: seg.interpolate_beat_duration,
        });
    }

    for item in timeline.items() {
        match &item.kind {
            ItemKind::Stop => data.stops.push(StopRow {
                pos: pos_to_raw(item.beat_pos),
                duration: item.beat_duration(),
            }),
            ItemKind::Skip { skip_time } => data.skips.push(SkipRow {
                pos: pos_to_raw(item.beat_pos),
                duration: item.beat_duration(),
                skiptime: *skip_time,
            }),
            ItemKind::Note { .. } => {
                if item.is_zero_duration() {
                    data.notes.push(NoteRow {
                        pos: pos_to_raw(item.beat_pos),
                        key: item.display_text.clone(),
                        note_type: NoteType::KeyPress.to_wire(),
                    });
                } else {
                    data.notes.push(NoteRow {
                        pos: pos_to_raw(item.beat_pos),
                        key: item.display_text.clone(),
                        note_type: NoteType::HoldStart.to_wire(),
                    });
                    data.notes.push(NoteRow {
                        pos: pos_to_raw(item.end_beat_pos),
                        key: item.display_text.clone(),
                        note_type: NoteType::HoldRelease.to_wire(),
                    });
                }
            }
        }
    }

    data
}

/// Serialize engine state to a JSON document.
pub fn write_chart(map: &TempoMap, timeline: &Timeline) -> Result<String, ChartError> {
    Ok(serde_json::to_string_pretty(&save_chart(map, timeline))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_data() -> ChartData {
        ChartData {
            tempo_map: vec![TempoRow {
                pos: [0, 1, 0],
                bpm: 120.0,
                beats_per_measure: 4,
                interpolate_beat_duration: 0.0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn notes_land_on_their_keyboard_row() {
        let mut data = basic_data();
        data.notes = vec![
            NoteRow { pos: [0, 4, 0], key: "q".into(), note_type: 0 },
            NoteRow { pos: [0, 4, 1], key: "f".into(), note_type: 0 },
            NoteRow { pos: [0, 4, 2], key: "v".into(), note_type: 0 },
        ];
        let (_, timeline) = load_chart(&data, &KeyLayout::qwerty()).unwrap();
        let lanes: Vec<Lane> = timeline.items().map(|i| i.lane).collect();
        assert_eq!(lanes, vec![Lane::TopNote, Lane::MidNote, Lane::BotNote]);
    }

    #[test]
    fn unknown_key_fails_load() {
        let mut data = basic_data();
        data.notes = vec![NoteRow { pos: [0, 1, 0], key: "ß".into(), note_type: 0 }];
        let err = load_chart(&data, &KeyLayout::qwerty()).unwrap_err();
        assert!(matches!(err, ChartError::UnsupportedKey { .. }));
    }

    #[test]
    fn hold_pair_becomes_single_spanning_note() {
        let mut data = basic_data();
        data.notes = vec![
            NoteRow { pos: [0, 2, 0], key: "j".into(), note_type: 1 },
            NoteRow { pos: [0, 2, 1], key: "j".into(), note_type: 2 },
        ];
        let (_, timeline) = load_chart(&data, &KeyLayout::qwerty()).unwrap();
        assert_eq!(timeline.len(), 1);
        let hold = timeline.items().next().unwrap();
        assert_eq!(hold.abs_beat, 0.0);
        assert_eq!(hold.beat_end, 2.0);
        assert_eq!(hold.display_text, "j");
    }

    #[test]
    fn unmatched_hold_fails_load() {
        let mut data = basic_data();
        data.notes = vec![NoteRow { pos: [0, 2, 0], key: "j".into(), note_type: 1 }];
        let err = load_chart(&data, &KeyLayout::qwerty()).unwrap_err();
        assert!(matches!(err, ChartError::UnmatchedHold { .. }));
    }

    #[test]
    fn stops_and_skips_carry_durations() {
        let mut data = basic_data();
        data.stops = vec![StopRow { pos: [1, 1, 0], duration: 2.0 }];
        data.skips = vec![SkipRow { pos: [2, 1, 0], duration: 4.0, skiptime: 0.25 }];
        let (_, timeline) = load_chart(&data, &KeyLayout::qwerty()).unwrap();

        let stop = timeline.items().find(|i| i.lane == Lane::Stop).unwrap();
        assert_eq!(stop.abs_beat, 4.0);
        assert_eq!(stop.beat_end, 6.0);

        let skip = timeline.items().find(|i| i.lane == Lane::Skip).unwrap();
        assert_eq!(skip.kind, ItemKind::Skip { skip_time: 0.25 });
        assert_eq!(skip.beat_duration(), 4.0);
    }

    #[test]
    fn zero_bpm_fails_load() {
        let mut data = basic_data();
        data.tempo_map.push(TempoRow {
            pos: [2, 1, 0],
            bpm: 0.0,
            beats_per_measure: 4,
            interpolate_beat_duration: 0.0,
        });
        let err = load_chart(&data, &KeyLayout::qwerty()).unwrap_err();
        assert!(matches!(err, ChartError::InvalidTempoMap(_)));
    }

    #[test]
    fn negative_stop_duration_fails_load() {
        let mut data = basic_data();
        data.stops = vec![StopRow { pos: [1, 1, 0], duration: -3.0 }];
        let err = load_chart(&data, &KeyLayout::qwerty()).unwrap_err();
        assert!(matches!(err, ChartError::InvalidDuration { kind: "stop", .. }));
    }

    #[test]
    fn negative_skip_numbers_fail_load() {
        let mut data = basic_data();
        data.skips = vec![SkipRow { pos: [1, 1, 0], duration: -2.0, skiptime: 0.5 }];
        assert!(load_chart(&data, &KeyLayout::qwerty()).is_err());

        data.skips = vec![SkipRow { pos: [1, 1, 0], duration: 2.0, skiptime: -0.5 }];
        assert!(load_chart(&data, &KeyLayout::qwerty()).is_err());
    }

    #[test]
    fn save_round_trips_holds_as_pairs() {
        let mut data = basic_data();
        data.notes = vec![
            NoteRow { pos: [0, 4, 0], key: "q".into(), note_type: 0 },
            NoteRow { pos: [1, 2, 0], key: "j".into(), note_type: 1 },
            NoteRow { pos: [1, 2, 1], key: "j".into(), note_type: 2 },
        ];
        let (map, timeline) = load_chart(&data, &KeyLayout::qwerty()).unwrap();
        let saved = save_chart(&map, &timeline);

        assert_eq!(saved.notes.len(), 3);
        let types: Vec<u8> = saved.notes.iter().map(|n| n.note_type).collect();
        assert_eq!(types.iter().filter(|t| **t == 1).count(), 1);
        assert_eq!(types.iter().filter(|t| **t == 2).count(), 1);

        // A second load of the saved data reproduces the same timeline.
        let (_, reloaded) = load_chart(&saved, &KeyLayout::qwerty()).unwrap();
        assert_eq!(reloaded.len(), timeline.len());
    }

    #[test]
    fn json_field_names_match_schema() {
        let mut data = basic_data();
        data.tempo_map[0].interpolate_beat_duration = 1.5;
        data.skips = vec![SkipRow { pos: [0, 1, 0], duration: 1.0, skiptime: 0.5 }];
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"tempoMap\""));
        assert!(json.contains("\"beatsPerMeasure\""));
        assert!(json.contains("\"interpolateBeatDuration\""));
        assert!(json.contains("\"skiptime\""));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_chart("{ not json", &KeyLayout::qwerty()).unwrap_err();
        assert!(matches!(err, ChartError::Parse(_)));
    }
}
