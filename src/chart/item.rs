use crate::beat::BeatPos;

/// Placement track of a timeline item: three note rows plus the stop and
/// skip gutters. Ordering follows the visual top-to-bottom layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lane {
    TopNote,
    MidNote,
    BotNote,
    Stop,
    Skip,
}

impl Lane {
    pub const COUNT: usize = 5;

    pub fn all() -> &'static [Lane] {
        &[Lane::TopNote, Lane::MidNote, Lane::BotNote, Lane::Stop, Lane::Skip]
    }

    pub fn index(&self) -> usize {
        match self {
            Lane::TopNote => 0,
            Lane::MidNote => 1,
            Lane::BotNote => 2,
            Lane::Stop => 3,
            Lane::Skip => 4,
        }
    }

    pub fn is_note_lane(&self) -> bool {
        matches!(self, Lane::TopNote | Lane::MidNote | Lane::BotNote)
    }
}

/// Wire-level note kind. Holds are stored internally as a single
/// press-with-duration item; the start/release pair only exists in the
/// serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteType {
    KeyPress,
    HoldStart,
    HoldRelease,
}

impl NoteType {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::KeyPress),
            1 => Some(Self::HoldStart),
            2 => Some(Self::HoldRelease),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::KeyPress => 0,
            Self::HoldStart => 1,
            Self::HoldRelease => 2,
        }
    }
}

/// Snap denominator a note was placed at; drives grid coloring in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapSplit {
    Whole,
    Half,
    Third,
    Quarter,
    Sixth,
    Eighth,
    Twelfth,
    Sixteenth,
    Other,
}

impl SnapSplit {
    pub fn from_denominator(denom: i64) -> Self {
        match denom {
            1 => Self::Whole,
            2 => Self::Half,
            3 => Self::Third,
            4 => Self::Quarter,
            6 => Self::Sixth,
            8 => Self::Eighth,
            12 => Self::Twelfth,
            16 => Self::Sixteenth,
            _ => Self::Other,
        }
    }
}

/// Kind-specific payload of a timeline item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Note { note_type: NoteType, split: SnapSplit },
    Stop,
    /// `skip_time` is the wall-clock seconds the spanned beats are
    /// compressed into during playback; near zero means an instant warp.
    Skip { skip_time: f64 },
}

/// A placed object on the timeline: a note, a stop, or a skip.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    pub abs_beat: f64,
    pub beat_end: f64,
    pub beat_pos: BeatPos,
    pub end_beat_pos: BeatPos,
    pub lane: Lane,
    /// Key label for notes; informational text for stops and skips.
    pub display_text: String,
    /// Set once the playback position has moved past this item.
    pub passed: bool,
    pub kind: ItemKind,
}

impl TimelineItem {
    pub fn note(abs_beat: f64, beat_pos: BeatPos, lane: Lane, key: impl Into<String>) -> Self {
        Self {
            abs_beat,
            beat_end: abs_beat,
            beat_pos,
            end_beat_pos: beat_pos,
            lane,
            display_text: key.into(),
            passed: false,
            kind: ItemKind::Note {
                note_type: NoteType::KeyPress,
                split: SnapSplit::from_denominator(beat_pos.measure_split),
            },
        }
    }

    /// A held note: a press that spans `[abs_beat, beat_end]`.
    pub fn hold(
        abs_beat: f64,
        beat_end: f64,
        beat_pos: BeatPos,
        end_beat_pos: BeatPos,
        lane: Lane,
        key: impl Into<String>,
    ) -> Self {
        let mut item = Self::note(abs_beat, beat_pos, lane, key);
        item.beat_end = beat_end;
        item.end_beat_pos = end_beat_pos;
        item
    }

    pub fn stop(abs_beat: f64, beat_end: f64, beat_pos: BeatPos, end_beat_pos: BeatPos) -> Self {
        Self {
            abs_beat,
            beat_end,
            beat_pos,
            end_beat_pos,
            lane: Lane::Stop,
            display_text: String::new(),
            passed: false,
            kind: ItemKind::Stop,
        }
    }

    pub fn skip(
        abs_beat: f64,
        beat_end: f64,
        beat_pos: BeatPos,
        end_beat_pos: BeatPos,
        skip_time: f64,
    ) -> Self {
        Self {
            abs_beat,
            beat_end,
            beat_pos,
            end_beat_pos,
            lane: Lane::Skip,
            display_text: String::new(),
            passed: false,
            kind: ItemKind::Skip { skip_time },
        }
    }

    pub fn beat_duration(&self) -> f64 {
        self.beat_end - self.abs_beat
    }

    pub fn is_zero_duration(&self) -> bool {
        self.beat_end == self.abs_beat
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, ItemKind::Note { .. })
    }

    /// Containment is half-open `[abs_beat, beat_end)`, except that
    /// zero-duration items match only at the exact instant.
    pub fn contains_beat(&self, beat: f64) -> bool {
        if self.is_zero_duration() {
            beat == self.abs_beat
        } else {
            beat >= self.abs_beat && beat < self.beat_end
        }
    }

    /// Placement identity used when reconciling stale undo references:
    /// same lane, beat range, and rational position.
    pub fn matches_placement(&self, other: &TimelineItem) -> bool {
        self.lane == other.lane
            && self.abs_beat == other.abs_beat
            && self.beat_end == other.beat_end
            && self.beat_pos == other.beat_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_matches_only_exact_instant() {
        let note = TimelineItem::note(4.0, BeatPos::new(1, 1, 0), Lane::TopNote, "5");
        assert!(note.contains_beat(4.0));
        assert!(!note.contains_beat(4.0001));
        assert!(!note.contains_beat(3.9999));
    }

    #[test]
    fn spanning_item_is_half_open() {
        let stop = TimelineItem::stop(2.0, 4.0, BeatPos::new(0, 2, 1), BeatPos::new(1, 1, 0));
        assert!(stop.contains_beat(2.0));
        assert!(stop.contains_beat(3.999));
        assert!(!stop.contains_beat(4.0));
    }

    #[test]
    fn note_snap_split_derived_from_position() {
        let note = TimelineItem::note(1.0, BeatPos::new(0, 8, 2), Lane::MidNote, "j");
        assert_eq!(
            note.kind,
            ItemKind::Note {
                note_type: NoteType::KeyPress,
                split: SnapSplit::Eighth
            }
        );
    }

    #[test]
    fn placement_identity_ignores_text_and_passed() {
        let a = TimelineItem::note(1.0, BeatPos::new(0, 4, 1), Lane::TopNote, "q");
        let mut b = a.clone();
        b.display_text = "w".into();
        b.passed = true;
        assert!(a.matches_placement(&b));
    }
}
