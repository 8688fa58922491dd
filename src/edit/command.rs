use tracing::debug;

use crate::beat::TempoSegment;
use crate::chart::{ItemId, Lane, Timeline, TimelineItem};

/// One item of a move batch: the captured handle plus full before/after
/// payloads, enough to replay the move in either direction even if the
/// handle has gone stale in the meantime.
#[derive(Debug, Clone)]
pub struct MovedItem {
    pub id: ItemId,
    pub before: TimelineItem,
    pub after: TimelineItem,
}

/// A reversible timeline edit. Constructed by performing the edit (the
/// constructor captures every payload needed to replay it), then replayed in
/// either direction by the history: `apply_backward` is the exact inverse of
/// `apply_forward` for every variant.
#[derive(Debug, Clone)]
pub enum EditCommand {
    /// Items placed on the timeline, overwriting whatever occupied the
    /// destination.
    Place {
        added: Vec<TimelineItem>,
        overwritten: Vec<TimelineItem>,
    },
    /// Items removed from a lane/beat range.
    Delete { removed: Vec<TimelineItem> },
    /// A batch of items shifted to new positions. Stale handles are
    /// reconciled against the live timeline before each replay.
    Move { moved: Vec<MovedItem> },
    /// A display-text change on the item containing `at_beat` in `lane`.
    EditText {
        at_beat: f64,
        lane: Lane,
        before: String,
        after: String,
    },
}

impl EditCommand {
    /// Place `items`, deleting anything already in their way. Each placed
    /// item claims its own exact lane/beat span.
    pub fn place(timeline: &mut Timeline, items: Vec<TimelineItem>) -> Self {
        let mut overwritten = Vec::new();
        for item in &items {
            overwritten.extend(timeline.delete_range(
                item.abs_beat,
                item.beat_end,
                item.lane,
                item.lane,
            ));
        }
        for item in &items {
            timeline.insert(item.clone());
        }
        debug!(count = items.len(), "place command executed");
        Self::Place { added: items, overwritten }
    }

    /// Delete every item in the lane/beat range. `None` if nothing matched.
    pub fn delete_range(
        timeline: &mut Timeline,
        start_beat: f64,
        end_beat: f64,
        lane_min: Lane,
        lane_max: Lane,
    ) -> Option<Self> {
        let removed = timeline.delete_range(start_beat, end_beat, lane_min, lane_max);
        if removed.is_empty() {
            return None;
        }
        debug!(count = removed.len(), "delete command executed");
        Some(Self::Delete { removed })
    }

    /// Re-anchor a copied batch at `at_beat` (paste). The overwrite-delete of
    /// the destination range is part of this command's undo payload.
    pub fn paste(
        timeline: &mut Timeline,
        at_beat: f64,
        items: &[TimelineItem],
        segments: &[TempoSegment],
    ) -> Self {
        let (inserted, overwritten) = timeline.insert_batch(at_beat, items, segments);
        let added = inserted
            .iter()
            .filter_map(|id| timeline.get(*id).cloned())
            .collect();
        Self::Place { added, overwritten }
    }

    /// Shift every item in the lane/beat range by `beat_delta`, rederiving
    /// rational positions from the tempo map.
    pub fn shift(
        timeline: &mut Timeline,
        start_beat: f64,
        end_beat: f64,
        lane_min: Lane,
        lane_max: Lane,
        beat_delta: f64,
        segments: &[TempoSegment],
    ) -> Option<Self> {
        use crate::beat::calculate_beat_pos;

        let ids = timeline.query_range(start_beat, end_beat, lane_min, lane_max);
        if ids.is_empty() {
            return None;
        }
        let mut moved = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(before) = timeline.remove(id) else { continue };
            let mut after = before.clone();
            after.abs_beat = before.abs_beat + beat_delta;
            after.beat_end = before.beat_end + beat_delta;
            after.beat_pos =
                calculate_beat_pos(after.abs_beat, before.beat_pos.measure_split, segments);
            after.end_beat_pos =
                calculate_beat_pos(after.beat_end, before.end_beat_pos.measure_split, segments);
            let new_id = timeline.insert(after.clone());
            moved.push(MovedItem { id: new_id, before, after });
        }
        debug!(count = moved.len(), beat_delta, "shift command executed");
        Some(Self::Move { moved })
    }

    /// Change the display text of the item containing `at_beat` in `lane`.
    pub fn edit_text(
        timeline: &mut Timeline,
        at_beat: f64,
        lane: Lane,
        new_text: &str,
    ) -> Option<Self> {
        let (_, before) = timeline.edit_display_text(at_beat, lane, new_text)?;
        Some(Self::EditText {
            at_beat,
            lane,
            before,
            after: new_text.to_string(),
        })
    }

    /// Redo: replay the edit in the forward direction.
    pub fn apply_forward(&mut self, timeline: &mut Timeline) {
        match self {
            Self::Place { added, overwritten } => {
                for item in overwritten.iter() {
                    timeline.remove_matching(item);
                }
                for item in added.iter() {
                    timeline.insert(item.clone());
                }
            }
            Self::Delete { removed } => {
                for item in removed.iter() {
                    timeline.remove_matching(item);
                }
            }
            Self::Move { moved } => {
                for entry in moved.iter_mut() {
                    Self::replay_move(timeline, entry, Direction::Forward);
                }
            }
            Self::EditText { at_beat, lane, after, .. } => {
                timeline.edit_display_text(*at_beat, *lane, after);
            }
        }
    }

    /// Undo: replay the edit in the backward direction.
    pub fn apply_backward(&mut self, timeline: &mut Timeline) {
        match self {
            Self::Place { added, overwritten } => {
                for item in added.iter() {
                    timeline.remove_matching(item);
                }
                for item in overwritten.iter() {
                    timeline.insert(item.clone());
                }
            }
            Self::Delete { removed } => {
                for item in removed.iter() {
                    timeline.insert(item.clone());
                }
            }
            Self::Move { moved } => {
                for entry in moved.iter_mut() {
                    Self::replay_move(timeline, entry, Direction::Backward);
                }
            }
            Self::EditText { at_beat, lane, before, .. } => {
                timeline.edit_display_text(*at_beat, *lane, before);
            }
        }
    }

    /// Move one batch entry in the given direction, reconciling the captured
    /// handle first: a handle invalidated by an intervening delete is
    /// replaced by a value-equal live item if one exists, and the entry is
    /// skipped as genuinely absent otherwise.
    fn replay_move(timeline: &mut Timeline, entry: &mut MovedItem, direction: Direction) {
        let (from, to) = match direction {
            Direction::Forward => (&entry.before, &entry.after),
            Direction::Backward => (&entry.after, &entry.before),
        };
        let Some(id) = timeline.resolve(entry.id, from) else {
            debug!("move entry absent from timeline, skipping");
            return;
        };
        timeline.remove(id);
        entry.id = timeline.insert(to.clone());
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}
