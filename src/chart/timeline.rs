use std::collections::HashMap;

use tracing::debug;

use super::{ItemKind, Lane, TimelineItem};
use crate::beat::{TempoSegment, calculate_beat_pos};

/// Stable handle into the timeline's item arena. Handles survive unrelated
/// mutations; deleting an item vacates its slot, so a held handle can be
/// checked for staleness without touching freed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(u32);

/// Ordered collection of placed timeline items.
///
/// Items live in a slot arena addressed by [`ItemId`]; a parallel order list
/// is kept sorted by `abs_beat` after every mutation. Per-lane counts and the
/// key-label frequency table are maintained incrementally.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    slots: Vec<Option<TimelineItem>>,
    free: Vec<u32>,
    order: Vec<ItemId>,
    lane_counts: [usize; Lane::COUNT],
    key_counts: HashMap<String, usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&TimelineItem> {
        self.slots.get(id.0 as usize).and_then(|s| s.as_ref())
    }

    /// Live items in ascending `abs_beat` order.
    pub fn items(&self) -> impl Iterator<Item = &TimelineItem> {
        self.order.iter().map(|id| self.item(*id))
    }

    /// Live `(id, item)` pairs in ascending `abs_beat` order.
    pub fn items_with_ids(&self) -> impl Iterator<Item = (ItemId, &TimelineItem)> {
        self.order.iter().map(|id| (*id, self.item(*id)))
    }

    pub fn lane_count(&self, lane: Lane) -> usize {
        self.lane_counts[lane.index()]
    }

    pub fn key_count(&self, key: &str) -> usize {
        self.key_counts.get(key).copied().unwrap_or(0)
    }

    /// Most-used note key labels, highest count first (ties alphabetical).
    pub fn hottest_keys(&self, limit: usize) -> Vec<(String, usize)> {
        let mut ranked: Vec<(String, usize)> = self
            .key_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(k, c)| (k.clone(), *c))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Insert an item, keeping the order list sorted by `abs_beat`.
    pub fn insert(&mut self, item: TimelineItem) -> ItemId {
        self.count_item(&item, 1);
        let id = self.alloc(item);
        let pos = self
            .order
            .partition_point(|other| self.item(*other).abs_beat <= self.item(id).abs_beat);
        self.order.insert(pos, id);
        debug!(beat = self.item(id).abs_beat, lane = ?self.item(id).lane, "item inserted");
        id
    }

    /// Remove an item by handle. Returns the item if the handle was live.
    pub fn remove(&mut self, id: ItemId) -> Option<TimelineItem> {
        let item = self.slots.get_mut(id.0 as usize)?.take()?;
        self.free.push(id.0);
        self.order.retain(|other| *other != id);
        self.count_item(&item, -1);
        debug!(beat = item.abs_beat, lane = ?item.lane, "item removed");
        Some(item)
    }

    /// Remove the first live item equal to `target` (placement and payload).
    pub fn remove_matching(&mut self, target: &TimelineItem) -> Option<TimelineItem> {
        let id = self
            .items_with_ids()
            .find(|(_, item)| *item == target)
            .map(|(id, _)| id)?;
        self.remove(id)
    }

    /// Items with lane in `[lane_min, lane_max]` and `abs_beat` in
    /// `[start_beat, end_beat]`, ascending by `abs_beat`. Scanning stops at
    /// the first item past `end_beat` since the order list is sorted.
    pub fn query_range(
        &self,
        start_beat: f64,
        end_beat: f64,
        lane_min: Lane,
        lane_max: Lane,
    ) -> Vec<ItemId> {
        let mut found = Vec::new();
        for (id, item) in self.items_with_ids() {
            if item.abs_beat > end_beat {
                break;
            }
            if item.abs_beat >= start_beat && item.lane >= lane_min && item.lane <= lane_max {
                found.push(id);
            }
        }
        found
    }

    /// Delete every item matched by the range query, returning the removed
    /// items in `abs_beat` order (the payload an undoing caller needs).
    pub fn delete_range(
        &mut self,
        start_beat: f64,
        end_beat: f64,
        lane_min: Lane,
        lane_max: Lane,
    ) -> Vec<TimelineItem> {
        let ids = self.query_range(start_beat, end_beat, lane_min, lane_max);
        ids.into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    /// Re-anchor a previously extracted batch at `at_beat`, preserving the
    /// items' relative spacing. Any existing items in the destination range
    /// are overwritten first; the caller receives them for its undo record.
    ///
    /// Rational positions are rederived from the tempo map at each item's
    /// own snap denominator.
    pub fn insert_batch(
        &mut self,
        at_beat: f64,
        items: &[TimelineItem],
        segments: &[TempoSegment],
    ) -> (Vec<ItemId>, Vec<TimelineItem>) {
        let Some(first_beat) = items
            .iter()
            .map(|i| i.abs_beat)
            .min_by(|a, b| a.total_cmp(b))
        else {
            return (Vec::new(), Vec::new());
        };
        let offset = at_beat - first_beat;
        let span_end = items
            .iter()
            .map(|i| i.beat_end + offset)
            .max_by(|a, b| a.total_cmp(b))
            .unwrap_or(at_beat);

        let overwritten = self.delete_range(at_beat, span_end, Lane::TopNote, Lane::Skip);

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let mut moved = item.clone();
            moved.abs_beat = item.abs_beat + offset;
            moved.beat_end = item.beat_end + offset;
            moved.beat_pos =
                calculate_beat_pos(moved.abs_beat, item.beat_pos.measure_split, segments);
            moved.end_beat_pos =
                calculate_beat_pos(moved.beat_end, item.end_beat_pos.measure_split, segments);
            moved.passed = false;
            inserted.push(self.insert(moved));
        }
        (inserted, overwritten)
    }

    /// Update the display text of the unique item in `lane` whose interval
    /// contains `at_beat`. Returns the handle and the previous text.
    pub fn edit_display_text(
        &mut self,
        at_beat: f64,
        lane: Lane,
        new_text: &str,
    ) -> Option<(ItemId, String)> {
        let id = self
            .items_with_ids()
            .find(|(_, item)| item.lane == lane && item.contains_beat(at_beat))
            .map(|(id, _)| id)?;
        let is_note = self.item(id).is_note();
        let old = std::mem::replace(
            &mut self.item_mut(id).display_text,
            new_text.to_string(),
        );
        if is_note {
            self.count_key(&old, -1);
            self.count_key(new_text, 1);
        }
        Some((id, old))
    }

    /// Set the `passed` flag on every item at or before `beat`, clearing it
    /// on the rest. Called by the host as the playback position advances.
    pub fn mark_passed_up_to(&mut self, beat: f64) {
        for id in self.order.clone() {
            let item = self.item_mut(id);
            item.passed = item.abs_beat <= beat;
        }
    }

    /// Resolve a possibly stale `(handle, expected payload)` pair captured by
    /// an edit command. A live handle whose item still equals the payload
    /// wins; otherwise the timeline is scanned for a value-equal replacement.
    pub fn resolve(&self, id: ItemId, expected: &TimelineItem) -> Option<ItemId> {
        if self.get(id).is_some_and(|item| item == expected) {
            return Some(id);
        }
        self.items_with_ids()
            .find(|(_, item)| item.matches_placement(expected))
            .map(|(id, _)| id)
    }

    /// Drop everything and rebuild aggregates from scratch.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.order.clear();
        self.lane_counts = [0; Lane::COUNT];
        self.key_counts.clear();
    }

    fn alloc(&mut self, item: TimelineItem) -> ItemId {
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(item);
            ItemId(slot)
        } else {
            self.slots.push(Some(item));
            ItemId((self.slots.len() - 1) as u32)
        }
    }

    fn item(&self, id: ItemId) -> &TimelineItem {
        self.slots[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| unreachable!("order list held a vacated slot"))
    }

    fn item_mut(&mut self, id: ItemId) -> &mut TimelineItem {
        self.slots[id.0 as usize]
            .as_mut()
            .unwrap_or_else(|| unreachable!("order list held a vacated slot"))
    }

    fn count_item(&mut self, item: &TimelineItem, delta: isize) {
        let count = &mut self.lane_counts[item.lane.index()];
        *count = count.checked_add_signed(delta).unwrap_or(0);
        if matches!(item.kind, ItemKind::Note { .. }) {
            self.count_key(&item.display_text, delta);
        }
    }

    fn count_key(&mut self, key: &str, delta: isize) {
        let entry = self.key_counts.entry(key.to_string()).or_insert(0);
        *entry = entry.checked_add_signed(delta).unwrap_or(0);
    }
}
