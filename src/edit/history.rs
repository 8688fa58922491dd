use tracing::debug;

use super::EditCommand;
use crate::chart::Timeline;

/// Linear undo/redo history over [`EditCommand`]s.
///
/// Standard invariant: executing a new command after an undo discards the
/// redo branch.
#[derive(Debug, Default)]
pub struct EditHistory {
    undo_stack: Vec<EditCommand>,
    redo_stack: Vec<EditCommand>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an already-executed command.
    pub fn push(&mut self, command: EditCommand) {
        self.undo_stack.push(command);
        self.redo_stack.clear();
    }

    /// Undo the most recent command. Returns false if there is nothing to undo.
    pub fn undo(&mut self, timeline: &mut Timeline) -> bool {
        let Some(mut command) = self.undo_stack.pop() else {
            return false;
        };
        command.apply_backward(timeline);
        self.redo_stack.push(command);
        debug!(depth = self.undo_stack.len(), "undo");
        true
    }

    /// Redo the most recently undone command. Returns false if the redo
    /// branch is empty.
    pub fn redo(&mut self, timeline: &mut Timeline) -> bool {
        let Some(mut command) = self.redo_stack.pop() else {
            return false;
        };
        command.apply_forward(timeline);
        self.undo_stack.push(command);
        debug!(depth = self.undo_stack.len(), "redo");
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undoable commands; hosts compare this against a saved depth
    /// for dirty indicators.
    pub fn depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beat::BeatPos;
    use crate::chart::{Lane, TimelineItem};

    fn note_at(beat: f64, key: &str) -> TimelineItem {
        TimelineItem::note(beat, BeatPos::new(0, 4, 0), Lane::TopNote, key)
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut timeline = Timeline::new();
        let mut history = EditHistory::new();

        history.push(EditCommand::place(&mut timeline, vec![note_at(1.0, "a")]));
        assert_eq!(history.depth(), 1);

        assert!(history.undo(&mut timeline));
        assert!(timeline.is_empty());
        assert!(history.can_redo());

        assert!(history.redo(&mut timeline));
        assert_eq!(timeline.len(), 1);
        assert_eq!(history.depth(), 1);
    }

    #[test]
    fn push_after_undo_discards_redo_branch() {
        let mut timeline = Timeline::new();
        let mut history = EditHistory::new();

        history.push(EditCommand::place(&mut timeline, vec![note_at(1.0, "a")]));
        history.undo(&mut timeline);
        history.push(EditCommand::place(&mut timeline, vec![note_at(2.0, "b")]));

        assert!(!history.can_redo());
        assert!(!history.redo(&mut timeline));
    }

    #[test]
    fn undo_on_empty_history_is_a_noop() {
        let mut timeline = Timeline::new();
        let mut history = EditHistory::new();
        assert!(!history.undo(&mut timeline));
    }
}
