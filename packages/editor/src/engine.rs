//! # Transaction Engine
//!
//! Owns the authoritative `(Document, RangeTracker, Selection)` triple.
//! `apply` is the single externally-observable mutation point: every user
//! gesture (typing, block insertion, drag/drop, collapse/expand) arrives
//! here as a [`Transaction`] value, and undo/redo re-enter the same path.
//! Everything outside the engine works on cloned snapshots.

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::document::Document;
use crate::errors::EditorError;
use crate::ranges::RangeTracker;
use crate::transaction::Transaction;
use crate::undo_stack::UndoStack;

/// Which block, if any, is currently selected. Mutual exclusion: selecting
/// a block replaces any previous selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub active_block: Option<Uuid>,
}

impl Selection {
    pub fn select(&mut self, id: Uuid) {
        self.active_block = Some(id);
    }

    pub fn clear(&mut self) {
        self.active_block = None;
    }

    pub fn is_selected(&self, id: Uuid) -> bool {
        self.active_block == Some(id)
    }
}

/// Snapshot of engine state between transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditorState {
    pub document: Document,
    pub ranges: RangeTracker,
    pub selection: Selection,
}

/// Observer invoked with a snapshot after every successful apply
pub type Observer = Box<dyn FnMut(&EditorState)>;

/// The transaction engine
pub struct Engine {
    state: EditorState,
    history: UndoStack,
    observers: Vec<Observer>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_text("")
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            state: EditorState {
                document: Document::new(text),
                ..Default::default()
            },
            history: UndoStack::new(),
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn document(&self) -> &Document {
        &self.state.document
    }

    pub fn ranges(&self) -> &RangeTracker {
        &self.state.ranges
    }

    pub fn selection(&self) -> Selection {
        self.state.selection
    }

    /// Cloned snapshot, safe to hold across future transactions
    pub fn snapshot(&self) -> EditorState {
        self.state.clone()
    }

    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    /// Apply a transaction atomically. On success the new state is
    /// committed, the inverse recorded for undo, and observers notified;
    /// on failure the state is untouched.
    pub fn apply(&mut self, transaction: Transaction) -> Result<u64, EditorError> {
        let (next, inverse) = transaction.apply_to(&self.state)?;
        debug!(
            version = next.document.version(),
            changes = transaction.changes.len(),
            effects = transaction.effects.len(),
            "transaction applied"
        );
        self.history.record(transaction, inverse);
        Ok(self.commit(next))
    }

    fn commit(&mut self, next: EditorState) -> u64 {
        self.state = next;
        let version = self.state.document.version();
        for observer in &mut self.observers {
            observer(&self.state);
        }
        version
    }

    pub fn select_block(&mut self, id: Uuid) -> Result<(), EditorError> {
        if self.state.ranges.find(id).is_none() {
            return Err(EditorError::BlockNotFound(id));
        }
        self.state.selection.select(id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.state.selection.clear();
    }

    /// Undo the most recent transaction (or batch); false when there is
    /// nothing to undo
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let Some(record) = self.history.pop_undo() else {
            return Ok(false);
        };

        let mut next = self.state.clone();
        for inverse in &record.inverses {
            match inverse.apply_to(&next) {
                Ok((applied, _)) => next = applied,
                Err(err) => {
                    self.history.restore_undo(record);
                    return Err(err);
                }
            }
        }

        debug!(version = next.document.version(), "undo");
        self.history.push_undone(record);
        self.commit(next);
        Ok(true)
    }

    /// Redo the most recently undone transaction (or batch)
    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let Some(record) = self.history.pop_redo() else {
            return Ok(false);
        };

        let mut next = self.state.clone();
        for transaction in &record.transactions {
            match transaction.apply_to(&next) {
                Ok((applied, _)) => next = applied,
                Err(err) => {
                    self.history.restore_redo(record);
                    return Err(err);
                }
            }
        }

        debug!(version = next.document.version(), "redo");
        self.history.push_redone(record);
        self.commit(next);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Group subsequent transactions into one undo step
    pub fn begin_batch(&mut self) {
        self.history.begin_batch();
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        self.history.set_batch_description(description);
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.history.redo_description()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Block, PropertyBlock};
    use crate::ranges::Range;
    use crate::transaction::{BlockEffect, TextChange};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_versions_strictly_increase() {
        let mut engine = Engine::with_text("abc");
        assert_eq!(engine.document().version(), 0);

        let v1 = engine
            .apply(Transaction::changes_only(vec![TextChange::insertion(
                3, "d",
            )]))
            .unwrap();
        assert_eq!(v1, 1);

        engine.undo().unwrap();
        assert_eq!(engine.document().version(), 2);

        engine.redo().unwrap();
        assert_eq!(engine.document().version(), 3);
    }

    #[test]
    fn test_failed_apply_leaves_state_untouched() {
        let mut engine = Engine::with_text("abc");
        engine
            .apply(Transaction::changes_only(vec![TextChange::insertion(
                0, "x",
            )]))
            .unwrap();
        let before = engine.snapshot();

        // second change overlaps the first
        let bad = Transaction::changes_only(vec![
            TextChange::replace(Range::new(0, 2), "y"),
            TextChange::replace(Range::new(1, 3), "z"),
        ]);
        assert!(engine.apply(bad).is_err());
        assert_eq!(engine.snapshot(), before);
        // the failed transaction is not undoable
        assert!(engine.undo().unwrap());
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_select_requires_tracked_block() {
        let mut engine = Engine::with_text("speed");
        let block = Block::Property(PropertyBlock::number("speed", 60.0));
        let id = block.id();

        assert!(engine.select_block(id).is_err());

        engine
            .apply(Transaction::new(
                Vec::new(),
                vec![BlockEffect::AddBlock {
                    range: Range::new(0, 5),
                    block,
                }],
            ))
            .unwrap();
        engine.select_block(id).unwrap();
        assert!(engine.selection().is_selected(id));

        engine.clear_selection();
        assert_eq!(engine.selection().active_block, None);
    }

    #[test]
    fn test_observers_see_every_commit() {
        let mut engine = Engine::new();
        let versions = Rc::new(RefCell::new(Vec::new()));
        let sink = versions.clone();
        engine.subscribe(Box::new(move |state| {
            sink.borrow_mut().push(state.document.version());
        }));

        engine
            .apply(Transaction::changes_only(vec![TextChange::insertion(
                0, "a",
            )]))
            .unwrap();
        engine
            .apply(Transaction::changes_only(vec![TextChange::insertion(
                1, "b",
            )]))
            .unwrap();
        engine.undo().unwrap();

        assert_eq!(*versions.borrow(), vec![1, 2, 3]);
    }
}
