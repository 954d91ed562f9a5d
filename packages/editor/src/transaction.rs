//! # Transactions
//!
//! The atomic unit of mutation: a sorted list of text changes plus a list
//! of block effects, applied all-or-nothing.
//!
//! ## Semantics
//!
//! 1. Changes are validated against the current document: non-overlapping,
//!    in increasing offset order, inside bounds, on char boundaries. A
//!    malformed script fails with `InvalidChange` before anything mutates.
//! 2. Changes splice the text and bump the version.
//! 3. Every tracked range is mapped through the changes; straddled entries
//!    are orphaned.
//! 4. Effects run in order against the mapped tracker. `AddBlock` ranges are
//!    relative to the post-change text.
//! 5. The selection survives unless its block is gone.
//!
//! Application also produces the inverse transaction (replaced text
//! re-inserted, removed entries restored at their pre-transaction ranges,
//! added entries dropped), which is what undo applies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use crate::blocks::Block;
use crate::engine::EditorState;
use crate::errors::EditorError;
use crate::ranges::{map_range, Range};

/// Replace `[from, to)` with `insert`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub from: usize,
    pub to: usize,
    pub insert: String,
}

impl TextChange {
    pub fn replace(range: Range, insert: impl Into<String>) -> Self {
        Self {
            from: range.from,
            to: range.to,
            insert: insert.into(),
        }
    }

    pub fn insertion(at: usize, insert: impl Into<String>) -> Self {
        Self {
            from: at,
            to: at,
            insert: insert.into(),
        }
    }

    pub fn deletion(range: Range) -> Self {
        Self::replace(range, "")
    }

    /// Length delta this change applies to positions behind it
    pub(crate) fn delta(&self) -> isize {
        self.insert.len() as isize - (self.to - self.from) as isize
    }
}

/// Non-text mutation bundled into a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockEffect {
    /// Track `block` at `range`, relative to the post-change text
    AddBlock { range: Range, block: Block },

    /// Untrack every block whose range intersects `range`
    RemoveBlocksOverlapping { range: Range },
}

/// Atomic unit combining text changes and block effects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub changes: Vec<TextChange>,
    pub effects: Vec<BlockEffect>,
}

impl Transaction {
    pub fn new(changes: Vec<TextChange>, effects: Vec<BlockEffect>) -> Self {
        Self { changes, effects }
    }

    pub fn changes_only(changes: Vec<TextChange>) -> Self {
        Self::new(changes, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.effects.is_empty()
    }

    fn validate(&self, state: &EditorState) -> Result<(), EditorError> {
        let text = state.document.text();
        let mut last_end = 0usize;

        for (i, change) in self.changes.iter().enumerate() {
            if change.from > change.to {
                return Err(EditorError::invalid_change(format!(
                    "change {} is inverted ({}..{})",
                    i, change.from, change.to
                )));
            }
            if change.to > text.len() {
                return Err(EditorError::invalid_change(format!(
                    "change {} ends at {} beyond document length {}",
                    i,
                    change.to,
                    text.len()
                )));
            }
            if !text.is_char_boundary(change.from) || !text.is_char_boundary(change.to) {
                return Err(EditorError::invalid_change(format!(
                    "change {} does not fall on char boundaries",
                    i
                )));
            }
            if i > 0 && change.from < last_end {
                return Err(EditorError::invalid_change(format!(
                    "change {} overlaps or precedes the one before it",
                    i
                )));
            }
            last_end = change.to;
        }

        Ok(())
    }

    /// Apply to `state`, producing the successor state and the inverse
    /// transaction that undoes it. Pure: `state` is untouched on error.
    pub(crate) fn apply_to(
        &self,
        state: &EditorState,
    ) -> Result<(EditorState, Transaction), EditorError> {
        self.validate(state)?;

        let old_text = state.document.text();

        // Splice the changes, recording inverses in new-text coordinates.
        let mut new_text = String::with_capacity(old_text.len());
        let mut inverse_changes = Vec::with_capacity(self.changes.len());
        let mut cursor = 0usize;
        let mut delta = 0isize;
        for change in &self.changes {
            new_text.push_str(&old_text[cursor..change.from]);
            new_text.push_str(&change.insert);

            let mapped_from = (change.from as isize + delta) as usize;
            inverse_changes.push(TextChange {
                from: mapped_from,
                to: mapped_from + change.insert.len(),
                insert: old_text[change.from..change.to].to_string(),
            });

            delta += change.delta();
            cursor = change.to;
        }
        new_text.push_str(&old_text[cursor..]);

        let document = state.document.bumped(new_text);

        // Map tracked ranges; straddled entries are orphaned and later
        // restored by the inverse.
        let mut ranges = state.ranges.clone();
        let pre_ranges: HashMap<Uuid, Range> = ranges
            .iter()
            .map(|entry| (entry.block.id(), entry.range))
            .collect();
        let mut removed = ranges.map_changes(&self.changes);

        // Apply effects in order.
        let mut added: Vec<(Range, Uuid)> = Vec::new();
        for effect in &self.effects {
            match effect {
                BlockEffect::AddBlock { range, block } => {
                    if range.is_empty() {
                        return Err(EditorError::invalid_effect("block range is empty"));
                    }
                    if range.to > document.len()
                        || !document.text().is_char_boundary(range.from)
                        || !document.text().is_char_boundary(range.to)
                    {
                        return Err(EditorError::invalid_effect(format!(
                            "block range {}..{} is not valid in the new text",
                            range.from, range.to
                        )));
                    }
                    ranges.insert(*range, block.clone())?;
                    added.push((*range, block.id()));
                }

                BlockEffect::RemoveBlocksOverlapping { range } => {
                    for entry in ranges.remove_overlapping(*range) {
                        // A block added and removed in the same transaction
                        // nets out of the inverse.
                        if let Some(idx) =
                            added.iter().position(|(_, id)| *id == entry.block.id())
                        {
                            added.remove(idx);
                        } else {
                            removed.push(entry);
                        }
                    }
                }
            }
        }

        // Selection survives unless its block is gone.
        let mut selection = state.selection;
        if let Some(id) = selection.active_block {
            if ranges.find(id).is_none() {
                selection.clear();
            }
        }

        // Inverse effects: drop what was added, then restore what was
        // removed at its pre-transaction range.
        let mut inverse_effects = Vec::new();
        for (range, _) in &added {
            // When an inverse change consumes the added range, undo's own
            // mapping step orphans the entry; no explicit removal needed.
            if let Some(old_range) = map_range(*range, &inverse_changes) {
                inverse_effects.push(BlockEffect::RemoveBlocksOverlapping { range: old_range });
            }
        }
        for entry in &removed {
            let range = pre_ranges
                .get(&entry.block.id())
                .copied()
                .unwrap_or(entry.range);
            inverse_effects.push(BlockEffect::AddBlock {
                range,
                block: entry.block.clone(),
            });
        }

        trace!(version = document.version(), "transaction applied");

        Ok((
            EditorState {
                document,
                ranges,
                selection,
            },
            Transaction {
                changes: inverse_changes,
                effects: inverse_effects,
            },
        ))
    }
}
