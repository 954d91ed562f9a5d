//! # Range Tracker
//!
//! Ordered collection of tracked block ranges, kept consistent as the
//! document underneath them is edited.
//!
//! Mapping rules for a change replacing `[from, to)`:
//! - an entry entirely after the change shifts by the change's length delta;
//! - an entry entirely before it is untouched;
//! - an entry whose interior the change touches is orphaned, the safe
//!   default when no explicit remove effect preceded the edit;
//! - a zero-length insertion at an entry boundary is never swallowed into
//!   the block: at `from` it pushes the block right, at `to` it lands after.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blocks::Block;
use crate::errors::EditorError;
use crate::transaction::TextChange;

/// Half-open byte interval `[from, to)` into the document text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub from: usize,
    pub to: usize,
}

impl Range {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.from <= offset && offset < self.to
    }

    /// Nonzero-width intersection with another interval
    pub fn intersects(&self, other: Range) -> bool {
        self.from < other.to && other.from < self.to
    }
}

/// A block anchored to its current text range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub range: Range,
    pub block: Block,
}

/// Position-ordered, pairwise non-overlapping tracked ranges
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeTracker {
    entries: Vec<TrackedEntry>,
}

impl RangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntry> {
        self.entries.iter()
    }

    /// Insert a new entry at its position-ordered slot. Fails when the
    /// range overlaps an existing entry.
    pub fn insert(&mut self, range: Range, block: Block) -> Result<(), EditorError> {
        let idx = self.entries.partition_point(|e| e.range.from < range.from);

        let collides = (idx > 0 && self.entries[idx - 1].range.intersects(range))
            || (idx < self.entries.len() && self.entries[idx].range.intersects(range));
        if collides {
            return Err(EditorError::invalid_effect(format!(
                "block range {}..{} overlaps an existing entry",
                range.from, range.to
            )));
        }

        self.entries.insert(idx, TrackedEntry { range, block });
        Ok(())
    }

    /// The entry whose range contains `offset`, if any
    pub fn block_at(&self, offset: usize) -> Option<&TrackedEntry> {
        let idx = self.entries.partition_point(|e| e.range.from <= offset);
        idx.checked_sub(1)
            .map(|i| &self.entries[i])
            .filter(|e| e.range.contains(offset))
    }

    pub fn find(&self, id: Uuid) -> Option<&TrackedEntry> {
        self.entries.iter().find(|e| e.block.id() == id)
    }

    /// Remove every entry intersecting `range`, returning them in order
    pub fn remove_overlapping(&mut self, range: Range) -> Vec<TrackedEntry> {
        self.remove_where(|e| e.range.intersects(range))
    }

    /// Bulk remove by predicate, returning the removed entries in order
    pub fn remove_where(
        &mut self,
        mut predicate: impl FnMut(&TrackedEntry) -> bool,
    ) -> Vec<TrackedEntry> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if predicate(entry) {
                removed.push(entry.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Map every entry through a sorted, non-overlapping change list.
    /// Straddled entries are dropped and returned with their pre-mapping
    /// ranges intact, so callers can restore them on undo.
    pub(crate) fn map_changes(&mut self, changes: &[TextChange]) -> Vec<TrackedEntry> {
        let mut orphaned = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());

        for entry in self.entries.drain(..) {
            match map_range(entry.range, changes) {
                Some(range) => kept.push(TrackedEntry {
                    range,
                    block: entry.block,
                }),
                None => orphaned.push(entry),
            }
        }

        self.entries = kept;
        orphaned
    }
}

/// Map one range through a change list given in old-document coordinates.
///
/// `None` means a change straddled the range and the entry must be dropped.
pub fn map_range(range: Range, changes: &[TextChange]) -> Option<Range> {
    let mut delta = 0isize;
    for change in changes {
        if change.to <= range.from {
            // At or before the block; a zero-length insertion exactly at
            // `from` lands before it and pushes it right.
            delta += change.delta();
        } else if change.from >= range.to {
            // At or after the block; an insertion exactly at `to` is never
            // swallowed into the block.
        } else {
            return None;
        }
    }

    Some(Range::new(
        (range.from as isize + delta) as usize,
        (range.to as isize + delta) as usize,
    ))
}
