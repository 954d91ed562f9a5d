//! # Undo/Redo Stack
//!
//! Bounded-depth history of applied transactions with their inverses.
//!
//! - every applied transaction is recorded together with its inverse;
//! - undo hands the record's inverses back to the engine and moves the
//!   record to the redo stack;
//! - redo replays the original transactions;
//! - new records clear the redo stack;
//! - batches group multiple transactions into one undo step.

use crate::transaction::Transaction;

/// A group of transactions that undo/redo together
#[derive(Debug, Clone, Default)]
pub struct TransactionRecord {
    /// Applied transactions, in application order
    pub transactions: Vec<Transaction>,

    /// Inverse transactions, in undo (reverse) order
    pub inverses: Vec<Transaction>,

    /// Optional description of this step
    pub description: Option<String>,
}

impl TransactionRecord {
    pub fn single(transaction: Transaction, inverse: Transaction) -> Self {
        Self {
            transactions: vec![transaction],
            inverses: vec![inverse],
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Undo/redo stacks for the engine
#[derive(Debug, Default)]
pub struct UndoStack {
    /// Applied records, most recent last
    undo_stack: Vec<TransactionRecord>,

    /// Undone records, most recent last
    redo_stack: Vec<TransactionRecord>,

    /// Maximum depth (0 = unlimited)
    max_levels: usize,

    /// Record currently being batched
    current_batch: Option<TransactionRecord>,
}

impl UndoStack {
    /// Default depth of 100 levels
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
        }
    }

    /// Record an applied transaction and its inverse
    pub fn record(&mut self, transaction: Transaction, inverse: Transaction) {
        if let Some(batch) = &mut self.current_batch {
            batch.transactions.push(transaction);
            batch.inverses.insert(0, inverse); // undo order is reversed
        } else {
            self.push_record(TransactionRecord::single(transaction, inverse));
        }
    }

    /// Start grouping records into one undo step
    pub fn begin_batch(&mut self) {
        self.current_batch = Some(TransactionRecord::default());
    }

    /// Close the current batch and push it
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.transactions.is_empty() {
                self.push_record(batch);
            }
        }
    }

    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.description = Some(description.into());
        }
    }

    fn push_record(&mut self, record: TransactionRecord) {
        self.undo_stack.push(record);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        // A new action invalidates the redone future.
        self.redo_stack.clear();
    }

    pub(crate) fn pop_undo(&mut self) -> Option<TransactionRecord> {
        self.undo_stack.pop()
    }

    pub(crate) fn push_undone(&mut self, record: TransactionRecord) {
        self.redo_stack.push(record);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<TransactionRecord> {
        self.redo_stack.pop()
    }

    pub(crate) fn push_redone(&mut self, record: TransactionRecord) {
        self.undo_stack.push(record);
    }

    pub(crate) fn restore_undo(&mut self, record: TransactionRecord) {
        self.undo_stack.push(record);
    }

    pub(crate) fn restore_redo(&mut self, record: TransactionRecord) {
        self.redo_stack.push(record);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|record| record.description.as_deref())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|record| record.description.as_deref())
    }
}
