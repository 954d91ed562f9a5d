//! # Blockdoc Editor
//!
//! Core engine for block-annotated expression documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ parser: expression text → AST               │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: Document + tracked block ranges     │
//! │  - Apply transactions with validation       │
//! │  - Map ranges through every edit            │
//! │  - Undo/redo via recorded inverses          │
//! │  - Drag/drop transfer protocol              │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ evaluator: text + bound properties → number │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Text is source of truth**: every block is a range into the one
//!    canonical string; chip rendering is a projection of that range
//! 2. **Single mutation point**: all state changes flow through
//!    [`Engine::apply`] as [`Transaction`] values
//! 3. **All-or-nothing**: a transaction that fails validation leaves the
//!    state byte-identical to before
//! 4. **Snapshots out, transactions in**: consumers hold clones, never
//!    mutable references into engine state
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blockdoc_editor::{EditSession, PropertyBlock};
//!
//! let mut session = EditSession::new();
//! let speed = PropertyBlock::number("speed", 60.0);
//! session.insert_property_block(&speed)?;
//! session.insert_text("+ 10")?;
//!
//! let result = session.simulate_expression()?; // 70.0
//! ```

mod blocks;
mod document;
mod engine;
mod errors;
mod ranges;
mod session;
mod transaction;
mod transfer;
mod undo_stack;

pub use blocks::{Block, ExpressionBlock, ExpressionState, PropertyBlock};
pub use document::Document;
pub use engine::{EditorState, Engine, Observer, Selection};
pub use errors::EditorError;
pub use ranges::{map_range, Range, RangeTracker, TrackedEntry};
pub use session::EditSession;
pub use transaction::{BlockEffect, TextChange, Transaction};
pub use transfer::{
    decode, drop_block_transaction, drop_text_transaction, encode, BlockPayload, DropPayload,
    TransferError, EXPRESSION_CHANNEL, PROPERTY_CHANNEL, TEXT_CHANNEL,
};
pub use undo_stack::{TransactionRecord, UndoStack};

// Re-export the value types shared with the evaluator
pub use blockdoc_evaluator::{EvalError, Value};
