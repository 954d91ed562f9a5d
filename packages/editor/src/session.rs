//! # Edit Session
//!
//! One user's view of the engine: the caret used by picker-driven
//! insertion, the catalog of available properties, and the standalone
//! simulation bindings. Every operation here builds one transaction and
//! hands it to the engine, so each gesture is atomic and undoable as a
//! unit.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use blockdoc_evaluator::{EvalContext, EvalError, Evaluator, Value};
use blockdoc_parser::{parse, ParseError};

use crate::blocks::{Block, ExpressionBlock, PropertyBlock};
use crate::document::Document;
use crate::engine::{EditorState, Engine, Observer, Selection};
use crate::errors::EditorError;
use crate::ranges::{Range, TrackedEntry};
use crate::transaction::{BlockEffect, TextChange, Transaction};
use crate::transfer::{self, DropPayload, TransferError};

pub struct EditSession {
    engine: Engine,

    /// Properties offered by the picker; also the auto-promotion table for
    /// plain-text drops
    catalog: Vec<PropertyBlock>,

    /// Simulation bindings not anchored to any chip
    bindings: HashMap<String, Value>,

    /// Insertion point for picker-driven operations
    caret: usize,
}

impl EditSession {
    pub fn new() -> Self {
        Self::with_properties(Vec::new())
    }

    pub fn with_properties(catalog: Vec<PropertyBlock>) -> Self {
        Self {
            engine: Engine::new(),
            catalog,
            bindings: HashMap::new(),
            caret: 0,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn document(&self) -> &Document {
        self.engine.document()
    }

    pub fn text(&self) -> &str {
        self.engine.document().text()
    }

    pub fn catalog(&self) -> &[PropertyBlock] {
        &self.catalog
    }

    pub fn snapshot(&self) -> EditorState {
        self.engine.snapshot()
    }

    pub fn subscribe(&mut self, observer: Observer) {
        self.engine.subscribe(observer);
    }

    pub fn selection(&self) -> Selection {
        self.engine.selection()
    }

    pub fn block_at(&self, offset: usize) -> Option<&TrackedEntry> {
        self.engine.ranges().block_at(offset)
    }

    /// Apply through the engine, keeping the caret mapped through the
    /// transaction's changes
    fn apply(&mut self, transaction: Transaction) -> Result<u64, EditorError> {
        let caret = map_pos(self.caret, &transaction.changes);
        let version = self.engine.apply(transaction)?;
        self.caret = caret;
        Ok(version)
    }

    // ---- caret & plain editing -------------------------------------------

    /// Place the caret used by insertion operations
    pub fn set_caret(&mut self, pos: usize) -> Result<(), EditorError> {
        if pos > self.document().len() || !self.text().is_char_boundary(pos) {
            return Err(EditorError::invalid_change(format!(
                "caret position {} is not a valid offset",
                pos
            )));
        }
        self.caret = pos;
        Ok(())
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    /// Type text at the caret
    pub fn insert_text(&mut self, text: &str) -> Result<u64, EditorError> {
        self.apply(Transaction::changes_only(vec![TextChange::insertion(
            self.caret, text,
        )]))
    }

    /// Delete a text span (backspace, delete, cut)
    pub fn delete_range(&mut self, range: Range) -> Result<u64, EditorError> {
        self.apply(Transaction::changes_only(vec![TextChange::deletion(range)]))
    }

    // ---- block insertion API ---------------------------------------------

    /// Insert a fresh PropertyBlock chip for `property` at the caret
    pub fn insert_property_block(&mut self, property: &PropertyBlock) -> Result<Uuid, EditorError> {
        let block = PropertyBlock::new(property.name.clone(), property.value.clone());
        let id = block.id;
        self.insert_block(Block::Property(block))?;
        Ok(id)
    }

    /// Insert an ExpressionBlock chip at the caret
    pub fn insert_expression_block(&mut self, initial_text: &str) -> Result<Uuid, EditorError> {
        let block = ExpressionBlock::new(initial_text);
        let id = block.id;
        self.insert_block(Block::Expression(block))?;
        Ok(id)
    }

    fn insert_block(&mut self, block: Block) -> Result<u64, EditorError> {
        let rendered = block.rendered_text();
        let (insert, lead) = transfer::padded(self.text(), self.caret, &rendered);
        let range = Range::new(self.caret + lead, self.caret + lead + rendered.len());

        debug!(block = %block.id(), at = self.caret, "inserting block");
        self.apply(Transaction::new(
            vec![TextChange::insertion(self.caret, insert)],
            vec![BlockEffect::AddBlock { range, block }],
        ))
    }

    // ---- selection -------------------------------------------------------

    pub fn select_block(&mut self, id: Uuid) -> Result<(), EditorError> {
        self.engine.select_block(id)
    }

    pub fn clear_selection(&mut self) {
        self.engine.clear_selection();
    }

    pub fn selected_entry(&self) -> Option<&TrackedEntry> {
        let id = self.engine.selection().active_block?;
        self.engine.ranges().find(id)
    }

    // ---- expression membership -------------------------------------------

    /// Append a property reference to the selected expression block
    pub fn add_property_to_selected_expression(
        &mut self,
        property: &PropertyBlock,
    ) -> Result<(), EditorError> {
        let id = self
            .engine
            .selection()
            .active_block
            .ok_or(EditorError::NoSelection)?;
        self.add_property_to_expression(id, property)
    }

    /// Append a property reference to an expression block, rewriting its
    /// chip text in place
    pub fn add_property_to_expression(
        &mut self,
        id: Uuid,
        property: &PropertyBlock,
    ) -> Result<(), EditorError> {
        let entry = self
            .engine
            .ranges()
            .find(id)
            .ok_or(EditorError::BlockNotFound(id))?
            .clone();
        let Block::Expression(mut expression) = entry.block else {
            return Err(EditorError::NotAnExpression(id));
        };

        expression.add_property(PropertyBlock::new(
            property.name.clone(),
            property.value.clone(),
        ));
        self.replace_expression(entry.range, expression)?;
        self.engine.select_block(id)
    }

    /// Remove a bound property reference from an expression block
    pub fn remove_property_from_expression(
        &mut self,
        id: Uuid,
        property_id: Uuid,
    ) -> Result<(), EditorError> {
        let entry = self
            .engine
            .ranges()
            .find(id)
            .ok_or(EditorError::BlockNotFound(id))?
            .clone();
        let Block::Expression(mut expression) = entry.block else {
            return Err(EditorError::NotAnExpression(id));
        };

        if !expression.remove_property(property_id) {
            return Err(EditorError::BlockNotFound(property_id));
        }
        self.replace_expression(entry.range, expression)?;
        Ok(())
    }

    fn replace_expression(
        &mut self,
        range: Range,
        expression: ExpressionBlock,
    ) -> Result<u64, EditorError> {
        let rendered = expression.rendered_text();
        let new_range = Range::new(range.from, range.from + rendered.len());

        self.apply(Transaction::new(
            vec![TextChange::replace(range, rendered)],
            vec![
                BlockEffect::RemoveBlocksOverlapping { range: new_range },
                BlockEffect::AddBlock {
                    range: new_range,
                    block: Block::Expression(expression),
                },
            ],
        ))
    }

    // ---- collapse / expand -----------------------------------------------

    /// Wrap the text in `range` into a collapsed ExpressionBlock chip
    pub fn collapse_to_expression(&mut self, range: Range) -> Result<Uuid, EditorError> {
        let text = self
            .document()
            .slice(range)
            .ok_or_else(|| {
                EditorError::invalid_change(format!(
                    "collapse range {}..{} is not a valid span",
                    range.from, range.to
                ))
            })?
            .to_string();

        let block = ExpressionBlock::new(text);
        let id = block.id;
        let rendered = block.rendered_text();
        let new_range = Range::new(range.from, range.from + rendered.len());

        self.apply(Transaction::new(
            vec![TextChange::replace(range, rendered)],
            vec![
                // chips swallowed by the collapsed span go away with it
                BlockEffect::RemoveBlocksOverlapping { range: new_range },
                BlockEffect::AddBlock {
                    range: new_range,
                    block: Block::Expression(block),
                },
            ],
        ))?;
        Ok(id)
    }

    /// Convert a tracked block back into raw editable text
    pub fn expand_block(&mut self, id: Uuid) -> Result<u64, EditorError> {
        let entry = self
            .engine
            .ranges()
            .find(id)
            .ok_or(EditorError::BlockNotFound(id))?
            .clone();
        let raw = entry.block.expansion_text();
        let raw_range = Range::new(entry.range.from, entry.range.from + raw.len());

        debug!(block = %id, "expanding block to raw text");
        self.apply(Transaction::new(
            vec![TextChange::replace(entry.range, raw)],
            vec![BlockEffect::RemoveBlocksOverlapping { range: raw_range }],
        ))
    }

    // ---- drag & drop -----------------------------------------------------

    /// Encode the selected block for an external drag
    pub fn encode_selected_block(&self) -> Result<(&'static str, String), EditorError> {
        let entry = self.selected_entry().ok_or(EditorError::NoSelection)?;
        Ok(transfer::encode(&entry.block, entry.range)?)
    }

    /// Decode an external drop and apply it at `pos`. A rejected self-drop
    /// is a silent no-op returning `None`.
    pub fn drop_payload(
        &mut self,
        channel: &str,
        data: &str,
        pos: usize,
    ) -> Result<Option<u64>, EditorError> {
        match transfer::decode(channel, data)? {
            DropPayload::Block(payload) => {
                match transfer::drop_block_transaction(self.engine.state(), &payload, pos) {
                    Ok(transaction) => Ok(Some(self.apply(transaction)?)),
                    Err(TransferError::DropRejected { .. }) => Ok(None),
                    Err(err) => Err(err.into()),
                }
            }
            DropPayload::Text(text) => {
                let transaction =
                    transfer::drop_text_transaction(self.engine.state(), &self.catalog, &text, pos);
                if transaction.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.apply(transaction)?))
            }
        }
    }

    // ---- history ---------------------------------------------------------

    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let undone = self.engine.undo()?;
        self.clamp_caret();
        Ok(undone)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let redone = self.engine.redo()?;
        self.clamp_caret();
        Ok(redone)
    }

    pub fn begin_batch(&mut self) {
        self.engine.begin_batch();
    }

    pub fn end_batch(&mut self) {
        self.engine.end_batch();
    }

    fn clamp_caret(&mut self) {
        let text = self.engine.document().text();
        let mut pos = self.caret.min(text.len());
        while pos > 0 && !text.is_char_boundary(pos) {
            pos -= 1;
        }
        self.caret = pos;
    }

    // ---- simulation ------------------------------------------------------

    /// Bind a simulation value that is not anchored to any chip
    pub fn bind_property(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn unbind_property(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    /// Evaluate the current document text against the live bound-properties
    /// table: the standalone bindings, every tracked property chip and
    /// every expression block's bound properties. Read-only and idempotent
    /// for a fixed state.
    pub fn simulate_expression(&self) -> Result<f64, EvalError> {
        let mut context = EvalContext::new();
        for (name, value) in &self.bindings {
            context.set_variable(name.clone(), value.clone());
        }
        for entry in self.engine.ranges().iter() {
            match &entry.block {
                Block::Property(property) => {
                    context.set_variable(property.name.clone(), property.value.clone());
                }
                Block::Expression(expression) => {
                    for property in &expression.bound_properties {
                        context.set_variable(property.name.clone(), property.value.clone());
                    }
                }
            }
        }

        Evaluator::with_context(context).evaluate(self.text())
    }

    /// Parse-only check feeding the inline diagnostic lane; an empty
    /// document is not an error
    pub fn check_syntax(&self) -> Result<(), ParseError> {
        if self.text().trim().is_empty() {
            return Ok(());
        }
        parse(self.text()).map(|_| ())
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a position through a sorted change list; positions inside a
/// replaced region land just after the replacement
fn map_pos(pos: usize, changes: &[TextChange]) -> usize {
    let mut delta = 0isize;
    for change in changes {
        if change.to <= pos {
            delta += change.delta();
        } else if change.from < pos {
            return (change.from as isize + delta) as usize + change.insert.len();
        }
    }
    (pos as isize + delta) as usize
}
