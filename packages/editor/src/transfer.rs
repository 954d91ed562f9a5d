//! # Drag/Drop Transfer Protocol
//!
//! Serializes a block plus its source range into a channel-tagged payload
//! that can cross the native drag-and-drop boundary, and turns a drop back
//! into a single relocation transaction.
//!
//! Two custom channels carry engine blocks; `text/plain` is the fallback
//! for drops that originate outside the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::blocks::{Block, ExpressionBlock, PropertyBlock};
use crate::engine::EditorState;
use crate::ranges::Range;
use crate::transaction::{BlockEffect, TextChange, Transaction};

/// Drag channel for property blocks
pub const PROPERTY_CHANNEL: &str = "x-editor-property";

/// Drag channel for expression blocks
pub const EXPRESSION_CHANNEL: &str = "x-editor-expression";

/// Fallback channel for external plain-text drops
pub const TEXT_CHANNEL: &str = "text/plain";

#[derive(Error, Debug)]
pub enum TransferError {
    /// Drop landed inside its own source range; callers treat this as a
    /// silent no-op
    #[error("drop position {pos} falls inside the source range")]
    DropRejected { pos: usize },

    #[error("malformed transfer payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transfer source range {from}..{to} is inverted")]
    InvalidSourceRange { from: usize, to: usize },

    #[error("unknown transfer channel: {0}")]
    UnknownChannel(String),
}

/// Wire envelope for `x-editor-property`: the block itself travels as a
/// nested JSON string next to its source offsets
#[derive(Debug, Serialize, Deserialize)]
struct PropertyEnvelope {
    property: String,
    from: usize,
    to: usize,
}

/// Wire envelope for `x-editor-expression`
#[derive(Debug, Serialize, Deserialize)]
struct ExpressionEnvelope {
    expression: String,
    from: usize,
    to: usize,
}

/// A block plus the range it is being dragged out of
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPayload {
    pub block: Block,
    pub source: Range,
}

/// Decoded content of a drop
#[derive(Debug, Clone, PartialEq)]
pub enum DropPayload {
    Block(BlockPayload),
    Text(String),
}

/// Encode a block and its current range for an external drag. Returns the
/// channel name and the serialized payload.
pub fn encode(block: &Block, source: Range) -> Result<(&'static str, String), TransferError> {
    match block {
        Block::Property(property) => {
            let envelope = PropertyEnvelope {
                property: serde_json::to_string(property)?,
                from: source.from,
                to: source.to,
            };
            Ok((PROPERTY_CHANNEL, serde_json::to_string(&envelope)?))
        }
        Block::Expression(expression) => {
            let envelope = ExpressionEnvelope {
                expression: serde_json::to_string(expression)?,
                from: source.from,
                to: source.to,
            };
            Ok((EXPRESSION_CHANNEL, serde_json::to_string(&envelope)?))
        }
    }
}

/// Decode a payload received on `channel`
pub fn decode(channel: &str, data: &str) -> Result<DropPayload, TransferError> {
    match channel {
        PROPERTY_CHANNEL => {
            let envelope: PropertyEnvelope = serde_json::from_str(data)?;
            let block: PropertyBlock = serde_json::from_str(&envelope.property)?;
            Ok(DropPayload::Block(BlockPayload {
                block: Block::Property(block),
                source: source_range(envelope.from, envelope.to)?,
            }))
        }
        EXPRESSION_CHANNEL => {
            let envelope: ExpressionEnvelope = serde_json::from_str(data)?;
            let block: ExpressionBlock = serde_json::from_str(&envelope.expression)?;
            Ok(DropPayload::Block(BlockPayload {
                block: Block::Expression(block),
                source: source_range(envelope.from, envelope.to)?,
            }))
        }
        TEXT_CHANNEL => Ok(DropPayload::Text(data.to_string())),
        other => Err(TransferError::UnknownChannel(other.to_string())),
    }
}

fn source_range(from: usize, to: usize) -> Result<Range, TransferError> {
    if from > to {
        return Err(TransferError::InvalidSourceRange { from, to });
    }
    Ok(Range::new(from, to))
}

/// Single-space padding against the characters adjacent to `pos`, never
/// doubling existing whitespace. Returns the padded text and the length of
/// the leading pad. An out-of-range `pos` gets no padding; transaction
/// validation rejects the insertion itself.
pub(crate) fn padded(text: &str, pos: usize, insert: &str) -> (String, usize) {
    let needs_lead = text
        .get(..pos)
        .and_then(|s| s.chars().next_back())
        .is_some_and(|c| !c.is_whitespace());
    let needs_trail = text
        .get(pos..)
        .and_then(|s| s.chars().next())
        .is_some_and(|c| !c.is_whitespace());

    let mut out = String::with_capacity(insert.len() + 2);
    if needs_lead {
        out.push(' ');
    }
    out.push_str(insert);
    if needs_trail {
        out.push(' ');
    }
    (out, needs_lead as usize)
}

/// Build the relocation transaction for a block dropped at `pos`: one
/// change removing the source range, one inserting the rendered text
/// (space-padded), plus remove-old/add-new effects. Rejects drops landing
/// inside the source range.
pub fn drop_block_transaction(
    state: &EditorState,
    payload: &BlockPayload,
    pos: usize,
) -> Result<Transaction, TransferError> {
    let source = payload.source;
    if source.contains(pos) {
        warn!(pos, from = source.from, to = source.to, "drop rejected");
        return Err(TransferError::DropRejected { pos });
    }

    let rendered = payload.block.rendered_text();
    let (insert, lead) = padded(state.document.text(), pos, &rendered);

    let removal = TextChange::deletion(source);
    let insertion = TextChange::insertion(pos, insert);
    let changes = if source.from < pos {
        vec![removal, insertion]
    } else {
        vec![insertion, removal]
    };

    // Where the rendered text lands once the source is gone.
    let start = if source.from < pos {
        pos - source.len()
    } else {
        pos
    } + lead;
    let new_range = Range::new(start, start + rendered.len());

    debug!(
        block = %payload.block.id(),
        from = source.from,
        to = pos,
        "relocating block"
    );

    Ok(Transaction::new(
        changes,
        vec![
            BlockEffect::RemoveBlocksOverlapping { range: source },
            BlockEffect::AddBlock {
                range: new_range,
                block: payload.block.clone(),
            },
        ],
    ))
}

/// Plain-text drop: same spacing rule, no effects, unless the dropped
/// text names a catalog property, which auto-promotes it to a
/// PropertyBlock decoration.
pub fn drop_text_transaction(
    state: &EditorState,
    catalog: &[PropertyBlock],
    text: &str,
    pos: usize,
) -> Transaction {
    let content = text.trim();
    if content.is_empty() {
        return Transaction::default();
    }

    let (insert, lead) = padded(state.document.text(), pos, content);
    let changes = vec![TextChange::insertion(pos, insert)];

    let effects = match catalog.iter().find(|p| p.name == content) {
        Some(property) => {
            let block = PropertyBlock::new(&property.name, property.value.clone());
            vec![BlockEffect::AddBlock {
                range: Range::new(pos + lead, pos + lead + content.len()),
                block: Block::Property(block),
            }]
        }
        None => Vec::new(),
    };

    Transaction::new(changes, effects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn state_with(text: &str) -> EditorState {
        EditorState {
            document: Document::new(text),
            ..Default::default()
        }
    }

    #[test]
    fn test_property_round_trip_is_byte_identical() {
        let block = Block::Property(PropertyBlock::number("temperature", 25.5));
        let (channel, data) = encode(&block, Range::new(3, 14)).unwrap();
        assert_eq!(channel, PROPERTY_CHANNEL);

        match decode(channel, &data).unwrap() {
            DropPayload::Block(payload) => {
                assert_eq!(payload.block, block);
                assert_eq!(payload.source, Range::new(3, 14));
            }
            other => panic!("expected block payload, got {:?}", other),
        }
    }

    #[test]
    fn test_expression_round_trip_is_byte_identical() {
        let mut expression = ExpressionBlock::new("Sum()");
        expression.add_property(PropertyBlock::number("a", 1.0));
        let block = Block::Expression(expression);

        let (channel, data) = encode(&block, Range::new(0, 9)).unwrap();
        assert_eq!(channel, EXPRESSION_CHANNEL);

        match decode(channel, &data).unwrap() {
            DropPayload::Block(payload) => assert_eq!(payload.block, block),
            other => panic!("expected block payload, got {:?}", other),
        }
    }

    #[test]
    fn test_text_channel_passthrough() {
        match decode(TEXT_CHANNEL, "speed").unwrap() {
            DropPayload::Text(text) => assert_eq!(text, "speed"),
            other => panic!("expected text payload, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_channel_rejected() {
        assert!(matches!(
            decode("application/x-unrelated", "{}"),
            Err(TransferError::UnknownChannel(_))
        ));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        assert!(matches!(
            decode(PROPERTY_CHANNEL, "not json"),
            Err(TransferError::Malformed(_))
        ));
    }

    #[test]
    fn test_inverted_source_range_rejected() {
        let inner = serde_json::to_string(&PropertyBlock::number("speed", 60.0)).unwrap();
        let data = serde_json::json!({"property": inner, "from": 9, "to": 2}).to_string();
        assert!(matches!(
            decode(PROPERTY_CHANNEL, &data),
            Err(TransferError::InvalidSourceRange { from: 9, to: 2 })
        ));
    }

    #[test]
    fn test_drop_inside_source_is_rejected() {
        let state = state_with("0123456789abcdef");
        let payload = BlockPayload {
            block: Block::Property(PropertyBlock::number("speed", 60.0)),
            source: Range::new(2, 10),
        };

        for pos in [2, 5, 9] {
            assert!(matches!(
                drop_block_transaction(&state, &payload, pos),
                Err(TransferError::DropRejected { .. })
            ));
        }
        assert!(drop_block_transaction(&state, &payload, 10).is_ok());
        assert!(drop_block_transaction(&state, &payload, 0).is_ok());
    }

    #[test]
    fn test_padding_rules() {
        assert_eq!(padded("+1", 0, "speed"), ("speed ".to_string(), 0));
        assert_eq!(padded("a b", 2, "x"), ("x ".to_string(), 0));
        assert_eq!(padded("ab", 1, "x"), (" x ".to_string(), 1));
        assert_eq!(padded("", 0, "x"), ("x".to_string(), 0));
        assert_eq!(padded("a ", 2, "x"), ("x".to_string(), 0));
    }

    #[test]
    fn test_text_drop_auto_promotes_catalog_names() {
        let state = state_with("1 + ");
        let catalog = vec![PropertyBlock::number("speed", 60.0)];

        let transaction = drop_text_transaction(&state, &catalog, "speed", 4);
        assert_eq!(transaction.effects.len(), 1);
        match &transaction.effects[0] {
            BlockEffect::AddBlock { range, block } => {
                assert_eq!(*range, Range::new(4, 9));
                assert_eq!(block.as_property().unwrap().name, "speed");
            }
            other => panic!("expected AddBlock, got {:?}", other),
        }

        let plain = drop_text_transaction(&state, &catalog, "velocity", 4);
        assert!(plain.effects.is_empty());
        assert_eq!(plain.changes.len(), 1);
    }
}
