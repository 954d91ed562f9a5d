//! Error types for the editor engine

use thiserror::Error;
use uuid::Uuid;

use crate::transfer::TransferError;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Invalid change: {reason}")]
    InvalidChange { reason: String },

    #[error("Invalid effect: {reason}")]
    InvalidEffect { reason: String },

    #[error("No tracked block with id {0}")]
    BlockNotFound(Uuid),

    #[error("Block {0} is not an expression block")]
    NotAnExpression(Uuid),

    #[error("No block is selected")]
    NoSelection,

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] blockdoc_evaluator::EvalError),

    #[error("Syntax error: {0}")]
    Parse(#[from] blockdoc_parser::ParseError),
}

impl EditorError {
    pub(crate) fn invalid_change(reason: impl Into<String>) -> Self {
        Self::InvalidChange {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_effect(reason: impl Into<String>) -> Self {
        Self::InvalidEffect {
            reason: reason.into(),
        }
    }
}
