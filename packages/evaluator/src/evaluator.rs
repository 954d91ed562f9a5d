//! # Expression Evaluator
//!
//! Evaluates expression text against a table of bound properties.
//!
//! ## Determinism Contract
//!
//! Evaluation is read-only and idempotent: for a fixed source string and
//! context state, `evaluate()` returns the same result on every invocation.
//! It never touches the document or the range tracker, performs no I/O, and
//! never executes the input as code: the source is parsed by the restricted
//! grammar in `blockdoc-parser`, which rejects anything outside numbers,
//! identifiers, `+ - * / ( ) [ ] ,` before this module runs.

use std::collections::HashMap;

use blockdoc_parser::{parse, BinaryOp, Expr, ParseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] ParseError),

    #[error("Unbound reference: {name}")]
    UnboundReference { name: String },

    #[error("Property '{name}' does not hold a numeric value")]
    NonNumericProperty { name: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Expression did not produce a finite number")]
    NotFinite,
}

/// A bound property value.
///
/// Serializes as `{"type": "number", "value": 25.5}` /
/// `{"type": "string", "value": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Number(f64),
    String(String),
}

impl Value {
    /// Numeric view of the value. String values that parse as numbers count
    /// as numeric (the source data model stores some numerics as strings).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
        }
    }
}

/// Bound-property environment for one evaluation
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    variables: HashMap<String, Value>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Evaluates expression source against an [`EvalContext`]
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    pub context: EvalContext,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context: EvalContext) -> Self {
        Self { context }
    }

    /// Evaluate expression source to a finite number.
    ///
    /// Identifier tokens resolve through the context; an identifier with no
    /// binding fails with [`EvalError::UnboundReference`]. Because resolution
    /// happens per token, a property named `speed` can never collide with a
    /// longer name like `speedLimit`.
    pub fn evaluate(&self, source: &str) -> EvalResult<f64> {
        debug!(len = source.len(), "evaluating expression");
        let expr = parse(source)?;
        let result = self.eval_expr(&expr)?;

        if !result.is_finite() {
            return Err(EvalError::NotFinite);
        }

        trace!(result, "expression evaluated");
        Ok(result)
    }

    fn eval_expr(&self, expr: &Expr) -> EvalResult<f64> {
        match expr {
            Expr::Number { value, .. } => Ok(*value),

            Expr::Variable { name, .. } => {
                let value = self
                    .context
                    .resolve(name)
                    .ok_or_else(|| EvalError::UnboundReference { name: name.clone() })?;

                value
                    .as_number()
                    .ok_or_else(|| EvalError::NonNumericProperty { name: name.clone() })
            }

            Expr::Negate { operand, .. } => Ok(-self.eval_expr(operand)?),

            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                Ok(match operator {
                    BinaryOp::Add => left + right,
                    BinaryOp::Subtract => left - right,
                    BinaryOp::Multiply => left * right,
                    BinaryOp::Divide => left / right,
                })
            }

            Expr::Call {
                function,
                arguments,
                ..
            } => {
                let args = arguments
                    .iter()
                    .map(|arg| self.eval_expr(arg))
                    .collect::<EvalResult<Vec<f64>>>()?;
                self.eval_call(function, &args)
            }
        }
    }

    /// Builtin aggregate functions, matched case-insensitively
    fn eval_call(&self, function: &str, args: &[f64]) -> EvalResult<f64> {
        match function.to_ascii_lowercase().as_str() {
            "sum" => Ok(args.iter().sum()),
            // Avg() with no arguments yields NaN and is caught by the
            // finite-result check.
            "avg" => Ok(args.iter().sum::<f64>() / args.len() as f64),
            "scale" => Ok(args.iter().product()),
            _ => Err(EvalError::UnknownFunction {
                name: function.to_string(),
            }),
        }
    }
}
