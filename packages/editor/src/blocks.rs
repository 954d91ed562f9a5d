//! # Block Model
//!
//! Structured metadata attached to tracked text ranges: property bindings
//! and collapsible sub-expressions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use blockdoc_evaluator::Value;

/// A named value binding rendered as an atomic chip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyBlock {
    pub id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub value: Value,
}

impl PropertyBlock {
    /// Fresh binding with a new id
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            value,
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Value::Number(value))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Value::String(value.into()))
    }
}

/// Presentation state of an expression block, derived from its bound
/// properties on every call, never cached, so it cannot go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpressionState {
    pub is_empty: bool,
    pub is_valid: bool,
    pub property_count: usize,
    pub has_function: bool,
}

/// A collapsible sub-expression, optionally a named function whose
/// arguments are bound property references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionBlock {
    pub id: Uuid,
    pub expression_text: String,
    pub is_function: bool,
    pub function_name: Option<String>,
    pub bound_properties: Vec<PropertyBlock>,
    pub collapsed: bool,
}

impl ExpressionBlock {
    pub fn new(initial_text: impl Into<String>) -> Self {
        let expression_text = initial_text.into();
        let function_name = extract_function_name(&expression_text);
        Self {
            id: Uuid::new_v4(),
            is_function: function_name.is_some(),
            function_name,
            expression_text,
            bound_properties: Vec::new(),
            collapsed: true,
        }
    }

    /// Append a bound property reference. Membership is logical; the
    /// property does not own a range of its own.
    pub fn add_property(&mut self, property: PropertyBlock) {
        self.bound_properties.push(property);
    }

    /// Remove a bound property by id; true when something was removed
    pub fn remove_property(&mut self, id: Uuid) -> bool {
        let before = self.bound_properties.len();
        self.bound_properties.retain(|p| p.id != id);
        self.bound_properties.len() != before
    }

    pub fn is_valid(&self) -> bool {
        !self.bound_properties.is_empty()
    }

    pub fn state(&self) -> ExpressionState {
        ExpressionState {
            is_empty: self.bound_properties.is_empty(),
            is_valid: !self.bound_properties.is_empty(),
            property_count: self.bound_properties.len(),
            has_function: self.is_function,
        }
    }

    /// Text this block occupies in the buffer: `name(a, b)` for functions,
    /// the expression bracketed as an inline sub-expression otherwise
    pub fn rendered_text(&self) -> String {
        match &self.function_name {
            Some(name) => {
                let args: Vec<&str> = self
                    .bound_properties
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect();
                format!("{}({})", name, args.join(", "))
            }
            None => format!("[{}]", self.expression_text),
        }
    }
}

/// Classify `identifier()` text: a leading alphabetic identifier
/// immediately followed by an empty parameter list
fn extract_function_name(content: &str) -> Option<String> {
    let trimmed = content.trim();
    let name_len = trimmed
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    if name_len == 0 {
        return None;
    }
    let rest = trimmed[name_len..].trim_start().strip_prefix('(')?;
    let rest = rest.trim_start().strip_prefix(')')?;
    rest.is_empty().then(|| trimmed[..name_len].to_string())
}

/// Block payload tracked by a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Block {
    Property(PropertyBlock),
    Expression(ExpressionBlock),
}

impl Block {
    pub fn id(&self) -> Uuid {
        match self {
            Block::Property(p) => p.id,
            Block::Expression(e) => e.id,
        }
    }

    /// Text the block occupies while rendered as a chip
    pub fn rendered_text(&self) -> String {
        match self {
            Block::Property(p) => p.name.clone(),
            Block::Expression(e) => e.rendered_text(),
        }
    }

    /// Raw editable text the block expands back into
    pub fn expansion_text(&self) -> String {
        match self {
            Block::Property(p) => p.name.clone(),
            Block::Expression(e) => match &e.function_name {
                Some(_) => e.rendered_text(),
                None => e.expression_text.clone(),
            },
        }
    }

    pub fn as_property(&self) -> Option<&PropertyBlock> {
        match self {
            Block::Property(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_expression(&self) -> Option<&ExpressionBlock> {
        match self {
            Block::Expression(e) => Some(e),
            _ => None,
        }
    }
}
