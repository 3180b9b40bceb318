//! Validation gate for draft records.
//!
//! Rules are declared per column and evaluated in declaration order; the
//! first failing rule supplies the field's message. Every rule except
//! [`ValidationRule::Required`] accepts blank values, so optional fields
//! are only checked once something has been typed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::record::Record;
use crate::schema::{ColumnDef, GridSchema};

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationRule {
    Required,
    /// Minimum character count (or item count for lists).
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Range { min: f64, max: f64 },
    Number,
    /// Non-negative whole number, as digits only.
    Digits,
    Email,
    OneOf(Vec<FieldValue>),
}

impl ValidationRule {
    pub fn check(&self, value: Option<&FieldValue>) -> bool {
        let value = match value {
            Some(v) if !v.is_blank() => v,
            _ => return !matches!(self, ValidationRule::Required),
        };

        match self {
            ValidationRule::Required => true,
            ValidationRule::MinLength(min) => length_of(value) >= *min,
            ValidationRule::MaxLength(max) => length_of(value) <= *max,
            ValidationRule::Min(min) => value.as_number().is_some_and(|n| n >= *min),
            ValidationRule::Max(max) => value.as_number().is_some_and(|n| n <= *max),
            ValidationRule::Range { min, max } => {
                value.as_number().is_some_and(|n| n >= *min && n <= *max)
            }
            ValidationRule::Number => value.as_number().is_some(),
            ValidationRule::Digits => match value {
                FieldValue::Integer(n) => *n >= 0,
                FieldValue::Text(s) => s.trim().chars().all(|c| c.is_ascii_digit()),
                _ => false,
            },
            ValidationRule::Email => value.as_text().is_some_and(looks_like_email),
            ValidationRule::OneOf(allowed) => allowed.contains(value),
        }
    }

    pub fn default_message(&self, name: &str) -> String {
        match self {
            ValidationRule::Required => format!("{name} is required"),
            ValidationRule::MinLength(n) => format!("{name} must be at least {n} characters"),
            ValidationRule::MaxLength(n) => format!("{name} must be at most {n} characters"),
            ValidationRule::Min(n) => format!("{name} must be at least {n}"),
            ValidationRule::Max(n) => format!("{name} must be at most {n}"),
            ValidationRule::Range { min, max } => {
                format!("{name} must be between {min} and {max}")
            }
            ValidationRule::Number => format!("{name} must be a number"),
            ValidationRule::Digits => format!("{name} must contain only digits"),
            ValidationRule::Email => format!("{name} must be a valid email address"),
            ValidationRule::OneOf(_) => format!("{name} is not an allowed value"),
        }
    }
}

fn length_of(value: &FieldValue) -> usize {
    match value {
        FieldValue::Text(s) => s.chars().count(),
        FieldValue::List(items) => items.len(),
        other => other.to_string().chars().count(),
    }
}

fn looks_like_email(s: &str) -> bool {
    let s = s.trim();
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// A rule attached to a column, optionally with a custom message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub rule: ValidationRule,
    pub message: Option<String>,
}

impl FieldRule {
    pub fn new(rule: ValidationRule) -> Self {
        Self { rule, message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ============================================================================
// Error map
// ============================================================================

/// Field → message. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Replace one field's entry with a fresh result.
    pub fn set_result(&mut self, field: &str, result: Option<String>) {
        match result {
            Some(message) => self.insert(field, message),
            None => {
                self.remove(field);
            }
        }
    }
}

// ============================================================================
// Gate
// ============================================================================

fn check_column(column: &ColumnDef, record: &Record) -> Option<String> {
    let value = record.lookup(&column.field);
    column
        .rules
        .iter()
        .find(|r| !r.rule.check(value))
        .map(|r| {
            r.message
                .clone()
                .unwrap_or_else(|| r.rule.default_message(column.display_name()))
        })
}

/// Validate every ruled column of the schema against `record`.
pub fn validate_record(schema: &GridSchema, record: &Record) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for column in schema.columns() {
        if let Some(message) = check_column(column, record) {
            errors.insert(column.field.clone(), message);
        }
    }
    errors
}

/// Validate a single field. Fields without a column declaration are valid.
pub fn validate_field(schema: &GridSchema, record: &Record, field: &str) -> Option<String> {
    schema
        .column(field)
        .and_then(|column| check_column(column, record))
}
