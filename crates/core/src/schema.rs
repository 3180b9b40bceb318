//! Column declarations the edit engine consults: defaults for new rows,
//! validation rules, primary key, and which fields a form may write.

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::record::{Patch, Record};
use crate::validation::{FieldRule, ValidationRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Field name, possibly dotted into a nested object.
    pub field: String,
    pub header: Option<String>,
    /// Seeded into add drafts. Columns without one stay unset.
    pub default_value: Option<FieldValue>,
    pub rules: Vec<FieldRule>,
    pub is_primary_key: bool,
    pub allow_editing: bool,
}

impl ColumnDef {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            header: None,
            default_value: None,
            rules: Vec::new(),
            is_primary_key: false,
            allow_editing: true,
        }
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(FieldRule::new(rule));
        self
    }

    pub fn rule_with_message(mut self, rule: ValidationRule, message: impl Into<String>) -> Self {
        self.rules.push(FieldRule::new(rule).with_message(message));
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.allow_editing = false;
        self
    }

    pub fn display_name(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.field)
    }

    /// Primary keys are writable while adding and locked once the row exists.
    pub fn is_writable(&self, existing_row: bool) -> bool {
        if existing_row {
            self.allow_editing && !self.is_primary_key
        } else {
            self.allow_editing || self.is_primary_key
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSchema {
    columns: Vec<ColumnDef>,
}

impl GridSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, field: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Position of a column, used to keep focus on the same column across rows.
    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.is_primary_key)
            .map(|c| c.field.as_str())
    }

    /// A fresh add draft: declared defaults only.
    pub fn default_record(&self) -> Record {
        let mut record = Record::new();
        for column in &self.columns {
            let Some(value) = &column.default_value else {
                continue;
            };
            match Patch::set(&column.field, value.clone()).and_then(|p| record.apply(&p)) {
                Ok(next) => record = next,
                // Malformed column paths have nothing to seed.
                Err(_) => continue,
            }
        }
        record
    }
}
