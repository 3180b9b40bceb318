// Edit behaviour settings
// Loaded from a TOML table, every key optional

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Where interactive and programmatic adds land when no index is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewRowPosition {
    /// Start of the current view
    #[default]
    Top,
    /// End of the current view
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditSettings {
    pub allow_editing: bool,
    pub allow_adding: bool,
    pub allow_deleting: bool,

    /// Double-clicking a row begins an edit
    pub allow_edit_on_dbl_click: bool,

    /// Prompt before discarding unsaved drafts
    pub show_confirm_dialog: bool,

    /// Prompt before deleting
    pub show_delete_confirm_dialog: bool,

    /// Keep a standing add row open at all times
    pub show_add_new_row: bool,

    pub new_row_position: NewRowPosition,

    /// Rows per page; `None` disables paging
    pub page_size: Option<usize>,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            allow_editing: true,
            allow_adding: true,
            allow_deleting: true,
            allow_edit_on_dbl_click: true,
            show_confirm_dialog: true,
            show_delete_confirm_dialog: false,
            show_add_new_row: false,
            new_row_position: NewRowPosition::Top,
            page_size: None,
        }
    }
}

impl EditSettings {
    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        let settings: Self = toml::from_str(contents).map_err(|e| CoreError::Config(e.to_string()))?;
        if settings.page_size == Some(0) {
            return Err(CoreError::Config("page_size must be at least 1".into()));
        }
        Ok(settings)
    }

    /// Load settings from disk. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, CoreError> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }
}
