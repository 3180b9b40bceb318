//! Keyboard and pointer shortcuts mapped onto controller operations.

use rowedit_storage::DataMutationGateway;

use crate::error::EngineError;
use crate::{EditSessionController, SaveOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    F2,
    Insert,
    Delete,
    Enter,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    /// Edit the given row, or the focused/selected one.
    BeginEdit(Option<usize>),
    Add,
    Delete,
    Save,
    Cancel,
}

impl From<EditKey> for EditCommand {
    fn from(key: EditKey) -> Self {
        match key {
            EditKey::F2 => Self::BeginEdit(None),
            EditKey::Insert => Self::Add,
            EditKey::Delete => Self::Delete,
            EditKey::Enter => Self::Save,
            EditKey::Escape => Self::Cancel,
        }
    }
}

impl<G: DataMutationGateway> EditSessionController<G> {
    /// Run a command. Returns whether it did anything.
    pub fn dispatch(&mut self, command: EditCommand) -> Result<bool, EngineError> {
        tracing::trace!(?command, "dispatch");
        match command {
            EditCommand::BeginEdit(row) => {
                let row = row.or_else(|| self.focus.focused_cell().map(|c| c.row_index));
                self.begin_edit(row)
            }
            EditCommand::Add => self.add_record(None, None),
            // Delete keys belong to the editor while a form is open.
            EditCommand::Delete if self.session.has_primary_form() => Ok(false),
            EditCommand::Delete => self.delete_records(None, None),
            EditCommand::Save => self.save(SaveOptions::default()),
            EditCommand::Cancel => {
                if self.session.default_target().is_none() {
                    return Ok(false);
                }
                self.cancel(None)?;
                Ok(true)
            }
        }
    }

    pub fn handle_key(&mut self, key: EditKey) -> Result<bool, EngineError> {
        self.dispatch(key.into())
    }

    pub fn handle_double_click(&mut self, row_index: usize) -> Result<bool, EngineError> {
        if !self.settings.allow_edit_on_dbl_click {
            return Ok(false);
        }
        self.dispatch(EditCommand::BeginEdit(Some(row_index)))
    }
}
