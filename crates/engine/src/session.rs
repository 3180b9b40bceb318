use rowedit_core::{
    ids::{FormId, RowUid},
    record::{Patch, Record},
    validation::ValidationErrors,
    CoreError,
};
use rowedit_storage::Row;

use crate::collaborators::CellPosition;
use crate::history::DraftHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    Editing,
    Adding,
    /// Only the standing add row is open.
    PersistentAdd,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Editing => "editing",
            Self::Adding => "adding",
            Self::PersistentAdd => "persistent_add",
        }
    }
}

/// Which open draft an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormTarget {
    /// The primary edit or add session.
    Primary,
    /// The persistent add row.
    StandingAdd,
    /// A command-column overlay.
    Overlay(RowUid),
}

/// Identifies one rendering of a draft form. Reopening a form issues a new id,
/// so a handle held across a save or cancel is detectably stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormHandle {
    pub id: FormId,
    pub target: FormTarget,
    pub row_index: Option<usize>,
}

impl FormHandle {
    pub fn new(target: FormTarget, row_index: Option<usize>) -> Self {
        Self {
            id: FormId::new(),
            target,
            row_index,
        }
    }
}

/// A draft under edit with its rollback snapshot and error map.
#[derive(Debug, Clone)]
pub struct DraftForm {
    pub form: FormHandle,
    /// `None` for adds.
    pub original: Option<Record>,
    pub draft: Record,
    pub validation_errors: ValidationErrors,
    pub history: DraftHistory,
}

impl DraftForm {
    pub fn new(form: FormHandle, original: Option<Record>, draft: Record) -> Self {
        Self {
            form,
            original,
            draft,
            validation_errors: ValidationErrors::new(),
            history: DraftHistory::default(),
        }
    }

    pub fn is_add(&self) -> bool {
        self.original.is_none()
    }

    /// Edits compare against the snapshot, adds against the column defaults.
    pub fn is_modified(&self, defaults: &Record) -> bool {
        match &self.original {
            Some(original) => &self.draft != original,
            None => &self.draft != defaults,
        }
    }

    /// Copy-on-write field change, recorded for undo.
    pub fn apply(&mut self, patch: Patch) -> Result<(), CoreError> {
        let next = self.draft.apply(&patch)?;
        let inverse = patch.inverse_against(&self.draft);
        self.history.record(patch, inverse);
        self.draft = next;
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool, CoreError> {
        let Some(entry) = self.history.pop_undo() else {
            return Ok(false);
        };
        self.draft = self.draft.apply(&entry.inverse)?;
        self.history.push_redo(entry);
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, CoreError> {
        let Some(entry) = self.history.pop_redo() else {
            return Ok(false);
        };
        self.draft = self.draft.apply(&entry.patch)?;
        self.history.push_undo(entry);
        Ok(true)
    }

    /// Back to `draft` with no errors or history. Keeps the form id.
    pub fn reset_to(&mut self, draft: Record) {
        self.draft = draft;
        self.validation_errors.clear();
        self.history.clear();
    }
}

/// The primary session plus the standing add row.
#[derive(Debug, Clone)]
pub struct EditSession {
    mode: SessionMode,
    target_row_index: Option<usize>,
    target_uid: Option<RowUid>,
    insert_index: Option<usize>,
    restore_cell: Option<CellPosition>,
    form: Option<DraftForm>,
    persistent_add: Option<DraftForm>,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self {
            mode: SessionMode::Idle,
            target_row_index: None,
            target_uid: None,
            insert_index: None,
            restore_cell: None,
            form: None,
            persistent_add: None,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn target_row_index(&self) -> Option<usize> {
        self.target_row_index
    }

    pub fn target_uid(&self) -> Option<RowUid> {
        self.target_uid
    }

    pub fn insert_index(&self) -> Option<usize> {
        self.insert_index
    }

    /// Focused cell captured when the primary session opened.
    pub fn restore_cell(&self) -> Option<CellPosition> {
        self.restore_cell
    }

    pub fn primary_form(&self) -> Option<&DraftForm> {
        self.form.as_ref()
    }

    pub(crate) fn primary_form_mut(&mut self) -> Option<&mut DraftForm> {
        self.form.as_mut()
    }

    pub fn standing(&self) -> Option<&DraftForm> {
        self.persistent_add.as_ref()
    }

    pub(crate) fn standing_mut(&mut self) -> Option<&mut DraftForm> {
        self.persistent_add.as_mut()
    }

    pub fn draft(&self) -> Option<&Record> {
        self.form.as_ref().map(|f| &f.draft)
    }

    pub fn original(&self) -> Option<&Record> {
        self.form.as_ref().and_then(|f| f.original.as_ref())
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        self.form.as_ref().map(|f| &f.validation_errors)
    }

    pub fn persistent_add_draft(&self) -> Option<&Record> {
        self.persistent_add.as_ref().map(|f| &f.draft)
    }

    /// A primary Editing or Adding session is open. The standing row doesn't count.
    pub fn has_primary_form(&self) -> bool {
        self.form.is_some()
    }

    /// The draft an untargeted operation (save, cancel, set_field) applies to.
    pub fn default_target(&self) -> Option<FormTarget> {
        match self.mode {
            SessionMode::Editing | SessionMode::Adding => Some(FormTarget::Primary),
            SessionMode::PersistentAdd => Some(FormTarget::StandingAdd),
            SessionMode::Idle => None,
        }
    }

    pub fn has_unsaved_changes(&self, defaults: &Record) -> bool {
        self.form.iter().chain(self.persistent_add.iter()).any(|f| f.is_modified(defaults))
    }

    pub(crate) fn open_edit(
        &mut self,
        row_index: usize,
        row: &Row,
        restore_cell: Option<CellPosition>,
    ) -> FormHandle {
        let handle = FormHandle::new(FormTarget::Primary, Some(row_index));
        self.form = Some(DraftForm::new(
            handle.clone(),
            Some(row.record.clone()),
            row.record.clone(),
        ));
        self.mode = SessionMode::Editing;
        self.target_row_index = Some(row_index);
        self.target_uid = Some(row.uid);
        self.insert_index = None;
        self.restore_cell = restore_cell;
        handle
    }

    pub(crate) fn open_add(
        &mut self,
        insert_index: usize,
        draft: Record,
        restore_cell: Option<CellPosition>,
    ) -> FormHandle {
        let handle = FormHandle::new(FormTarget::Primary, None);
        self.form = Some(DraftForm::new(handle.clone(), None, draft));
        self.mode = SessionMode::Adding;
        self.target_row_index = None;
        self.target_uid = None;
        self.insert_index = Some(insert_index);
        self.restore_cell = restore_cell;
        handle
    }

    /// Drop the primary draft. The standing row, if any, stays armed.
    pub(crate) fn close(&mut self) {
        self.form = None;
        self.target_row_index = None;
        self.target_uid = None;
        self.insert_index = None;
        self.restore_cell = None;
        self.mode = if self.persistent_add.is_some() {
            SessionMode::PersistentAdd
        } else {
            SessionMode::Idle
        };
    }

    /// Install a fresh standing add row.
    pub(crate) fn arm_standing(&mut self, draft: Record) -> FormHandle {
        let handle = FormHandle::new(FormTarget::StandingAdd, None);
        self.persistent_add = Some(DraftForm::new(handle.clone(), None, draft));
        if self.form.is_none() {
            self.mode = SessionMode::PersistentAdd;
        }
        handle
    }

    /// Keep the primary row index pointing at the same row after the store shifted.
    pub(crate) fn reindex(&mut self, rows: &[Row]) {
        if let Some(uid) = self.target_uid {
            self.target_row_index = rows.iter().position(|r| r.uid == uid);
        }
    }
}
