//! Contracts for the collaborators the controller consults but does not own.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    /// Informational, single button.
    Alert,
    /// Yes/no question.
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogRequest {
    pub title: String,
    pub message: String,
    pub confirm_text: String,
    pub cancel_text: Option<String>,
    pub kind: DialogKind,
}

impl DialogRequest {
    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_text: "OK".to_string(),
            cancel_text: None,
            kind: DialogKind::Alert,
        }
    }

    pub fn confirm(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_text: "OK".to_string(),
            cancel_text: Some("Cancel".to_string()),
            kind: DialogKind::Confirm,
        }
    }
}

pub trait ConfirmationDialog {
    /// Present the prompt and report the answer. Alerts report `true` once dismissed.
    fn confirm(&mut self, request: &DialogRequest) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    pub row_index: usize,
    pub col_index: usize,
}

impl CellPosition {
    pub fn new(row_index: usize, col_index: usize) -> Self {
        Self { row_index, col_index }
    }
}

pub trait FocusCoordinator {
    fn set_focus(&mut self, enabled: bool);
    fn navigate_to_cell(&mut self, row_index: usize, col_index: usize);
    fn focused_cell(&self) -> Option<CellPosition>;
}

pub trait SelectionTracker {
    fn selected_indexes(&self) -> Vec<usize>;
    fn select_row(&mut self, index: usize);
}

/// Accepts every prompt.
#[derive(Debug, Default)]
pub struct AutoConfirm;

impl ConfirmationDialog for AutoConfirm {
    fn confirm(&mut self, _request: &DialogRequest) -> bool {
        true
    }
}

/// Focus sink for headless use.
#[derive(Debug, Default)]
pub struct NoFocus;

impl FocusCoordinator for NoFocus {
    fn set_focus(&mut self, _enabled: bool) {}
    fn navigate_to_cell(&mut self, _row_index: usize, _col_index: usize) {}
    fn focused_cell(&self) -> Option<CellPosition> {
        None
    }
}

/// Selection that is always empty.
#[derive(Debug, Default)]
pub struct NoSelection;

impl SelectionTracker for NoSelection {
    fn selected_indexes(&self) -> Vec<usize> {
        Vec::new()
    }
    fn select_row(&mut self, _index: usize) {}
}

pub struct Collaborators {
    pub dialog: Box<dyn ConfirmationDialog>,
    pub focus: Box<dyn FocusCoordinator>,
    pub selection: Box<dyn SelectionTracker>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            dialog: Box::new(AutoConfirm),
            focus: Box::new(NoFocus),
            selection: Box::new(NoSelection),
        }
    }
}
