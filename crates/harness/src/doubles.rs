use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rowedit_engine::{
    CellPosition, ConfirmationDialog, DialogKind, DialogRequest, EditEvent, EditSessionController,
    EventKind, FocusCoordinator, SelectionTracker,
};
use rowedit_storage::{DataMutationGateway, MutationRequest, MutationResult, Row, StorageError};

// ============================================================================
// Dialog
// ============================================================================

#[derive(Debug, Default)]
struct DialogState {
    answers: VecDeque<bool>,
    requests: Vec<DialogRequest>,
}

/// Answers confirms from a queue (yes once it runs dry) and records every prompt.
/// Clones share state, so keep one to inspect after handing the other over.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDialog {
    state: Rc<RefCell<DialogState>>,
}

impl ScriptedDialog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next confirm.
    pub fn answer(&self, yes: bool) {
        self.state.borrow_mut().answers.push_back(yes);
    }

    pub fn requests(&self) -> Vec<DialogRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.state.borrow().requests.len()
    }

    pub fn last_message(&self) -> Option<String> {
        self.state.borrow().requests.last().map(|r| r.message.clone())
    }
}

impl ConfirmationDialog for ScriptedDialog {
    fn confirm(&mut self, request: &DialogRequest) -> bool {
        let mut state = self.state.borrow_mut();
        state.requests.push(request.clone());
        match request.kind {
            DialogKind::Alert => true,
            DialogKind::Confirm => state.answers.pop_front().unwrap_or(true),
        }
    }
}

// ============================================================================
// Focus
// ============================================================================

#[derive(Debug, Default)]
struct FocusState {
    focused: Option<CellPosition>,
    has_focus: bool,
    navigations: Vec<CellPosition>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingFocus {
    state: Rc<RefCell<FocusState>>,
}

impl RecordingFocus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the cursor on a cell, as a click would.
    pub fn focus_cell(&self, row_index: usize, col_index: usize) {
        self.state.borrow_mut().focused = Some(CellPosition::new(row_index, col_index));
    }

    pub fn has_focus(&self) -> bool {
        self.state.borrow().has_focus
    }

    pub fn navigations(&self) -> Vec<CellPosition> {
        self.state.borrow().navigations.clone()
    }

    pub fn last_navigation(&self) -> Option<CellPosition> {
        self.state.borrow().navigations.last().copied()
    }
}

impl FocusCoordinator for RecordingFocus {
    fn set_focus(&mut self, enabled: bool) {
        self.state.borrow_mut().has_focus = enabled;
    }

    fn navigate_to_cell(&mut self, row_index: usize, col_index: usize) {
        let mut state = self.state.borrow_mut();
        let cell = CellPosition::new(row_index, col_index);
        state.focused = Some(cell);
        state.navigations.push(cell);
    }

    fn focused_cell(&self) -> Option<CellPosition> {
        self.state.borrow().focused
    }
}

// ============================================================================
// Selection
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ManualSelection {
    selected: Rc<RefCell<Vec<usize>>>,
}

impl ManualSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, indexes: &[usize]) {
        *self.selected.borrow_mut() = indexes.to_vec();
    }

    pub fn clear(&self) {
        self.selected.borrow_mut().clear();
    }

    pub fn selected(&self) -> Vec<usize> {
        self.selected.borrow().clone()
    }
}

impl SelectionTracker for ManualSelection {
    fn selected_indexes(&self) -> Vec<usize> {
        self.selected()
    }

    fn select_row(&mut self, index: usize) {
        self.select(&[index]);
    }
}

// ============================================================================
// Events
// ============================================================================

/// Keeps a copy of every published event.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<EditEvent>>>,
}

impl EventRecorder {
    pub fn attach<G: DataMutationGateway>(controller: &mut EditSessionController<G>) -> Self {
        let recorder = Self::default();
        let sink = Rc::clone(&recorder.events);
        controller.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        recorder
    }

    pub fn events(&self) -> Vec<EditEvent> {
        self.events.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.borrow().iter().map(EditEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn last(&self, kind: EventKind) -> Option<EditEvent> {
        self.events
            .borrow()
            .iter()
            .rev()
            .find(|e| e.kind() == kind)
            .cloned()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Counts mutation calls and fails them on demand.
#[derive(Debug)]
pub struct ScriptedGateway<G> {
    inner: G,
    calls: usize,
    failure: Option<String>,
}

impl<G: DataMutationGateway> ScriptedGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            calls: 0,
            failure: None,
        }
    }

    /// Reject every mutation with `message` until cleared.
    pub fn fail_with(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }

    pub fn recover(&mut self) {
        self.failure = None;
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: DataMutationGateway> DataMutationGateway for ScriptedGateway<G> {
    fn execute(&mut self, request: &MutationRequest) -> Result<MutationResult, StorageError> {
        self.calls += 1;
        if let Some(message) = &self.failure {
            return Err(StorageError::Rejected(message.clone()));
        }
        self.inner.execute(request)
    }

    fn query(&self) -> Result<Vec<Row>, StorageError> {
        self.inner.query()
    }
}
