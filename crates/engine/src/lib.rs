pub mod collaborators;
pub mod commands;
pub mod deferred;
pub mod delete;
pub mod error;
pub mod events;
pub mod history;
pub mod overlay;
pub mod session;

pub use collaborators::{
    CellPosition, Collaborators, ConfirmationDialog, DialogKind, DialogRequest, FocusCoordinator,
    SelectionTracker,
};
pub use commands::{EditCommand, EditKey};
pub use deferred::{Deferred, DeferredQueue};
pub use delete::DeleteItem;
pub use error::EngineError;
pub use events::{EditAction, EditEvent, EventBus, EventKind, SubscriptionId};
pub use overlay::{OverlayKind, OverlayRegistry, RowOverlay};
pub use session::{DraftForm, EditSession, FormHandle, FormTarget, SessionMode};

use rowedit_core::{
    field_value::FieldValue,
    ids::RowUid,
    record::{Patch, Record},
    schema::GridSchema,
    settings::{EditSettings, NewRowPosition},
    validation::{self, ValidationErrors},
};
use rowedit_storage::{DataMutationGateway, MutationRequest, Row, StorageError};

use crate::events::{
    CancelEdit, FormRendered, MutationError, RowAddBegin, RowEditBegin, SaveBegin, SaveComplete,
};

const NO_RECORDS_TITLE: &str = "No records selected";
const NO_RECORDS_FOR_EDIT: &str = "No records selected for edit operation";
const UNSAVED_TITLE: &str = "Unsaved changes";
const UNSAVED_MESSAGE: &str = "Unsaved changes will be lost. Are you sure you want to continue?";

/// Options for [`EditSessionController::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub requires_validation: bool,
    /// Insert position for adds, ahead of the session's and the configured one.
    pub insert_index: Option<usize>,
    /// Which draft to commit. Defaults to the active one.
    pub origin: Option<FormTarget>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            requires_validation: true,
            insert_index: None,
            origin: None,
        }
    }
}

impl SaveOptions {
    pub fn target(origin: FormTarget) -> Self {
        Self {
            origin: Some(origin),
            ..Self::default()
        }
    }

    pub fn without_validation(mut self) -> Self {
        self.requires_validation = false;
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.insert_index = Some(index);
        self
    }
}

/// Raw field input from the host's editors. `target: None` means the active draft.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Changed {
        target: Option<FormTarget>,
        field: String,
        value: FieldValue,
    },
    Blurred {
        target: Option<FormTarget>,
        field: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitKind {
    Add,
    Edit,
}

impl CommitKind {
    fn action(self) -> EditAction {
        match self {
            Self::Add => EditAction::Add,
            Self::Edit => EditAction::Edit,
        }
    }
}

/// Everything a commit needs, captured before the save-begin event fires.
struct CommitPlan {
    /// Draft to close on success. `None` for programmatic commits.
    target: Option<FormTarget>,
    kind: CommitKind,
    row: Row,
    previous: Option<Record>,
    row_index: usize,
}

/// Owns the edit session state and orchestrates begin, validate, commit and
/// cancel across the primary session, the standing add row, and overlays.
pub struct EditSessionController<G: DataMutationGateway> {
    schema: GridSchema,
    settings: EditSettings,
    gateway: G,
    dialog: Box<dyn ConfirmationDialog>,
    focus: Box<dyn FocusCoordinator>,
    selection: Box<dyn SelectionTracker>,
    events: EventBus,
    session: EditSession,
    overlays: OverlayRegistry,
    deferred: DeferredQueue,
    current_page: usize,
}

impl<G: DataMutationGateway> EditSessionController<G> {
    pub fn new(
        schema: GridSchema,
        settings: EditSettings,
        gateway: G,
        collaborators: Collaborators,
    ) -> Self {
        let mut controller = Self {
            schema,
            settings,
            gateway,
            dialog: collaborators.dialog,
            focus: collaborators.focus,
            selection: collaborators.selection,
            events: EventBus::new(),
            session: EditSession::new(),
            overlays: OverlayRegistry::new(),
            deferred: DeferredQueue::new(),
            current_page: 0,
        };
        if controller.settings.show_add_new_row {
            let handle = controller
                .session
                .arm_standing(controller.schema.default_record());
            controller.deferred.push(Deferred::FormRendered(handle));
        }
        controller
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn schema(&self) -> &GridSchema {
        &self.schema
    }

    pub fn settings(&self) -> &EditSettings {
        &self.settings
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn overlays(&self) -> &OverlayRegistry {
        &self.overlays
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut EditEvent) + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Move to `page`, clamped to the last page. No effect without paging.
    pub fn set_page(&mut self, page: usize) -> Result<usize, EngineError> {
        let Some(page_size) = self.settings.page_size else {
            return Ok(0);
        };
        let len = self.gateway.row_count()?;
        let last_page = len.saturating_sub(1) / page_size;
        self.current_page = page.min(last_page);
        Ok(self.current_page)
    }

    /// Look up any open draft.
    pub fn form(&self, target: FormTarget) -> Result<&DraftForm, EngineError> {
        match target {
            FormTarget::Primary => self.session.primary_form().ok_or(EngineError::NoActiveSession),
            FormTarget::StandingAdd => self.session.standing().ok_or(EngineError::NoActiveSession),
            FormTarget::Overlay(uid) => self
                .overlays
                .get(uid)
                .map(|o| &o.form)
                .ok_or_else(|| EngineError::OverlayNotFound(uid.to_string())),
        }
    }

    fn form_mut(&mut self, target: FormTarget) -> Result<&mut DraftForm, EngineError> {
        match target {
            FormTarget::Primary => self
                .session
                .primary_form_mut()
                .ok_or(EngineError::NoActiveSession),
            FormTarget::StandingAdd => self.session.standing_mut().ok_or(EngineError::NoActiveSession),
            FormTarget::Overlay(uid) => self
                .overlays
                .get_mut(uid)
                .map(|o| &mut o.form)
                .ok_or_else(|| EngineError::OverlayNotFound(uid.to_string())),
        }
    }

    fn active_target(&self) -> Result<FormTarget, EngineError> {
        self.session
            .default_target()
            .ok_or(EngineError::NoActiveSession)
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Open an edit session on `row`, or on the first selected row.
    /// Returns whether a session is open on that row afterwards.
    pub fn begin_edit(&mut self, row: Option<usize>) -> Result<bool, EngineError> {
        if !self.settings.allow_editing {
            tracing::debug!("begin_edit ignored: editing disabled");
            return Ok(false);
        }

        let rows = self.rows()?;
        let requested = row.or_else(|| self.selection.selected_indexes().first().copied());
        let Some((row_index, target)) =
            requested.and_then(|i| rows.get(i).cloned().map(|r| (i, r)))
        else {
            tracing::debug!(?requested, "begin_edit: no target row");
            self.alert(NO_RECORDS_FOR_EDIT);
            return Ok(false);
        };

        if self.session.mode() == SessionMode::Editing
            && self.session.target_uid() == Some(target.uid)
        {
            tracing::debug!(row_index, "begin_edit: row already in edit");
            return Ok(true);
        }
        if self.overlays.contains(target.uid) {
            tracing::warn!(row_index, "begin_edit refused: row has an open overlay");
            return Ok(false);
        }

        // Save-before-switch. The commit may shift rows, so re-find the target.
        let row_index = if self.session.has_primary_form() {
            if !self.save(SaveOptions::default())? {
                tracing::debug!(row_index, "begin_edit aborted: open session did not commit");
                return Ok(false);
            }
            match self.rows()?.iter().position(|r| r.uid == target.uid) {
                Some(index) => index,
                None => return Ok(false),
            }
        } else {
            row_index
        };

        let event = self.events.publish(EditEvent::RowEditBegin(RowEditBegin {
            row_index,
            data: target.record.clone(),
            cancel: false,
        }));
        if event.is_cancelled() {
            tracing::debug!(row_index, "row-edit-begin cancelled by handler");
            return Ok(false);
        }

        let restore_cell = self.focus.focused_cell();
        let handle = self.session.open_edit(row_index, &target, restore_cell);
        self.deferred.push(Deferred::FormRendered(handle));
        tracing::info!(row_index, "edit session opened");
        Ok(true)
    }

    /// Programmatic edit commit of a whole row, without validation.
    /// Refused while a session or overlay holds a draft of that row.
    pub fn update_row(&mut self, index: usize, record: Record) -> Result<bool, EngineError> {
        let rows = self.rows()?;
        let row = rows.get(index).ok_or(EngineError::RowOutOfRange {
            index,
            len: rows.len(),
        })?;
        if self.session.target_uid() == Some(row.uid) || self.overlays.contains(row.uid) {
            tracing::warn!(index, "update refused: row has an open draft");
            return Ok(false);
        }
        let plan = CommitPlan {
            target: None,
            kind: CommitKind::Edit,
            row: Row {
                uid: row.uid,
                record,
            },
            previous: Some(row.record.clone()),
            row_index: index,
        };
        self.commit(plan)
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Validate and commit a draft. `Ok(false)` covers validation failure,
    /// a cancelled save-begin, a rejected mutation, and nothing being open.
    pub fn save(&mut self, options: SaveOptions) -> Result<bool, EngineError> {
        let Some(target) = options.origin.or_else(|| self.session.default_target()) else {
            tracing::debug!("save ignored: no open draft");
            return Ok(false);
        };

        if options.requires_validation {
            let errors = validation::validate_record(&self.schema, &self.form(target)?.draft);
            let blocked = !errors.is_empty();
            if blocked {
                tracing::debug!(fields = errors.len(), "save blocked by validation");
            }
            self.form_mut(target)?.validation_errors = errors;
            if blocked {
                return Ok(false);
            }
        }

        let plan = self.plan_commit(target, options.insert_index)?;
        self.commit(plan)
    }

    fn plan_commit(
        &self,
        target: FormTarget,
        insert_index: Option<usize>,
    ) -> Result<CommitPlan, EngineError> {
        let form = self.form(target)?;
        let draft = form.draft.clone();

        let Some(original) = form.original.clone() else {
            let uid = match target {
                FormTarget::Overlay(uid) => uid,
                FormTarget::Primary | FormTarget::StandingAdd => RowUid::new(),
            };
            let preferred = insert_index.or(match target {
                FormTarget::Primary => self.session.insert_index(),
                FormTarget::Overlay(uid) => self.overlays.get(uid).map(|o| o.row_index),
                FormTarget::StandingAdd => None,
            });
            return Ok(CommitPlan {
                target: Some(target),
                kind: CommitKind::Add,
                row: Row { uid, record: draft },
                previous: None,
                row_index: self.resolve_insert_index(preferred)?,
            });
        };

        let (uid, known_index) = match target {
            FormTarget::Overlay(uid) => (uid, self.overlays.get(uid).map(|o| o.row_index)),
            FormTarget::Primary | FormTarget::StandingAdd => (
                self.session.target_uid().ok_or(EngineError::NoActiveSession)?,
                self.session.target_row_index(),
            ),
        };
        // A row that vanished keeps its last known index; the gateway reports the miss.
        let row_index = self
            .rows()?
            .iter()
            .position(|r| r.uid == uid)
            .or(known_index)
            .unwrap_or_default();

        Ok(CommitPlan {
            target: Some(target),
            kind: CommitKind::Edit,
            row: Row { uid, record: draft },
            previous: Some(original),
            row_index,
        })
    }

    fn commit(&mut self, plan: CommitPlan) -> Result<bool, EngineError> {
        let action = plan.kind.action();
        let begin = self.events.publish(EditEvent::SaveBegin(SaveBegin {
            action,
            data: plan.row.record.clone(),
            previous_data: plan.previous.clone(),
            row_index: plan.row_index,
            cancel: false,
        }));
        if begin.is_cancelled() {
            tracing::debug!(action = action.as_str(), "save-begin cancelled by handler");
            return Ok(false);
        }

        let request = match plan.kind {
            CommitKind::Add => MutationRequest::save(plan.row.clone(), Some(plan.row_index)),
            CommitKind::Edit => MutationRequest::update(plan.row.clone()),
        };
        let result = match self.gateway.execute(&request) {
            Ok(result) => result,
            Err(err) => {
                self.report_mutation_error(action, &err);
                return Ok(false);
            }
        };

        let row_index = result.index.unwrap_or(plan.row_index);
        tracing::info!(action = action.as_str(), row_index, "record saved");
        self.events.publish(EditEvent::SaveComplete(SaveComplete {
            action,
            data: plan.row.record,
            previous_data: plan.previous,
            row_index,
        }));

        if let Some(target) = plan.target {
            self.close_target(target);
        }
        self.refresh_row_indexes()?;
        self.schedule_focus(row_index);
        Ok(true)
    }

    fn close_target(&mut self, target: FormTarget) {
        match target {
            FormTarget::Primary => self.session.close(),
            FormTarget::StandingAdd => {
                let handle = self.session.arm_standing(self.schema.default_record());
                self.deferred.push(Deferred::FormRendered(handle));
            }
            FormTarget::Overlay(uid) => {
                self.overlays.remove(uid);
            }
        }
    }

    fn report_mutation_error(&mut self, action: EditAction, err: &StorageError) {
        tracing::error!(action = action.as_str(), error = %err, "mutation failed");
        self.events.publish(EditEvent::MutationError(MutationError {
            action,
            message: err.to_string(),
        }));
    }

    // ========================================================================
    // Cancel
    // ========================================================================

    /// Discard a draft. Never touches the store.
    pub fn cancel(&mut self, origin: Option<FormTarget>) -> Result<(), EngineError> {
        let Some(target) = origin.or_else(|| self.session.default_target()) else {
            tracing::debug!("cancel ignored: no open draft");
            return Ok(());
        };

        match target {
            FormTarget::Primary => {
                let form = self
                    .session
                    .primary_form()
                    .ok_or(EngineError::NoActiveSession)?;
                let event = CancelEdit {
                    data: form.draft.clone(),
                    row_index: self.session.target_row_index(),
                    form: form.form.clone(),
                };
                let restore = match self.session.target_row_index() {
                    Some(row) => Some((row, self.session.restore_cell().map_or(0, |c| c.col_index))),
                    None => self.session.restore_cell().map(|c| (c.row_index, c.col_index)),
                };

                self.events.publish(EditEvent::Cancel(event));
                self.session.close();
                if let Some((row_index, col_index)) = restore {
                    self.deferred.push(Deferred::RestoreFocus { row_index, col_index });
                }
                tracing::info!("edit session cancelled");
            }
            FormTarget::StandingAdd => {
                let defaults = self.schema.default_record();
                let standing = self
                    .session
                    .standing_mut()
                    .ok_or(EngineError::NoActiveSession)?;
                if !standing.is_modified(&defaults) {
                    standing.reset_to(defaults);
                    tracing::debug!("standing add row reset to defaults");
                    return Ok(());
                }
                let event = CancelEdit {
                    data: standing.draft.clone(),
                    row_index: None,
                    form: standing.form.clone(),
                };
                self.events.publish(EditEvent::Cancel(event));
                let handle = self.session.arm_standing(defaults);
                self.deferred.push(Deferred::FormRendered(handle));
            }
            FormTarget::Overlay(uid) => {
                let overlay = self
                    .overlays
                    .remove(uid)
                    .ok_or_else(|| EngineError::OverlayNotFound(uid.to_string()))?;
                let row_index = (overlay.kind == OverlayKind::Edit).then_some(overlay.row_index);
                self.events.publish(EditEvent::Cancel(CancelEdit {
                    data: overlay.form.draft,
                    row_index,
                    form: overlay.form.form,
                }));
                if let Some(row_index) = row_index {
                    self.schedule_focus(row_index);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Adding
    // ========================================================================

    /// With `data`, insert it directly without validation. Without, open an
    /// add draft seeded from column defaults.
    pub fn add_record(&mut self, data: Option<Record>, index: Option<usize>) -> Result<bool, EngineError> {
        if !self.settings.allow_adding {
            tracing::debug!("add_record ignored: adding disabled");
            return Ok(false);
        }

        if let Some(record) = data {
            let row_index = self.resolve_insert_index(index)?;
            return self.commit(CommitPlan {
                target: None,
                kind: CommitKind::Add,
                row: Row::new(record),
                previous: None,
                row_index,
            });
        }

        if self.session.has_primary_form() && !self.save(SaveOptions::default())? {
            tracing::debug!("add_record aborted: open session did not commit");
            return Ok(false);
        }

        // The standing row is the add form in persistent mode.
        if let Some(standing) = self.session.standing() {
            let handle = standing.form.clone();
            self.deferred.push(Deferred::FormRendered(handle));
            return Ok(true);
        }

        let row_index = self.resolve_insert_index(index)?;
        let event = self.events.publish(EditEvent::RowAddBegin(RowAddBegin {
            data: self.schema.default_record(),
            row_index,
            cancel: false,
        }));
        let draft = match event {
            EditEvent::RowAddBegin(args) if !args.cancel => args.data,
            _ => {
                tracing::debug!(row_index, "row-add-begin cancelled by handler");
                return Ok(false);
            }
        };

        let restore_cell = self.focus.focused_cell();
        let handle = self.session.open_add(row_index, draft, restore_cell);
        self.deferred.push(Deferred::FormRendered(handle));
        tracing::info!(row_index, "add session opened");
        Ok(true)
    }

    // ========================================================================
    // Field mutation & validation
    // ========================================================================

    pub fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), EngineError> {
        let target = self.active_target()?;
        self.set_field_on(target, field, value)
    }

    pub fn set_field_on(
        &mut self,
        target: FormTarget,
        field: &str,
        value: FieldValue,
    ) -> Result<(), EngineError> {
        let patch = Patch::set(field, value)?;
        let existing_row = !self.form(target)?.is_add();
        let column = self
            .schema
            .column(field)
            .or_else(|| self.schema.column(patch.path.root()));
        if let Some(column) = column
            && !column.is_writable(existing_row)
        {
            return Err(EngineError::ColumnNotEditable(field.to_string()));
        }
        self.form_mut(target)?.apply(patch)?;
        tracing::trace!(field, "draft updated");
        Ok(())
    }

    pub fn validate_field(&mut self, field: &str) -> Result<bool, EngineError> {
        let target = self.active_target()?;
        self.validate_field_on(target, field)
    }

    /// Recompute one field's error, leaving the others as they are.
    pub fn validate_field_on(&mut self, target: FormTarget, field: &str) -> Result<bool, EngineError> {
        let message = validation::validate_field(&self.schema, &self.form(target)?.draft, field);
        let valid = message.is_none();
        self.form_mut(target)?
            .validation_errors
            .set_result(field, message);
        Ok(valid)
    }

    /// Full validation of the form behind `handle`.
    pub fn validate_form(&mut self, handle: &FormHandle) -> Result<ValidationErrors, EngineError> {
        let form = self.form(handle.target)?;
        if form.form.id != handle.id {
            return Err(EngineError::FormClosed(handle.id.to_string()));
        }
        let errors = validation::validate_record(&self.schema, &form.draft);
        self.form_mut(handle.target)?.validation_errors = errors.clone();
        Ok(errors)
    }

    pub fn handle_input(&mut self, input: InputEvent) -> Result<(), EngineError> {
        match input {
            InputEvent::Changed {
                target,
                field,
                value,
            } => {
                let target = target.map_or_else(|| self.active_target(), Ok)?;
                self.set_field_on(target, &field, value)
            }
            InputEvent::Blurred { target, field } => {
                let target = target.map_or_else(|| self.active_target(), Ok)?;
                self.validate_field_on(target, &field).map(|_| ())
            }
        }
    }

    pub fn undo_field_change(&mut self, target: Option<FormTarget>) -> Result<bool, EngineError> {
        let target = target.map_or_else(|| self.active_target(), Ok)?;
        Ok(self.form_mut(target)?.undo()?)
    }

    pub fn redo_field_change(&mut self, target: Option<FormTarget>) -> Result<bool, EngineError> {
        let target = target.map_or_else(|| self.active_target(), Ok)?;
        Ok(self.form_mut(target)?.redo()?)
    }

    // ========================================================================
    // Unsaved-changes guard
    // ========================================================================

    /// Called before sort, filter and the like would throw drafts away.
    /// `false` means the user chose to keep editing and the caller should stop.
    pub fn check_unsaved_changes(&mut self) -> Result<bool, EngineError> {
        let defaults = self.schema.default_record();
        let dirty = self.session.has_unsaved_changes(&defaults)
            || self.overlays.has_unsaved_changes(&defaults);

        if dirty
            && self.settings.show_confirm_dialog
            && !self
                .dialog
                .confirm(&DialogRequest::confirm(UNSAVED_TITLE, UNSAVED_MESSAGE))
        {
            tracing::info!("unsaved changes kept; caller aborted");
            return Ok(false);
        }

        if dirty {
            tracing::info!("discarding unsaved drafts");
        }
        self.session.close();
        if self.session.standing().is_some() {
            let handle = self.session.arm_standing(defaults);
            self.deferred.push(Deferred::FormRendered(handle));
        }
        self.overlays.clear();
        Ok(true)
    }

    // ========================================================================
    // Overlays
    // ========================================================================

    /// Open a command-column edit overlay on `row_index`. Returns its key,
    /// or `None` if editing is off, the primary session owns the row, or a
    /// handler cancelled.
    pub fn begin_overlay_edit(&mut self, row_index: usize) -> Result<Option<RowUid>, EngineError> {
        if !self.settings.allow_editing {
            return Ok(None);
        }
        let rows = self.rows()?;
        let row = rows.get(row_index).ok_or(EngineError::RowOutOfRange {
            index: row_index,
            len: rows.len(),
        })?;

        if self.overlays.contains(row.uid) {
            tracing::debug!(row_index, "overlay already open");
            return Ok(Some(row.uid));
        }
        if self.session.target_uid() == Some(row.uid) {
            tracing::warn!(row_index, "overlay refused: row is in the primary session");
            return Ok(None);
        }

        let event = self.events.publish(EditEvent::RowEditBegin(RowEditBegin {
            row_index,
            data: row.record.clone(),
            cancel: false,
        }));
        if event.is_cancelled() {
            return Ok(None);
        }

        let overlay = RowOverlay::edit(row, row_index);
        let handle = overlay.form.form.clone();
        self.overlays.insert(overlay);
        self.deferred.push(Deferred::FormRendered(handle));
        Ok(Some(row.uid))
    }

    /// Open a command-column add overlay. Several may be open at once.
    pub fn begin_overlay_add(&mut self, index: Option<usize>) -> Result<Option<RowUid>, EngineError> {
        if !self.settings.allow_adding {
            return Ok(None);
        }
        let row_index = self.resolve_insert_index(index)?;
        let event = self.events.publish(EditEvent::RowAddBegin(RowAddBegin {
            data: self.schema.default_record(),
            row_index,
            cancel: false,
        }));
        let draft = match event {
            EditEvent::RowAddBegin(args) if !args.cancel => args.data,
            _ => return Ok(None),
        };

        let overlay = RowOverlay::add(row_index, draft);
        let uid = overlay.uid;
        let handle = overlay.form.form.clone();
        self.overlays.insert(overlay);
        self.deferred.push(Deferred::FormRendered(handle));
        Ok(Some(uid))
    }

    // ========================================================================
    // Deferred work
    // ========================================================================

    /// Run everything scheduled for after the current turn. Returns the number
    /// of tasks taken off the queue.
    pub fn run_deferred(&mut self) -> Result<usize, EngineError> {
        let mut processed = 0;
        while let Some(task) = self.deferred.pop() {
            processed += 1;
            match task {
                Deferred::FormRendered(handle) => {
                    let data = match self.form(handle.target) {
                        Ok(form) if form.form.id == handle.id => form.draft.clone(),
                        _ => {
                            tracing::debug!(form = %handle.id, "skipping form-rendered for closed form");
                            continue;
                        }
                    };
                    let row_index = handle.row_index;
                    self.events.publish(EditEvent::FormRendered(FormRendered {
                        form: handle,
                        data,
                        row_index,
                    }));
                }
                Deferred::RestoreFocus {
                    row_index,
                    col_index,
                } => {
                    if row_index >= self.gateway.row_count()? {
                        continue;
                    }
                    self.focus.set_focus(true);
                    self.focus.navigate_to_cell(row_index, col_index);
                    self.selection.select_row(row_index);
                }
            }
        }
        Ok(processed)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn rows(&self) -> Result<Vec<Row>, EngineError> {
        Ok(self.gateway.query()?)
    }

    /// Start and end of the rows currently in view.
    fn view_bounds(&self, len: usize) -> (usize, usize) {
        match self.settings.page_size {
            Some(page_size) => {
                let start = (self.current_page * page_size).min(len);
                (start, (start + page_size).min(len))
            }
            None => (0, len),
        }
    }

    /// Explicit index first, then the configured new-row position.
    fn resolve_insert_index(&self, explicit: Option<usize>) -> Result<usize, EngineError> {
        let len = self.gateway.row_count()?;
        if let Some(index) = explicit {
            return Ok(index.min(len));
        }
        let (start, end) = self.view_bounds(len);
        Ok(match self.settings.new_row_position {
            NewRowPosition::Top => start,
            NewRowPosition::Bottom => end,
        })
    }

    fn refresh_row_indexes(&mut self) -> Result<(), EngineError> {
        let rows = self.rows()?;
        self.session.reindex(&rows);
        self.overlays.reindex(&rows);
        Ok(())
    }

    fn schedule_focus(&mut self, row_index: usize) {
        let col_index = self.focus.focused_cell().map_or(0, |c| c.col_index);
        self.deferred.push(Deferred::RestoreFocus {
            row_index,
            col_index,
        });
    }

    fn alert(&mut self, message: &str) {
        self.dialog
            .confirm(&DialogRequest::alert(NO_RECORDS_TITLE, message));
    }
}
