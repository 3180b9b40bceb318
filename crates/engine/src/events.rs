//! Typed lifecycle events and the bus that delivers them to host code.
//!
//! The controller is the only publisher. Cancellable payloads carry a
//! `cancel` flag; handlers run synchronously and the controller reads the
//! flag back from the returned event before it continues.

use rowedit_core::record::Record;

use crate::session::FormHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    Add,
    Edit,
    Delete,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowEditBegin {
    pub row_index: usize,
    pub data: Record,
    pub cancel: bool,
}

/// `data` seeds the add draft; handlers may adjust it.
#[derive(Debug, Clone, PartialEq)]
pub struct RowAddBegin {
    pub data: Record,
    pub row_index: usize,
    pub cancel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveBegin {
    pub action: EditAction,
    pub data: Record,
    pub previous_data: Option<Record>,
    pub row_index: usize,
    pub cancel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveComplete {
    pub action: EditAction,
    pub data: Record,
    pub previous_data: Option<Record>,
    pub row_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteBegin {
    pub action: EditAction,
    pub data: Vec<Record>,
    pub cancel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteComplete {
    pub action: EditAction,
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelEdit {
    pub data: Record,
    pub row_index: Option<usize>,
    pub form: FormHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormRendered {
    pub form: FormHandle,
    pub data: Record,
    pub row_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationError {
    pub action: EditAction,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RowEditBegin,
    RowAddBegin,
    SaveBegin,
    SaveComplete,
    DeleteBegin,
    DeleteComplete,
    Cancel,
    FormRendered,
    MutationError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RowEditBegin => "row-edit-begin",
            Self::RowAddBegin => "row-add-begin",
            Self::SaveBegin => "save-begin",
            Self::SaveComplete => "save-complete",
            Self::DeleteBegin => "delete-begin",
            Self::DeleteComplete => "delete-complete",
            Self::Cancel => "cancel",
            Self::FormRendered => "form-rendered",
            Self::MutationError => "mutation-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditEvent {
    RowEditBegin(RowEditBegin),
    RowAddBegin(RowAddBegin),
    SaveBegin(SaveBegin),
    SaveComplete(SaveComplete),
    DeleteBegin(DeleteBegin),
    DeleteComplete(DeleteComplete),
    Cancel(CancelEdit),
    FormRendered(FormRendered),
    MutationError(MutationError),
}

impl EditEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RowEditBegin(_) => EventKind::RowEditBegin,
            Self::RowAddBegin(_) => EventKind::RowAddBegin,
            Self::SaveBegin(_) => EventKind::SaveBegin,
            Self::SaveComplete(_) => EventKind::SaveComplete,
            Self::DeleteBegin(_) => EventKind::DeleteBegin,
            Self::DeleteComplete(_) => EventKind::DeleteComplete,
            Self::Cancel(_) => EventKind::Cancel,
            Self::FormRendered(_) => EventKind::FormRendered,
            Self::MutationError(_) => EventKind::MutationError,
        }
    }

    /// True if a handler cancelled a cancellable event.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::RowEditBegin(e) => e.cancel,
            Self::RowAddBegin(e) => e.cancel,
            Self::SaveBegin(e) => e.cancel,
            Self::DeleteBegin(e) => e.cancel,
            _ => false,
        }
    }

    /// Set the cancel flag. No effect on notifications.
    pub fn cancel(&mut self) {
        match self {
            Self::RowEditBegin(e) => e.cancel = true,
            Self::RowAddBegin(e) => e.cancel = true,
            Self::SaveBegin(e) => e.cancel = true,
            Self::DeleteBegin(e) => e.cancel = true,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&mut EditEvent)>;

#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(SubscriptionId, Handler)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut EditEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run every handler in subscription order and hand the event back.
    pub fn publish(&mut self, mut event: EditEvent) -> EditEvent {
        tracing::trace!(event = event.kind().as_str(), "publishing");
        for (_, handler) in &mut self.handlers {
            handler(&mut event);
        }
        event
    }
}
