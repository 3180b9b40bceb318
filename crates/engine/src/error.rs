use rowedit_core::CoreError;
use rowedit_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("no active edit session")]
    NoActiveSession,

    #[error("overlay not found: {0}")]
    OverlayNotFound(String),

    #[error("row {index} out of range ({len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("column is not editable: {0}")]
    ColumnNotEditable(String),

    #[error("form is no longer open: {0}")]
    FormClosed(String),
}
