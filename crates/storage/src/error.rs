use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("checksum mismatch for row {uid}")]
    ChecksumMismatch { uid: String },

    #[error("store rejected request: {0}")]
    Rejected(String),

    #[error("core error: {0}")]
    Core(#[from] rowedit_core::CoreError),
}
