use rowedit_core::{ids::RowUid, record::Record};

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub uid: RowUid,
    pub record: Record,
}

impl Row {
    pub fn new(record: Record) -> Self {
        Self {
            uid: RowUid::new(),
            record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// Insert new rows.
    Save,
    /// Replace the record of existing rows, matched by uid.
    Update,
    /// Remove rows, matched by uid.
    Delete,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    pub request_type: RequestType,
    pub rows: Vec<Row>,
    /// Insert position for `Save`. Ignored otherwise.
    pub index: Option<usize>,
}

impl MutationRequest {
    pub fn save(row: Row, index: Option<usize>) -> Self {
        Self {
            request_type: RequestType::Save,
            rows: vec![row],
            index,
        }
    }

    pub fn update(row: Row) -> Self {
        Self {
            request_type: RequestType::Update,
            rows: vec![row],
            index: None,
        }
    }

    pub fn delete(rows: Vec<Row>) -> Self {
        Self {
            request_type: RequestType::Delete,
            rows,
            index: None,
        }
    }

    pub fn is_batch(&self) -> bool {
        self.rows.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub affected: usize,
    /// Row position of the first inserted row, for `Save`.
    pub index: Option<usize>,
}

/// The data layer the edit engine commits into.
///
/// Stores keep rows in display order; `query` returns that order and the
/// indexes the engine works with are positions in it.
pub trait DataMutationGateway {
    fn execute(&mut self, request: &MutationRequest) -> Result<MutationResult, StorageError>;

    fn query(&self) -> Result<Vec<Row>, StorageError>;

    fn row_count(&self) -> Result<usize, StorageError> {
        Ok(self.query()?.len())
    }

    fn row_at(&self, index: usize) -> Result<Option<Row>, StorageError> {
        Ok(self.query()?.into_iter().nth(index))
    }
}
