use std::collections::HashSet;

use rowedit_core::{ids::RowUid, record::Record};

use crate::error::StorageError;
use crate::traits::{DataMutationGateway, MutationRequest, MutationResult, RequestType, Row};

/// Vec-backed store. Requests are validated in full before anything is
/// applied, so a rejected request leaves the rows untouched.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<Row>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            rows: records.into_iter().map(Row::new).collect(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn position(&self, uid: RowUid) -> Option<usize> {
        self.rows.iter().position(|r| r.uid == uid)
    }

    fn require_existing(&self, rows: &[Row]) -> Result<(), StorageError> {
        for row in rows {
            if self.position(row.uid).is_none() {
                return Err(StorageError::NotFound(format!("row {}", row.uid)));
            }
        }
        Ok(())
    }
}

impl DataMutationGateway for MemoryStore {
    fn execute(&mut self, request: &MutationRequest) -> Result<MutationResult, StorageError> {
        match request.request_type {
            RequestType::Save => {
                for row in &request.rows {
                    if self.position(row.uid).is_some() {
                        return Err(StorageError::ConstraintViolation(format!(
                            "row {} already exists",
                            row.uid
                        )));
                    }
                }
                let index = request.index.unwrap_or(self.rows.len()).min(self.rows.len());
                for (offset, row) in request.rows.iter().enumerate() {
                    self.rows.insert(index + offset, row.clone());
                }
                Ok(MutationResult {
                    affected: request.rows.len(),
                    index: Some(index),
                })
            }
            RequestType::Update => {
                self.require_existing(&request.rows)?;
                for row in &request.rows {
                    if let Some(pos) = self.position(row.uid) {
                        self.rows[pos].record = row.record.clone();
                    }
                }
                Ok(MutationResult {
                    affected: request.rows.len(),
                    index: None,
                })
            }
            RequestType::Delete => {
                self.require_existing(&request.rows)?;
                let doomed: HashSet<RowUid> = request.rows.iter().map(|r| r.uid).collect();
                let before = self.rows.len();
                self.rows.retain(|r| !doomed.contains(&r.uid));
                Ok(MutationResult {
                    affected: before - self.rows.len(),
                    index: None,
                })
            }
        }
    }

    fn query(&self) -> Result<Vec<Row>, StorageError> {
        Ok(self.rows.clone())
    }

    fn row_count(&self) -> Result<usize, StorageError> {
        Ok(self.rows.len())
    }

    fn row_at(&self, index: usize) -> Result<Option<Row>, StorageError> {
        Ok(self.rows.get(index).cloned())
    }
}
