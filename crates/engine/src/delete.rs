//! Deleting by selection or by explicit payload.

use std::collections::BTreeMap;

use rowedit_core::{field_value::FieldValue, record::Record};
use rowedit_storage::{DataMutationGateway, MutationRequest, Row};

use crate::collaborators::DialogRequest;
use crate::error::EngineError;
use crate::events::{DeleteBegin, DeleteComplete, EditAction, EditEvent};
use crate::EditSessionController;

const NO_RECORDS_FOR_DELETE: &str = "No records selected for delete operation";
const DELETE_TITLE: &str = "Delete records";
const DELETE_MESSAGE: &str = "Are you sure you want to delete the selected record(s)?";

/// One element of an explicit delete payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteItem {
    /// A full record. Matched by its key value, or by equality when it has none.
    Record(Record),
    /// A key value, matched against the key field.
    Key(FieldValue),
}

impl From<Record> for DeleteItem {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<FieldValue> for DeleteItem {
    fn from(value: FieldValue) -> Self {
        Self::Key(value)
    }
}

/// Resolve payload items to rows, keyed by current index. Every row whose key
/// matches is taken; duplicates collapse.
fn resolve_items(rows: &[Row], key_field: Option<&str>, items: Vec<DeleteItem>) -> BTreeMap<usize, Row> {
    let mut targets = BTreeMap::new();
    for item in items {
        let matches = |row: &Row| match (&item, key_field) {
            (DeleteItem::Key(key), Some(field)) => row.record.lookup(field) == Some(key),
            (DeleteItem::Key(_), None) => false,
            (DeleteItem::Record(record), Some(field)) => match record.lookup(field) {
                Some(key) => row.record.lookup(field) == Some(key),
                None => &row.record == record,
            },
            (DeleteItem::Record(record), None) => &row.record == record,
        };
        let mut matched = false;
        for (index, row) in rows.iter().enumerate() {
            if matches(row) {
                matched = true;
                targets.entry(index).or_insert_with(|| row.clone());
            }
        }
        if !matched {
            tracing::debug!(?item, "delete item matched no row");
        }
    }
    targets
}

impl<G: DataMutationGateway> EditSessionController<G> {
    /// Delete `payload`, or the current selection when there is none.
    /// `key_field` overrides the schema primary key for matching.
    pub fn delete_records(
        &mut self,
        key_field: Option<&str>,
        payload: Option<Vec<DeleteItem>>,
    ) -> Result<bool, EngineError> {
        if !self.settings.allow_deleting {
            tracing::debug!("delete ignored: deleting disabled");
            return Ok(false);
        }

        let rows = self.rows()?;
        let targets = match payload {
            Some(items) => {
                let key_field = key_field.or(self.schema.primary_key());
                let targets = resolve_items(&rows, key_field, items);
                if targets.is_empty() {
                    tracing::debug!("delete payload matched no rows");
                    return Ok(false);
                }
                targets
            }
            None => {
                let targets: BTreeMap<usize, Row> = self
                    .selection
                    .selected_indexes()
                    .into_iter()
                    .filter_map(|i| rows.get(i).map(|row| (i, row.clone())))
                    .collect();
                if targets.is_empty() {
                    self.alert(NO_RECORDS_FOR_DELETE);
                    return Ok(false);
                }
                targets
            }
        };

        self.delete_targets(targets)
    }

    /// Delete the row at `index` without going through the selection.
    /// The row is taken by identity, never re-resolved by key.
    pub fn delete_row(&mut self, index: usize) -> Result<bool, EngineError> {
        if !self.settings.allow_deleting {
            tracing::debug!("delete ignored: deleting disabled");
            return Ok(false);
        }
        let rows = self.rows()?;
        let row = rows.get(index).ok_or(EngineError::RowOutOfRange {
            index,
            len: rows.len(),
        })?;
        let targets = BTreeMap::from([(index, row.clone())]);
        self.delete_targets(targets)
    }

    /// Confirm, announce, and remove already-resolved rows.
    fn delete_targets(&mut self, targets: BTreeMap<usize, Row>) -> Result<bool, EngineError> {
        if self.settings.show_delete_confirm_dialog
            && !self
                .dialog
                .confirm(&DialogRequest::confirm(DELETE_TITLE, DELETE_MESSAGE))
        {
            tracing::info!(count = targets.len(), "delete declined");
            return Ok(false);
        }

        let records: Vec<Record> = targets.values().map(|row| row.record.clone()).collect();
        let begin = self.events.publish(EditEvent::DeleteBegin(DeleteBegin {
            action: EditAction::Delete,
            data: records.clone(),
            cancel: false,
        }));
        if begin.is_cancelled() {
            tracing::debug!("delete-begin cancelled by handler");
            return Ok(false);
        }

        let request = MutationRequest::delete(targets.values().cloned().collect());
        if let Err(err) = self.gateway.execute(&request) {
            self.report_mutation_error(EditAction::Delete, &err);
            return Ok(false);
        }

        let count = targets.len();
        let last_index = targets.keys().next_back().copied().unwrap_or_default();
        if self
            .session
            .target_uid()
            .is_some_and(|uid| targets.values().any(|row| row.uid == uid))
        {
            tracing::debug!("closing edit session on deleted row");
            self.session.close();
        }
        // Edit overlays on deleted rows drop out here.
        self.refresh_row_indexes()?;

        let remaining = self.gateway.row_count()?;
        if let Some(page_size) = self.settings.page_size {
            let last_page = remaining.saturating_sub(1) / page_size;
            if self.current_page > last_page {
                tracing::debug!(from = self.current_page, to = last_page, "page emptied; moving back");
                self.current_page = last_page;
            }
        }

        tracing::info!(count, "records deleted");
        self.events.publish(EditEvent::DeleteComplete(DeleteComplete {
            action: EditAction::Delete,
            data: records,
        }));

        if remaining > 0 {
            let focus_row = (last_index + 1 - count).min(remaining - 1);
            self.schedule_focus(focus_row);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row> {
        (1..=4)
            .map(|id| Row::new(Record::new().with("id", id).with("name", format!("row {id}"))))
            .collect()
    }

    #[test]
    fn keys_resolve_in_index_order_without_duplicates() {
        let rows = rows();
        let items = vec![
            DeleteItem::Key(FieldValue::from(3)),
            DeleteItem::Key(FieldValue::from(1)),
            DeleteItem::Key(FieldValue::from(3)),
        ];
        let targets = resolve_items(&rows, Some("id"), items);
        assert_eq!(targets.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn record_items_match_by_key_value() {
        let rows = rows();
        let stale = Record::new().with("id", 2).with("name", "renamed");
        let targets = resolve_items(&rows, Some("id"), vec![stale.into()]);
        assert_eq!(targets.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn record_without_key_matches_by_equality() {
        let rows = rows();
        let exact = rows[3].record.clone();
        let targets = resolve_items(&rows, None, vec![exact.into()]);
        assert_eq!(targets.keys().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn keys_without_key_field_match_nothing() {
        let rows = rows();
        let targets = resolve_items(&rows, None, vec![FieldValue::from(1).into()]);
        assert!(targets.is_empty());
    }

    #[test]
    fn a_key_takes_every_matching_row() {
        let mut rows = rows();
        rows.push(Row::new(Record::new().with("id", 2).with("name", "copy")));
        let targets = resolve_items(&rows, Some("id"), vec![FieldValue::from(2).into()]);
        assert_eq!(targets.keys().copied().collect::<Vec<_>>(), vec![1, 4]);
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let rows = rows();
        let items = vec![FieldValue::from(9).into(), FieldValue::from(4).into()];
        let targets = resolve_items(&rows, Some("id"), items);
        assert_eq!(targets.keys().copied().collect::<Vec<_>>(), vec![3]);
    }
}
