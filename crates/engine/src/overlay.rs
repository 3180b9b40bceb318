use std::collections::BTreeMap;

use rowedit_core::{ids::RowUid, record::Record};
use rowedit_storage::Row;

use crate::session::{DraftForm, FormHandle, FormTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Edit,
    Add,
}

impl OverlayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Add => "add",
        }
    }
}

/// A per-row draft opened from a command column.
#[derive(Debug, Clone)]
pub struct RowOverlay {
    pub uid: RowUid,
    pub kind: OverlayKind,
    /// Current position of the edited row, or the insert position for adds.
    pub row_index: usize,
    pub form: DraftForm,
}

impl RowOverlay {
    pub(crate) fn edit(row: &Row, row_index: usize) -> Self {
        let handle = FormHandle::new(FormTarget::Overlay(row.uid), Some(row_index));
        Self {
            uid: row.uid,
            kind: OverlayKind::Edit,
            row_index,
            form: DraftForm::new(handle, Some(row.record.clone()), row.record.clone()),
        }
    }

    pub(crate) fn add(insert_index: usize, draft: Record) -> Self {
        let uid = RowUid::new();
        let handle = FormHandle::new(FormTarget::Overlay(uid), None);
        Self {
            uid,
            kind: OverlayKind::Add,
            row_index: insert_index,
            form: DraftForm::new(handle, None, draft),
        }
    }
}

/// Open overlays keyed by row uid. Only the controller mutates it.
#[derive(Debug, Clone, Default)]
pub struct OverlayRegistry {
    overlays: BTreeMap<RowUid, RowOverlay>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uid: RowUid) -> Option<&RowOverlay> {
        self.overlays.get(&uid)
    }

    pub(crate) fn get_mut(&mut self, uid: RowUid) -> Option<&mut RowOverlay> {
        self.overlays.get_mut(&uid)
    }

    pub fn contains(&self, uid: RowUid) -> bool {
        self.overlays.contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowOverlay> {
        self.overlays.values()
    }

    pub fn has_unsaved_changes(&self, defaults: &Record) -> bool {
        self.overlays.values().any(|o| o.form.is_modified(defaults))
    }

    /// Returns false, leaving the registry unchanged, if the uid already has an overlay.
    pub(crate) fn insert(&mut self, overlay: RowOverlay) -> bool {
        if self.overlays.contains_key(&overlay.uid) {
            return false;
        }
        self.overlays.insert(overlay.uid, overlay);
        true
    }

    pub(crate) fn remove(&mut self, uid: RowUid) -> Option<RowOverlay> {
        self.overlays.remove(&uid)
    }

    pub(crate) fn clear(&mut self) {
        self.overlays.clear();
    }

    /// Drop edit overlays whose row is gone and refresh the rest's positions.
    pub(crate) fn reindex(&mut self, rows: &[Row]) {
        self.overlays.retain(|uid, overlay| match overlay.kind {
            OverlayKind::Add => true,
            OverlayKind::Edit => match rows.iter().position(|r| r.uid == *uid) {
                Some(index) => {
                    overlay.row_index = index;
                    true
                }
                None => false,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_overlay_per_row() {
        let row = Row::new(Record::new().with("id", 1));
        let mut registry = OverlayRegistry::new();
        assert!(registry.insert(RowOverlay::edit(&row, 0)));
        assert!(!registry.insert(RowOverlay::edit(&row, 0)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reindex_drops_missing_rows_but_keeps_adds() {
        let a = Row::new(Record::new().with("id", 1));
        let b = Row::new(Record::new().with("id", 2));
        let mut registry = OverlayRegistry::new();
        registry.insert(RowOverlay::edit(&a, 0));
        registry.insert(RowOverlay::edit(&b, 1));
        let add = RowOverlay::add(0, Record::new());
        let add_uid = add.uid;
        registry.insert(add);

        registry.reindex(&[b.clone()]);
        assert!(!registry.contains(a.uid));
        assert_eq!(registry.get(b.uid).unwrap().row_index, 0);
        assert!(registry.contains(add_uid));
    }

    #[test]
    fn add_overlay_targets_itself() {
        let overlay = RowOverlay::add(2, Record::new());
        assert_eq!(overlay.form.form.target, FormTarget::Overlay(overlay.uid));
        assert!(overlay.form.is_add());
        assert_eq!(overlay.kind.as_str(), "add");
    }
}
