//! Records, field paths, and copy-on-write patches.
//!
//! A [`Record`] is never edited in place by the session engine. Every change
//! is expressed as a [`Patch`] and applied with [`Record::apply`], which
//! returns a new record and leaves the source untouched. That keeps the
//! snapshot taken when an edit begins valid as a rollback target.
//!
//! Top-level values are shared between a record and the records patched from
//! it; a patch deep-clones only the branch it writes under.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field_value::FieldValue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Arc<FieldValue>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), Arc::new(value.into()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields
            .insert(key.into(), Arc::new(value))
            .map(Arc::unwrap_or_clone)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key).map(Arc::as_ref)
    }

    pub fn get_path(&self, path: &FieldPath) -> Option<&FieldValue> {
        let (head, rest) = path.segments.split_first()?;
        let mut current: &FieldValue = self.fields.get(head)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up a dotted path. Malformed paths resolve to `None`.
    pub fn lookup(&self, dotted: &str) -> Option<&FieldValue> {
        let path = FieldPath::parse(dotted).ok()?;
        self.get_path(&path)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key, value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Apply a patch, producing a new record.
    pub fn apply(&self, patch: &Patch) -> Result<Record, CoreError> {
        let path = &patch.path;
        let Some((head, rest)) = path.segments.split_first() else {
            return Err(CoreError::InvalidPath(path.to_string()));
        };

        let mut next = self.clone();
        if rest.is_empty() {
            match &patch.value {
                Some(v) => {
                    next.fields.insert(head.clone(), Arc::new(v.clone()));
                }
                None => {
                    next.fields.remove(head);
                }
            }
            return Ok(next);
        }

        if patch.value.is_none() && !next.fields.contains_key(head) {
            return Ok(next);
        }

        let entry = next
            .fields
            .entry(head.clone())
            .or_insert_with(|| Arc::new(FieldValue::Object(BTreeMap::new())));
        // Still shared with `self`, so this clones the branch.
        let branch = Arc::make_mut(entry);
        if branch.is_null() {
            *branch = FieldValue::Object(BTreeMap::new());
        }
        match branch {
            FieldValue::Object(child) => write_path(child, rest, patch.value.clone(), path)?,
            other => {
                return Err(CoreError::InvalidPath(format!(
                    "{path}: segment '{head}' holds {other}, not an object"
                )));
            }
        }
        Ok(next)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(key, value)| (key, Arc::new(value))).collect(),
        }
    }
}

fn write_path(
    map: &mut BTreeMap<String, FieldValue>,
    segments: &[String],
    value: Option<FieldValue>,
    full: &FieldPath,
) -> Result<(), CoreError> {
    let Some((head, rest)) = segments.split_first() else {
        return Err(CoreError::InvalidPath(full.to_string()));
    };

    if rest.is_empty() {
        match value {
            Some(v) => {
                map.insert(head.clone(), v);
            }
            None => {
                map.remove(head);
            }
        }
        return Ok(());
    }

    // Clearing below a branch that doesn't exist is already done.
    if value.is_none() && !map.contains_key(head) {
        return Ok(());
    }

    let entry = map
        .entry(head.clone())
        .or_insert_with(|| FieldValue::Object(BTreeMap::new()));
    if entry.is_null() {
        *entry = FieldValue::Object(BTreeMap::new());
    }
    match entry {
        FieldValue::Object(child) => write_path(child, rest, value, full),
        other => Err(CoreError::InvalidPath(format!(
            "{full}: segment '{head}' holds {other}, not an object"
        ))),
    }
}

/// A dotted path into a record, e.g. `address.city`. Always has at least one
/// non-blank segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFieldPath")]
pub struct FieldPath {
    segments: Vec<String>,
}

#[derive(Deserialize)]
struct RawFieldPath {
    segments: Vec<String>,
}

impl TryFrom<RawFieldPath> for FieldPath {
    type Error = CoreError;

    fn try_from(raw: RawFieldPath) -> Result<Self, Self::Error> {
        Self::from_segments(raw.segments)
    }
}

impl FieldPath {
    pub fn parse(dotted: &str) -> Result<Self, CoreError> {
        Self::from_segments(dotted.split('.').map(str::to_string).collect())
    }

    fn from_segments(segments: Vec<String>) -> Result<Self, CoreError> {
        if segments.is_empty() || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(CoreError::InvalidPath(segments.join(".")));
        }
        Ok(Self { segments })
    }

    /// Top-level field this path writes under.
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A single field write. `value: None` removes the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub path: FieldPath,
    pub value: Option<FieldValue>,
}

impl Patch {
    pub fn set(dotted: &str, value: FieldValue) -> Result<Self, CoreError> {
        Ok(Self {
            path: FieldPath::parse(dotted)?,
            value: Some(value),
        })
    }

    pub fn clear(dotted: &str) -> Result<Self, CoreError> {
        Ok(Self {
            path: FieldPath::parse(dotted)?,
            value: None,
        })
    }

    /// The patch that undoes `self` when applied to the result of applying
    /// `self` to `before`.
    pub fn inverse_against(&self, before: &Record) -> Patch {
        Patch {
            path: self.path.clone(),
            value: before.get_path(&self.path).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Record {
        let mut address = BTreeMap::new();
        address.insert("city".to_string(), FieldValue::Text("Oslo".into()));
        address.insert("zip".to_string(), FieldValue::Text("0150".into()));
        Record::new()
            .with("id", 1)
            .with("name", "Ada")
            .with("address", FieldValue::Object(address))
    }

    #[test]
    fn apply_leaves_source_untouched() {
        let original = customer();
        let patch = Patch::set("name", "Grace".into()).unwrap();
        let draft = original.apply(&patch).unwrap();

        assert_eq!(original.get("name"), Some(&FieldValue::Text("Ada".into())));
        assert_eq!(draft.get("name"), Some(&FieldValue::Text("Grace".into())));
    }

    #[test]
    fn nested_write_only_touches_branch() {
        let original = customer();
        let draft = original
            .apply(&Patch::set("address.city", "Bergen".into()).unwrap())
            .unwrap();

        assert_eq!(draft.lookup("address.city"), Some(&FieldValue::Text("Bergen".into())));
        assert_eq!(draft.lookup("address.zip"), Some(&FieldValue::Text("0150".into())));
        assert_eq!(original.lookup("address.city"), Some(&FieldValue::Text("Oslo".into())));
        assert_eq!(draft.get("name"), original.get("name"));
    }

    #[test]
    fn nested_write_shares_untouched_fields() {
        let original = customer();
        let draft = original
            .apply(&Patch::set("address.city", "Bergen".into()).unwrap())
            .unwrap();

        assert!(Arc::ptr_eq(&original.fields["name"], &draft.fields["name"]));
        assert!(Arc::ptr_eq(&original.fields["id"], &draft.fields["id"]));
        assert!(!Arc::ptr_eq(&original.fields["address"], &draft.fields["address"]));
    }

    #[test]
    fn nested_write_creates_missing_branches() {
        let draft = Record::new()
            .apply(&Patch::set("meta.tags.primary", "x".into()).unwrap())
            .unwrap();
        assert_eq!(draft.lookup("meta.tags.primary"), Some(&FieldValue::Text("x".into())));
    }

    #[test]
    fn write_through_scalar_is_rejected() {
        let err = customer()
            .apply(&Patch::set("name.first", "A".into()).unwrap())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath(_)));
    }

    #[test]
    fn malformed_paths() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse(".a").is_err());
        assert_eq!(FieldPath::parse("a.b").unwrap().root(), "a");
    }

    #[test]
    fn empty_path_is_rejected_on_decode() {
        #[derive(Serialize)]
        struct Segments {
            segments: Vec<String>,
        }

        let empty = rmp_serde::to_vec(&Segments { segments: vec![] }).unwrap();
        assert!(rmp_serde::from_slice::<FieldPath>(&empty).is_err());

        let valid = rmp_serde::to_vec(&FieldPath::parse("address.city").unwrap()).unwrap();
        let decoded: FieldPath = rmp_serde::from_slice(&valid).unwrap();
        assert_eq!(decoded.root(), "address");
    }

    #[test]
    fn inverse_restores_previous_state() {
        let before = customer();
        let patch = Patch::set("nickname", "Countess".into()).unwrap();
        let after = before.apply(&patch).unwrap();
        let inverse = patch.inverse_against(&before);
        assert_eq!(inverse.value, None);
        assert_eq!(after.apply(&inverse).unwrap(), before);
    }

    #[test]
    fn msgpack_roundtrip() {
        let record = customer();
        let bytes = record.to_msgpack().unwrap();
        assert_eq!(Record::from_msgpack(&bytes).unwrap(), record);
    }
}
