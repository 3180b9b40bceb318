use std::path::Path;

use rowedit_core::{
    field_value::FieldValue,
    record::Record,
    schema::{ColumnDef, GridSchema},
    settings::EditSettings,
    validation::ValidationRule,
};
use rowedit_engine::{Collaborators, EditSessionController};
use rowedit_storage::{DataMutationGateway, MemoryStore, Row, SqliteStore, StorageError};

use crate::doubles::{EventRecorder, ManualSelection, RecordingFocus, ScriptedDialog, ScriptedGateway};

/// Route `tracing` output through the test writer. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// id (key), name, age, email, status.
pub fn people_schema() -> GridSchema {
    GridSchema::new(vec![
        ColumnDef::new("id")
            .header("ID")
            .primary_key()
            .rule(ValidationRule::Required),
        ColumnDef::new("name")
            .header("Name")
            .rule(ValidationRule::Required),
        ColumnDef::new("age")
            .header("Age")
            .rule(ValidationRule::Range {
                min: 0.0,
                max: 150.0,
            }),
        ColumnDef::new("email").header("Email").rule(ValidationRule::Email),
        ColumnDef::new("status")
            .header("Status")
            .default_value("active")
            .rule(ValidationRule::OneOf(vec!["active".into(), "inactive".into()])),
    ])
}

pub fn people() -> Vec<Record> {
    [(1, "Ada", 36), (2, "Grace", 45), (3, "Linus", 28)]
        .into_iter()
        .map(|(id, name, age)| {
            Record::new()
                .with("id", id)
                .with("name", name)
                .with("age", age)
                .with("status", "active")
        })
        .collect()
}

/// A controller wired to recording doubles over a store seeded with [`people`].
pub struct TestGrid<S: DataMutationGateway = MemoryStore> {
    pub controller: EditSessionController<ScriptedGateway<S>>,
    pub dialog: ScriptedDialog,
    pub focus: RecordingFocus,
    pub selection: ManualSelection,
    pub events: EventRecorder,
}

impl TestGrid<MemoryStore> {
    pub fn new() -> Self {
        Self::with_settings(EditSettings::default())
    }

    pub fn with_settings(settings: EditSettings) -> Self {
        Self::build(people_schema(), settings, MemoryStore::from_records(people()))
    }
}

impl Default for TestGrid<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl TestGrid<SqliteStore> {
    /// Same fixture over a SQLite file at `path`.
    pub fn sqlite(path: &Path, settings: EditSettings) -> Result<Self, StorageError> {
        let mut store = SqliteStore::open(path)?;
        store.seed(people())?;
        Ok(Self::build(people_schema(), settings, store))
    }
}

impl<S: DataMutationGateway> TestGrid<S> {
    pub fn build(schema: GridSchema, settings: EditSettings, store: S) -> Self {
        init_test_logging();
        let dialog = ScriptedDialog::new();
        let focus = RecordingFocus::new();
        let selection = ManualSelection::new();
        let collaborators = Collaborators {
            dialog: Box::new(dialog.clone()),
            focus: Box::new(focus.clone()),
            selection: Box::new(selection.clone()),
        };
        let mut controller =
            EditSessionController::new(schema, settings, ScriptedGateway::new(store), collaborators);
        let events = EventRecorder::attach(&mut controller);
        Self {
            controller,
            dialog,
            focus,
            selection,
            events,
        }
    }

    pub fn rows(&self) -> Result<Vec<Row>, StorageError> {
        self.controller.gateway().query()
    }

    /// The `id` column in row order.
    pub fn ids(&self) -> Result<Vec<i64>, StorageError> {
        Ok(self
            .rows()?
            .iter()
            .filter_map(|row| row.record.get("id").and_then(FieldValue::as_integer))
            .collect())
    }

    pub fn mutation_calls(&self) -> usize {
        self.controller.gateway().calls()
    }
}
