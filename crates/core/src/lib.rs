pub mod error;
pub mod field_value;
pub mod ids;
pub mod record;
pub mod schema;
pub mod settings;
pub mod validation;

pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use record::{FieldPath, Patch, Record};
pub use schema::{ColumnDef, GridSchema};
pub use settings::{EditSettings, NewRowPosition};
pub use validation::{FieldRule, ValidationErrors, ValidationRule};
