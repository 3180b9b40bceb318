mod doubles;
mod grid;

pub use doubles::{EventRecorder, ManualSelection, RecordingFocus, ScriptedDialog, ScriptedGateway};
pub use grid::{TestGrid, init_test_logging, people, people_schema};
