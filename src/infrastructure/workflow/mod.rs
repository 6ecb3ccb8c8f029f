//! Workflow engine implementations

mod batch_runner;
mod loader;
mod step_machine;

pub use batch_runner::BatchRunner;
pub use loader::{
    discover, load_file, load_paths, parse_definition, DocumentFormat, LoadError, LoadedWorkflows,
};
pub use step_machine::{StepMachine, StepMachineConfig};
