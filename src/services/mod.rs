//! Services
//!
//! Turn orchestration and the pieces it is built from.
//! Services are called by the HTTP commands.

pub mod orchestrator;
pub mod prompt;
pub mod streaming;
pub mod tools;

pub use orchestrator::{OrchestratorConfig, OrchestratorService, Stores, TurnOutcome};
pub use prompt::PromptAssembler;
pub use streaming::StreamEmitter;
