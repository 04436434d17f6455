pub mod assembler;
pub mod extractor;
pub mod orchestrator;
pub mod reorder;
pub mod summary;

pub use orchestrator::{CancelFlag, Orchestrator};
