pub mod model;
pub mod orchestrator;

pub use model::{StudioMode, StyleAttributes, VariantOutcome, VariantResult};
pub use orchestrator::{StudioOrchestrator, StudioState};
