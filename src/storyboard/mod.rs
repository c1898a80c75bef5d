pub mod model;
pub mod orchestrator;
pub mod shots;

pub use model::{
    derive_character_profiles, Beat, Blueprint, CastRef, CharacterProfile, Scene, Shot,
    ShotUpdate, WorkflowStage,
};
pub use orchestrator::{BatchReport, StoryboardOrchestrator, StoryboardState};
pub use shots::{flatten_shots, ShotGenerationState, ShotId, ShotStatus};
