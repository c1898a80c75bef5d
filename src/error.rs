use serde::Serialize;

use crate::gateway::AnalysisError;
use crate::storyboard::{ShotId, WorkflowStage};

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("Story could not be parsed into a blueprint: {0}")]
    Parse(String),
    #[error("Operation {operation} is not available in the {stage} stage")]
    InvalidStage {
        operation: &'static str,
        stage: &'static str,
    },
    #[error("No shot {0} in the current blueprint")]
    UnknownShot(ShotId),
    #[error("No character named {0} in the current blueprint")]
    UnknownCharacter(String),
}

impl StudioError {
    pub fn invalid_stage(operation: &'static str, stage: WorkflowStage) -> Self {
        StudioError::InvalidStage {
            operation,
            stage: stage.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Error,
    DemoMode,
}

/// The last user-facing message an orchestrator wants shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn demo_mode(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::DemoMode,
            message: message.into(),
        }
    }
}
