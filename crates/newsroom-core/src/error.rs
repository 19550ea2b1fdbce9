use std::path::PathBuf;

use thiserror::Error;

/// Core error type for Newsroom.
#[derive(Debug, Error)]
pub enum NewsroomError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("stage '{stage}' failed: {reason}")]
    StageExecution { stage: String, reason: String },
    #[error("I/O error while writing {}: {source}", path.display())]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NewsroomError {
    pub fn artifact_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ArtifactIo { path, source }
    }

    pub fn stage_execution(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StageExecution {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}
