use crate::config::ConfigError;
use crate::runner::RunnerError;
use animforge_scripts::EditError;
use std::path::PathBuf;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

/// Failures across the training pipeline, from configuration loading through
/// the final phase subprocess.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("configuration error")]
    Config(#[from] ConfigError),

    #[error("script edit failed")]
    Edit(#[from] EditError),

    #[error("framework structure validation failed: {0}")]
    Validation(String),

    #[error("required input file missing: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("data preprocessing failed: {0}")]
    Preprocess(String),

    #[error("{phase} training process exited with code {exit_code}: {stderr}")]
    Subprocess {
        phase: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("run called on a pipeline that was not initialized")]
    NotInitialized,

    #[error("subprocess execution failed")]
    Runner(#[from] RunnerError),

    #[error("i/o error")]
    Io(#[from] std::io::Error),

    #[error("serialization error")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
