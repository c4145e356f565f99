use std::path::PathBuf;
use thiserror::Error;

pub type EditResult<T> = std::result::Result<T, EditError>;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("script file not found: {0}")]
    NotFound(PathBuf),

    #[error("variable '{name}' not found in script")]
    Missing { name: String },

    #[error("multiple assignments with different values for '{name}': '{first}' and '{second}'")]
    Ambiguous { name: String, first: String, second: String },

    #[error("no backup exists for {0}")]
    NoBackup(PathBuf),

    #[error("invalid script source in {path}: {reason}")]
    InvalidSource { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
