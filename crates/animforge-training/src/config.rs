//! Training run configuration, loaded from a JSON file.

use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything a training run needs: where the data and the third-party
/// training framework live, how long each phase trains, and which
/// hyperparameter overrides to patch into the entry scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Directory holding the motion dataset and its manifest files.
    pub dataset_path: PathBuf,
    /// Root of the third-party training framework checkout.
    pub framework_path: PathBuf,
    /// Epochs for the encoder (PAE) phase.
    pub pae_epochs: u32,
    /// Epochs for the controller (GNN) phase.
    pub gnn_epochs: u32,
    /// Learning rate override, patched into both entry scripts when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    /// Dropout override, patched into both entry scripts when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropout: Option<f64>,
    /// Where to move training artifacts after a successful run. Preservation
    /// is skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_dir: Option<PathBuf>,
    /// Interpreter used to launch the entry scripts.
    #[serde(default = "default_python")]
    pub python_executable: String,
    /// Script run once before the first phase to filter and export the
    /// dataset. Preprocessing is skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocess_script: Option<PathBuf>,
}

fn default_python() -> String {
    "python3".to_string()
}

impl TrainingConfig {
    #[must_use]
    pub fn epochs_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Pae => self.pae_epochs,
            Phase::Gnn => self.gnn_epochs,
        }
    }

    /// Range and path checks beyond what deserialization enforces. Returns
    /// the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if !self.dataset_path.is_dir() {
            return Err(format!(
                "dataset_path is not a directory: {}",
                self.dataset_path.display()
            ));
        }
        if !self.framework_path.is_dir() {
            return Err(format!(
                "framework_path is not a directory: {}",
                self.framework_path.display()
            ));
        }
        if self.pae_epochs == 0 {
            return Err("pae_epochs must be at least 1".to_string());
        }
        if self.gnn_epochs == 0 {
            return Err("gnn_epochs must be at least 1".to_string());
        }
        if let Some(lr) = self.learning_rate {
            if !lr.is_finite() || lr <= 0.0 {
                return Err(format!("learning_rate must be a positive number, got {lr}"));
            }
        }
        if let Some(dropout) = self.dropout {
            if !dropout.is_finite() || !(0.0..=1.0).contains(&dropout) {
                return Err(format!("dropout must be in [0, 1], got {dropout}"));
            }
        }
        if let Some(script) = &self.preprocess_script {
            if !script.is_file() {
                return Err(format!(
                    "preprocess_script does not exist: {}",
                    script.display()
                ));
            }
        }
        if self.python_executable.trim().is_empty() {
            return Err("python_executable must not be empty".to_string());
        }
        Ok(())
    }
}

/// Configuration loading failures, split by what went wrong: the file itself,
/// its syntax, its shape, or its values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("configuration file is not valid JSON")]
    Malformed(#[source] serde_json::Error),

    #[error("configuration has missing or mistyped fields")]
    Structure(#[source] serde_json::Error),

    #[error("invalid configuration value: {0}")]
    Invalid(String),

    #[error("failed to read configuration file")]
    Io(#[from] std::io::Error),
}

/// Load and validate a [`TrainingConfig`] from a JSON file.
///
/// Syntax errors and shape errors are reported separately so the caller can
/// tell a truncated file from a missing field.
pub fn load_config(path: &Path) -> Result<TrainingConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Io(e)
        }
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(ConfigError::Malformed)?;
    let config: TrainingConfig =
        serde_json::from_value(value).map_err(ConfigError::Structure)?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}
