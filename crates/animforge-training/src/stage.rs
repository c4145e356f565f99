//! Collaborators that prepare data before and between the phases.
//!
//! The pipeline treats both as opaque: preprocessing filters and exports the
//! raw dataset, the motion processor produces the feature files the
//! controller phase stages into its data directory.

use crate::runner::SubprocessRunner;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filters the raw dataset and exports the binary velocity files the encoder
/// phase trains on. Runs once per experiment, before the first phase.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    async fn run(&self, dataset_path: &Path) -> anyhow::Result<()>;
}

/// Produces the motion feature files consumed by the controller phase.
#[async_trait]
pub trait MotionProcessor: Send + Sync {
    async fn input_preprocessing(&self) -> anyhow::Result<()>;
    async fn output_preprocessing(&self) -> anyhow::Result<()>;
    async fn export_data(&self) -> anyhow::Result<()>;

    /// Directory the exported feature files land in.
    fn export_dir(&self) -> PathBuf;
}

/// Preprocessing backed by an external script, invoked with the dataset
/// directory as its single argument.
pub struct ScriptPreprocessor {
    script: PathBuf,
    interpreter: String,
    runner: SubprocessRunner,
}

impl ScriptPreprocessor {
    #[must_use]
    pub fn new(script: PathBuf, interpreter: String) -> Self {
        Self { script, interpreter, runner: SubprocessRunner::new() }
    }
}

#[async_trait]
impl Preprocessor for ScriptPreprocessor {
    async fn run(&self, dataset_path: &Path) -> anyhow::Result<()> {
        let script = self.script.to_string_lossy().into_owned();
        let dataset = dataset_path.to_string_lossy().into_owned();
        let cwd = self
            .script
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let outcome = self
            .runner
            .run(
                &self.interpreter,
                &["-u", &script, &dataset],
                &cwd,
                "preprocess",
                &HashMap::new(),
                |line, name| debug!(process = %name, "{line}"),
            )
            .await?;
        if !outcome.success() {
            anyhow::bail!(
                "preprocessing script exited with code {}: {}",
                outcome.exit_code,
                outcome.stderr.trim()
            );
        }
        Ok(())
    }
}

/// No-op preprocessing for datasets that were filtered and exported ahead of
/// time.
pub struct NullPreprocessor;

#[async_trait]
impl Preprocessor for NullPreprocessor {
    async fn run(&self, dataset_path: &Path) -> anyhow::Result<()> {
        debug!(dataset = %dataset_path.display(), "dataset preprocessed externally, skipping");
        Ok(())
    }
}

/// Motion features already exported to `<dataset>/processed` by an external
/// pipeline. The processing hooks are no-ops; only the export directory
/// matters.
pub struct PrestagedMotionData {
    export_dir: PathBuf,
}

impl PrestagedMotionData {
    #[must_use]
    pub fn new(dataset_path: &Path) -> Self {
        Self { export_dir: dataset_path.join("processed") }
    }

    #[must_use]
    pub fn at(export_dir: PathBuf) -> Self {
        Self { export_dir }
    }
}

#[async_trait]
impl MotionProcessor for PrestagedMotionData {
    async fn input_preprocessing(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn output_preprocessing(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn export_data(&self) -> anyhow::Result<()> {
        debug!(dir = %self.export_dir.display(), "using prestaged motion export");
        Ok(())
    }

    fn export_dir(&self) -> PathBuf {
        self.export_dir.clone()
    }
}
