//! Experiment lifecycle: init, run, preserve, cleanup.

use crate::config::TrainingConfig;
use crate::error::{TrainingError, TrainingResult};
use crate::phase::Phase;
use crate::phases::{init_phase, reset_phase, run_phase, validate_structure};
use crate::runner::SubprocessRunner;
use crate::stage::{MotionProcessor, Preprocessor};
use animforge_tracker::Tracker;
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// One training experiment from setup to teardown.
///
/// `cleanup` must be safe to call in any state, including after a failed or
/// skipped `init`, because the entry point calls it unconditionally.
#[async_trait]
pub trait Experiment: Send {
    async fn init(&mut self) -> TrainingResult<()>;
    async fn run(&mut self) -> TrainingResult<()>;
    async fn preserve(&self);
    async fn cleanup(&self);
}

/// The standard two-phase pipeline: preprocess once, then encoder, then
/// controller.
pub struct PhasePipeline {
    config: TrainingConfig,
    tracker: Arc<Tracker>,
    runner: SubprocessRunner,
    preprocessor: Arc<dyn Preprocessor>,
    motion: Arc<dyn MotionProcessor>,
    initialized: bool,
}

impl PhasePipeline {
    #[must_use]
    pub fn new(
        config: TrainingConfig,
        tracker: Arc<Tracker>,
        preprocessor: Arc<dyn Preprocessor>,
        motion: Arc<dyn MotionProcessor>,
    ) -> Self {
        Self {
            config,
            tracker,
            runner: SubprocessRunner::new(),
            preprocessor,
            motion,
            initialized: false,
        }
    }

    #[must_use]
    pub fn with_runner(mut self, runner: SubprocessRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Move one phase's training output into the run directory. Returns
    /// whether anything was preserved for this phase.
    fn preserve_phase_output(&self, phase: Phase, run_dir: &Path) -> TrainingResult<bool> {
        let source = phase.training_output_dir(&self.config.framework_path);
        if !source.is_dir() {
            warn!(%phase, path = %source.display(), "no training output to preserve");
            return Ok(false);
        }
        let dest = run_dir.join(phase.dir_name());
        if fs::rename(&source, &dest).is_err() {
            // rename fails across filesystems; fall back to copy + delete
            copy_dir(&source, &dest)?;
            fs::remove_dir_all(&source)?;
        }
        debug!(%phase, dest = %dest.display(), "training output preserved");
        Ok(true)
    }
}

#[async_trait]
impl Experiment for PhasePipeline {
    /// Validate the framework layout, then patch both entry scripts. Nothing
    /// is patched unless both phases validate.
    async fn init(&mut self) -> TrainingResult<()> {
        self.tracker.log_ui_status("Initializing", "Initializing training pipeline...");

        for phase in Phase::ALL {
            if !validate_structure(&self.config.framework_path, phase) {
                return Err(TrainingError::Validation(format!(
                    "framework layout incomplete for the {phase} phase"
                )));
            }
        }
        for phase in Phase::ALL {
            init_phase(&self.config, phase)?;
        }

        self.initialized = true;
        self.tracker.log_ui_status("Initialized", "Training pipeline ready");
        Ok(())
    }

    /// Preprocess the dataset once, then run the phases in order. Consumes
    /// the initialized state: a second run requires a fresh `init`.
    async fn run(&mut self) -> TrainingResult<()> {
        if !self.initialized {
            return Err(TrainingError::NotInitialized);
        }
        self.initialized = false;

        self.tracker.log_ui_status("Data Preprocessing", "Preparing the motion dataset...");
        self.preprocessor
            .run(&self.config.dataset_path)
            .await
            .map_err(|e| TrainingError::Preprocess(format!("{e:#}")))?;

        for phase in Phase::ALL {
            run_phase(&self.config, phase, &self.tracker, &self.runner, self.motion.as_ref())
                .await?;
        }

        self.tracker.log_ui_status("Completed Training", "Both training phases finished");
        Ok(())
    }

    /// Move training artifacts and the effective configuration into the run
    /// directory. Best effort: every failure is reported, none is raised,
    /// and the final status distinguishes a complete from a partial save.
    async fn preserve(&self) {
        let Some(run_dir) = &self.config.run_dir else {
            self.tracker.log_ui_status(
                "Preservation Disabled",
                "No run directory configured, training artifacts left in place",
            );
            return;
        };
        self.tracker
            .log_ui_status("Preserving Artifacts", "Saving training results...");

        if let Err(e) = fs::create_dir_all(run_dir) {
            self.tracker.log_exception("Artifact preservation failed", &e);
            return;
        }

        let mut complete = true;
        match serde_json::to_string_pretty(&self.config) {
            Ok(json) => {
                if let Err(e) = fs::write(run_dir.join("config.json"), json) {
                    self.tracker.log_exception("Failed to save configuration", &e);
                    complete = false;
                }
            }
            Err(e) => {
                self.tracker.log_exception("Failed to serialize configuration", &e);
                complete = false;
            }
        }

        for phase in Phase::ALL {
            match self.preserve_phase_output(phase, run_dir) {
                Ok(true) => {}
                Ok(false) => complete = false,
                Err(e) => {
                    self.tracker.log_exception("Artifact preservation failed", &e);
                    complete = false;
                }
            }
        }

        if complete {
            self.tracker.log_ui_status(
                "Preservation Complete",
                &format!("Training results saved to {}", run_dir.display()),
            );
        } else {
            self.tracker.log_ui_status(
                "Preservation Partial",
                &format!("Some training results could not be saved to {}", run_dir.display()),
            );
        }
    }

    /// Restore every patched script and generated descriptor. Never fails:
    /// each phase is reset independently and failures are reported through
    /// the tracker.
    async fn cleanup(&self) {
        let mut failures = 0usize;
        for phase in Phase::ALL {
            if let Err(e) = reset_phase(&self.config.framework_path, phase) {
                self.tracker.log_exception("Cleanup failed", &e);
                failures += 1;
            }
        }
        if failures == 0 {
            self.tracker
                .log_ui_status("Completed Experiment", "Experiment cleaned up successfully");
        }
    }
}

fn copy_dir(source: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
