//! Two-phase character-animation training pipeline.
//!
//! Drives a third-party training framework through its two phases, encoder
//! (PAE) then controller (GNN), by patching each phase's entry script,
//! staging its input files, supervising the training subprocess, and
//! translating its output into structured status events. Every script edit
//! is backed up and reverted during cleanup, so the framework checkout is
//! left exactly as it was found.

pub mod config;
pub mod error;
pub mod experiment;
pub mod parse;
pub mod phase;
pub mod phases;
pub mod runner;
pub mod stage;

pub use config::{ConfigError, TrainingConfig, load_config};
pub use error::{TrainingError, TrainingResult};
pub use experiment::{Experiment, PhasePipeline};
pub use phase::Phase;
pub use runner::{RunOutcome, RunnerError, SubprocessRunner};
pub use stage::{
    MotionProcessor, NullPreprocessor, Preprocessor, PrestagedMotionData, ScriptPreprocessor,
};
