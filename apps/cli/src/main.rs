//! AnimForge training CLI.
//!
//! Drives a two-phase character-animation training experiment. Stdout carries
//! the machine-readable status stream, one JSON object per line; everything
//! meant for humans goes to stderr. The exit code is the only other contract:
//! zero on success, one on any failure.

use animforge_tracker::{LogSinkRegistry, Tracker};
use animforge_training::{
    Experiment, NullPreprocessor, Phase, PhasePipeline, Preprocessor, PrestagedMotionData,
    load_config,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(
    name = "animforge",
    version,
    about = "AnimForge - character animation training driver"
)]
struct Args {
    /// Log level for stderr diagnostics (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full training experiment
    ///
    /// Initializes both phases, trains encoder then controller, preserves
    /// artifacts when a run directory is configured, and always restores the
    /// framework checkout before exiting.
    Run {
        /// Path to the JSON configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Also emit high-frequency percentage progress events
        #[arg(long)]
        emit_progress: bool,
    },

    /// Check a configuration and the framework layout without training
    Validate {
        /// Path to the JSON configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let registry = LogSinkRegistry::new();
    let filter =
        EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(registry.layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();

    let code = match args.command {
        Command::Run { config, emit_progress } => {
            let tracker =
                Tracker::builder().emit_percent_progress(emit_progress).install(&registry);
            run_experiment(&config, &tracker).await
        }
        Command::Validate { config } => validate(&config),
    };
    std::process::exit(code);
}

/// The experiment fault boundary. Every failure ends up as an `Error` status
/// event plus a non-zero exit; cleanup runs no matter how training ended.
async fn run_experiment(config_path: &Path, tracker: &Arc<Tracker>) -> i32 {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracker.log_exception("Configuration loading failed", &e);
            return 1;
        }
    };

    let preprocessor: Arc<dyn Preprocessor> = match &config.preprocess_script {
        Some(script) => Arc::new(animforge_training::ScriptPreprocessor::new(
            script.clone(),
            config.python_executable.clone(),
        )),
        None => Arc::new(NullPreprocessor),
    };
    let motion = Arc::new(PrestagedMotionData::new(&config.dataset_path));

    let mut experiment =
        PhasePipeline::new(config, Arc::clone(tracker), preprocessor, motion);

    let outcome = match experiment.init().await {
        Ok(()) => experiment.run().await,
        Err(e) => Err(e),
    };
    let code = match outcome {
        Ok(()) => {
            experiment.preserve().await;
            0
        }
        Err(e) => {
            tracker.log_exception("Training failed", &e);
            1
        }
    };
    experiment.cleanup().await;
    code
}

/// Human-facing preflight: load the configuration and check the framework
/// layout, reporting every problem found.
fn validate(config_path: &Path) -> i32 {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {:#}", anyhow::Error::new(e));
            return 1;
        }
    };

    let mut ok = true;
    for phase in Phase::ALL {
        if animforge_training::phases::validate_structure(&config.framework_path, phase) {
            println!("{phase}: ok");
        } else {
            println!("{phase}: incomplete, see diagnostics above");
            ok = false;
        }
    }
    if ok { 0 } else { 1 }
}
