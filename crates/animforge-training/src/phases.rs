//! Per-phase operations: structure validation, entry-script initialization,
//! supervised execution, and reversal of every edit.

use crate::config::TrainingConfig;
use crate::error::{TrainingError, TrainingResult};
use crate::parse::{ProgressLine, parse_progress};
use crate::phase::Phase;
use crate::runner::SubprocessRunner;
use crate::stage::MotionProcessor;
use animforge_scripts::{
    EditError, ScriptValue, back_up_file, has_backup, reset_from_backup, write_variables,
};
use animforge_tracker::{Metrics, Tracker, number};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Line manifest of the filtered motion sequences, one entry per sample.
pub const SEQUENCES_FILE: &str = "sequences_velocity.txt";
/// Binary joint-velocity export produced by preprocessing.
pub const FILTERED_VELOCITY_FILE: &str = "p_velocity.bin";
/// Shape descriptor the encoder reads: `<samples> <features>`.
pub const SHAPE_DESCRIPTOR_FILE: &str = "DataShape.txt";
/// One feature label per line; its length is the controller input width.
pub const INPUT_LABELS_FILE: &str = "InputLabels.txt";

/// 26 tracked joints, 3 velocity components each.
pub const VELOCITY_FEATURES: usize = 78;
/// 5 phase channels, sin and cos per channel. These occupy the tail of the
/// controller's input vector.
pub const PHASE_FEATURES: usize = 10;

/// Check that the framework checkout has the directories and entry script
/// this phase needs. Every missing piece is logged; the result is a single
/// yes or no.
#[must_use]
pub fn validate_structure(framework: &Path, phase: Phase) -> bool {
    let mut ok = true;
    let root = phase.root(framework);
    if !root.is_dir() {
        warn!(path = %root.display(), "phase directory missing");
        ok = false;
    }
    let entry = phase.entry_script_path(framework);
    if !entry.is_file() {
        warn!(path = %entry.display(), "entry script missing");
        ok = false;
    }
    let data_dir = phase.data_dir(framework);
    if !data_dir.is_dir() {
        warn!(path = %data_dir.display(), "data directory missing");
        ok = false;
    }
    ok
}

/// Patch the phase entry script with the configured epoch count and
/// hyperparameter overrides, plus the dataset-derived values the phase
/// expects. All file mutations are backed up and reversible via
/// [`reset_phase`].
pub fn init_phase(config: &TrainingConfig, phase: Phase) -> TrainingResult<()> {
    let mut updates: BTreeMap<String, ScriptValue> = BTreeMap::new();
    updates.insert("epochs".to_string(), ScriptValue::Int(i64::from(config.epochs_for(phase))));
    if let Some(lr) = config.learning_rate {
        updates.insert("learning_rate".to_string(), ScriptValue::Float(lr));
    }
    if let Some(dropout) = config.dropout {
        updates.insert("dropout".to_string(), ScriptValue::Float(dropout));
    }

    // Dataset-derived values are read before any mutation, so a missing
    // manifest fails with nothing to undo.
    let pae_samples = match phase {
        Phase::Pae => Some(count_lines(&config.dataset_path.join(SEQUENCES_FILE))?),
        Phase::Gnn => {
            init_gnn(config, &mut updates)?;
            None
        }
    };

    write_variables(&phase.entry_script_path(&config.framework_path), &updates)?;
    if let Some(samples) = pae_samples {
        write_shape_descriptor(config, samples)?;
    }
    debug!(%phase, variables = updates.len(), "entry script initialized");
    Ok(())
}

/// Write the encoder's shape descriptor: the sample count comes from the
/// sequence manifest, the feature width is fixed by the skeleton. Written
/// after the entry-script edit, so a shape descriptor never exists without
/// the script backup that marks the phase as initialized.
fn write_shape_descriptor(config: &TrainingConfig, samples: usize) -> TrainingResult<()> {
    let descriptor = Phase::Pae.data_dir(&config.framework_path).join(SHAPE_DESCRIPTOR_FILE);
    if descriptor.is_file() {
        back_up_file(&descriptor)?;
    }
    fs::write(&descriptor, format!("{samples} {VELOCITY_FEATURES}\n"))?;
    debug!(samples, features = VELOCITY_FEATURES, "shape descriptor written");
    Ok(())
}

/// Derive the controller's input width and phase-feature slice from the
/// exported label manifest. The phase features always occupy the last
/// [`PHASE_FEATURES`] columns.
fn init_gnn(
    config: &TrainingConfig,
    updates: &mut BTreeMap<String, ScriptValue>,
) -> TrainingResult<()> {
    let labels = config.dataset_path.join(INPUT_LABELS_FILE);
    let features = count_lines(&labels)?;
    if features <= PHASE_FEATURES {
        return Err(TrainingError::Validation(format!(
            "{} lists {features} features, need more than {PHASE_FEATURES}",
            labels.display()
        )));
    }

    updates.insert("input_dim".to_string(), ScriptValue::Int(features as i64));
    updates.insert(
        "phase_indices".to_string(),
        ScriptValue::Expr(format!("torch.arange({}, {features})", features - PHASE_FEATURES)),
    );
    Ok(())
}

/// Stage inputs, launch the phase subprocess, and translate its output into
/// status events. Fails fast when a required input is missing and reports a
/// non-zero exit with the captured stderr.
pub async fn run_phase(
    config: &TrainingConfig,
    phase: Phase,
    tracker: &Tracker,
    runner: &SubprocessRunner,
    motion: &dyn MotionProcessor,
) -> TrainingResult<()> {
    tracker.log_ui_status(
        &format!("Starting training {} ...", phase.ordinal()),
        &format!("Starting {} training phase...", phase.display_name()),
    );

    match phase {
        Phase::Pae => stage_pae_inputs(config)?,
        Phase::Gnn => stage_gnn_inputs(config, motion).await?,
    }

    // Matplotlib must not try to open a display from a headless child.
    let mut env = HashMap::new();
    if phase == Phase::Pae {
        env.insert("MPLBACKEND".to_string(), "Agg".to_string());
    }

    let status = format!("{} training", phase.display_name());
    let handler = |line: &str, name: &str| match parse_progress(line) {
        Some(ProgressLine::Epoch { epoch, loss }) => {
            let mut metrics = Metrics::new();
            metrics.insert("epoch".to_string(), epoch.into());
            metrics.insert("train_loss".to_string(), number(loss));
            tracker.log_epoch(&status, metrics, Some(&format!("{name} epoch {epoch} completed")));
        }
        Some(ProgressLine::Percent(pct)) => {
            tracker.log_percentage_progress(&status, pct, None);
        }
        None => debug!(process = %name, "{line}"),
    };

    let outcome = runner
        .run(
            &config.python_executable,
            &["-u", phase.entry_script()],
            &phase.root(&config.framework_path),
            phase.display_name(),
            &env,
            handler,
        )
        .await?;

    if !outcome.success() {
        return Err(TrainingError::Subprocess {
            phase: phase.dir_name().to_string(),
            exit_code: outcome.exit_code,
            stderr: outcome.stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// Copy the preprocessed velocity export and its manifest into the encoder's
/// dataset directory, under the fixed names its loader expects.
fn stage_pae_inputs(config: &TrainingConfig) -> TrainingResult<()> {
    let data_dir = Phase::Pae.data_dir(&config.framework_path);
    for (source_name, staged_name) in
        [(FILTERED_VELOCITY_FILE, "Data.bin"), (SEQUENCES_FILE, "Sequences.txt")]
    {
        let source = config.dataset_path.join(source_name);
        if !source.is_file() {
            return Err(TrainingError::MissingInput(source));
        }
        fs::copy(&source, data_dir.join(staged_name))?;
    }
    Ok(())
}

/// Run the motion-processing hooks, then copy every exported feature file
/// into the controller's data directory.
async fn stage_gnn_inputs(
    config: &TrainingConfig,
    motion: &dyn MotionProcessor,
) -> TrainingResult<()> {
    motion
        .input_preprocessing()
        .await
        .map_err(|e| TrainingError::Preprocess(format!("input preprocessing: {e:#}")))?;
    motion
        .output_preprocessing()
        .await
        .map_err(|e| TrainingError::Preprocess(format!("output preprocessing: {e:#}")))?;
    motion
        .export_data()
        .await
        .map_err(|e| TrainingError::Preprocess(format!("data export: {e:#}")))?;

    let export_dir = motion.export_dir();
    if !export_dir.is_dir() {
        return Err(TrainingError::MissingInput(export_dir));
    }

    let data_dir = Phase::Gnn.data_dir(&config.framework_path);
    let mut staged = 0usize;
    for entry in fs::read_dir(&export_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), data_dir.join(entry.file_name()))?;
            staged += 1;
        }
    }
    if staged == 0 {
        return Err(TrainingError::MissingInput(export_dir));
    }
    debug!(staged, "motion feature files staged");
    Ok(())
}

/// Undo every file mutation [`init_phase`] made. A missing entry-script
/// backup means the phase was never initialized; that is logged and skipped,
/// not raised, so cleanup can always run to completion. A shape descriptor
/// without a backup of its own was generated fresh by init and is removed,
/// not restored.
pub fn reset_phase(framework: &Path, phase: Phase) -> TrainingResult<()> {
    let entry = phase.entry_script_path(framework);
    let initialized = has_backup(&entry);
    restore_optional(&entry)?;

    if phase == Phase::Pae {
        let descriptor = Phase::Pae.data_dir(framework).join(SHAPE_DESCRIPTOR_FILE);
        if has_backup(&descriptor) {
            reset_from_backup(&descriptor)?;
        } else if initialized && descriptor.is_file() {
            fs::remove_file(&descriptor)?;
            debug!(path = %descriptor.display(), "generated shape descriptor removed");
        }
    }
    Ok(())
}

fn restore_optional(path: &Path) -> TrainingResult<()> {
    match reset_from_backup(path) {
        Ok(()) => Ok(()),
        Err(EditError::NoBackup(_)) => {
            debug!(path = %path.display(), "no backup to restore, skipping");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn count_lines(path: &Path) -> TrainingResult<usize> {
    let text = fs::read_to_string(path)
        .map_err(|_| TrainingError::MissingInput(path.to_path_buf()))?;
    Ok(text.lines().filter(|l| !l.trim().is_empty()).count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn make_framework(dir: &Path) -> PathBuf {
        let framework = dir.join("framework");
        for phase in Phase::ALL {
            fs::create_dir_all(phase.data_dir(&framework)).unwrap();
            fs::write(
                phase.entry_script_path(&framework),
                "epochs = 100\nlearning_rate = 0.001\ninput_dim = 0\nphase_indices = None\ndropout = 0.1\n",
            )
            .unwrap();
        }
        framework
    }

    fn make_config(dir: &Path) -> TrainingConfig {
        let dataset = dir.join("dataset");
        fs::create_dir_all(&dataset).unwrap();
        fs::write(dataset.join(SEQUENCES_FILE), "s0\ns1\ns2\n").unwrap();
        let labels: String = (0..16).map(|i| format!("f{i}\n")).collect();
        fs::write(dataset.join(INPUT_LABELS_FILE), labels).unwrap();
        fs::write(dataset.join(FILTERED_VELOCITY_FILE), b"\x00\x01").unwrap();
        TrainingConfig {
            dataset_path: dataset,
            framework_path: make_framework(dir),
            pae_epochs: 5,
            gnn_epochs: 7,
            learning_rate: Some(0.01),
            dropout: None,
            run_dir: None,
            python_executable: "sh".to_string(),
            preprocess_script: None,
        }
    }

    #[test]
    fn test_validate_reports_complete_structure() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        assert!(validate_structure(&config.framework_path, Phase::Pae));
        assert!(validate_structure(&config.framework_path, Phase::Gnn));
    }

    #[test]
    fn test_validate_fails_on_missing_entry_script() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        fs::remove_file(Phase::Gnn.entry_script_path(&config.framework_path)).unwrap();
        assert!(!validate_structure(&config.framework_path, Phase::Gnn));
        assert!(validate_structure(&config.framework_path, Phase::Pae));
    }

    #[test]
    fn test_pae_init_patches_epochs_and_writes_shape() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        init_phase(&config, Phase::Pae).unwrap();

        let script = fs::read_to_string(Phase::Pae.entry_script_path(&config.framework_path)).unwrap();
        assert!(script.contains("epochs = 5"));
        assert!(script.contains("learning_rate = 0.01"));

        let shape = fs::read_to_string(
            Phase::Pae.data_dir(&config.framework_path).join(SHAPE_DESCRIPTOR_FILE),
        )
        .unwrap();
        assert_eq!(shape, "3 78\n");
        assert!(has_backup(&Phase::Pae.entry_script_path(&config.framework_path)));
    }

    #[test]
    fn test_gnn_init_derives_tensor_layout_from_labels() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        init_phase(&config, Phase::Gnn).unwrap();

        let script = fs::read_to_string(Phase::Gnn.entry_script_path(&config.framework_path)).unwrap();
        assert!(script.contains("epochs = 7"));
        assert!(script.contains("input_dim = 16"));
        assert!(script.contains("phase_indices = torch.arange(6, 16)"));
    }

    #[test]
    fn test_gnn_init_rejects_too_few_features() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        fs::write(config.dataset_path.join(INPUT_LABELS_FILE), "a\nb\n").unwrap();
        let err = init_phase(&config, Phase::Gnn).unwrap_err();
        assert!(matches!(err, TrainingError::Validation(_)));
    }

    #[test]
    fn test_init_fails_when_manifest_missing() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        fs::remove_file(config.dataset_path.join(SEQUENCES_FILE)).unwrap();
        let err = init_phase(&config, Phase::Pae).unwrap_err();
        assert!(matches!(err, TrainingError::MissingInput(_)));
    }

    #[test]
    fn test_reset_restores_script_and_descriptor() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        let entry = Phase::Pae.entry_script_path(&config.framework_path);
        let original = fs::read_to_string(&entry).unwrap();

        init_phase(&config, Phase::Pae).unwrap();
        assert_ne!(fs::read_to_string(&entry).unwrap(), original);

        reset_phase(&config.framework_path, Phase::Pae).unwrap();
        assert_eq!(fs::read_to_string(&entry).unwrap(), original);
        assert!(!has_backup(&entry));
    }

    #[test]
    fn test_reset_removes_descriptor_generated_by_init() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        let descriptor =
            Phase::Pae.data_dir(&config.framework_path).join(SHAPE_DESCRIPTOR_FILE);
        assert!(!descriptor.exists());

        init_phase(&config, Phase::Pae).unwrap();
        assert!(descriptor.is_file());

        reset_phase(&config.framework_path, Phase::Pae).unwrap();
        assert!(!descriptor.exists(), "generated descriptor must not survive reset");
    }

    #[test]
    fn test_reset_restores_preexisting_descriptor() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        let descriptor =
            Phase::Pae.data_dir(&config.framework_path).join(SHAPE_DESCRIPTOR_FILE);
        fs::write(&descriptor, "1000 78\n").unwrap();

        init_phase(&config, Phase::Pae).unwrap();
        assert_eq!(fs::read_to_string(&descriptor).unwrap(), "3 78\n");

        reset_phase(&config.framework_path, Phase::Pae).unwrap();
        assert_eq!(fs::read_to_string(&descriptor).unwrap(), "1000 78\n");
        assert!(!has_backup(&descriptor));
    }

    #[test]
    fn test_reset_without_init_is_silent() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        reset_phase(&config.framework_path, Phase::Pae).unwrap();
        reset_phase(&config.framework_path, Phase::Gnn).unwrap();
    }

    #[test]
    fn test_reset_without_init_leaves_preexisting_descriptor() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        let descriptor =
            Phase::Pae.data_dir(&config.framework_path).join(SHAPE_DESCRIPTOR_FILE);
        fs::write(&descriptor, "1000 78\n").unwrap();

        reset_phase(&config.framework_path, Phase::Pae).unwrap();
        assert_eq!(fs::read_to_string(&descriptor).unwrap(), "1000 78\n");
    }

    #[test]
    fn test_pae_staging_requires_velocity_export() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        fs::remove_file(config.dataset_path.join(FILTERED_VELOCITY_FILE)).unwrap();
        let err = stage_pae_inputs(&config).unwrap_err();
        assert!(matches!(err, TrainingError::MissingInput(_)));
    }

    #[test]
    fn test_pae_staging_copies_under_fixed_names() {
        let dir = TempDir::new().unwrap();
        let config = make_config(dir.path());
        stage_pae_inputs(&config).unwrap();
        let data_dir = Phase::Pae.data_dir(&config.framework_path);
        assert!(data_dir.join("Data.bin").is_file());
        assert!(data_dir.join("Sequences.txt").is_file());
    }
}
