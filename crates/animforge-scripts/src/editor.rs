//! Read and write script variable assignments.
//!
//! `read_variable` and `apply_updates` are pure text operations; the file-level
//! entry points add the backup/validate/revert protocol around them so a target
//! script is never left syntactically broken on disk.

use crate::assign::{Assignment, find_assignments};
use crate::backup::{back_up_file, backup_path, read_existing, restore_file};
use crate::check::check_source;
use crate::error::{EditError, EditResult};
use crate::value::ScriptValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Read the current textual value of `name` in `source`.
///
/// Returns `Ok(None)` when no assignment exists. When multiple assignments
/// exist they must carry textually identical right-hand sides; the last one is
/// returned. Differing values are a hard error, not a "last wins" resolution.
pub fn read_variable(source: &str, name: &str) -> EditResult<Option<String>> {
    let found = find_assignments(source, name);
    let Some(last) = found.last() else {
        return Ok(None);
    };
    if let Some(conflict) = first_conflict(&found) {
        return Err(EditError::Ambiguous {
            name: name.to_string(),
            first: found[0].rhs.clone(),
            second: conflict.rhs.clone(),
        });
    }
    Ok(Some(last.rhs.clone()))
}

/// Apply a batch of variable updates to `source`, returning the new text.
///
/// The whole batch fails, leaving the input untouched, if any variable is
/// missing or ambiguously assigned. Every non-self occurrence is rewritten in
/// place with its original indentation.
pub fn apply_updates(
    source: &str,
    updates: &BTreeMap<String, ScriptValue>,
) -> EditResult<String> {
    // Split on '\n' without stripping '\r', so untouched lines pass through
    // byte-for-byte and joining restores the original ending exactly.
    let mut lines: Vec<String> = source.split('\n').map(ToOwned::to_owned).collect();

    for (name, value) in updates {
        let found = find_assignments(source, name);
        if found.is_empty() {
            return Err(EditError::Missing { name: name.clone() });
        }
        if let Some(conflict) = first_conflict(&found) {
            return Err(EditError::Ambiguous {
                name: name.clone(),
                first: found[0].rhs.clone(),
                second: conflict.rhs.clone(),
            });
        }
        if found.len() > 1 {
            debug!(name = %name, occurrences = found.len(), "updating repeated assignment");
        }
        for assignment in &found {
            let mut replacement = format!("{}{} = {}", assignment.indent, name, value);
            if lines[assignment.line].ends_with('\r') {
                replacement.push('\r');
            }
            lines[assignment.line] = replacement;
        }
    }

    Ok(lines.join("\n"))
}

/// Patch variables inside the script at `path`, creating a backup first.
///
/// The source must pass [`check_source`] both before and after the edit; a
/// post-edit failure reverts the file from the backup, so the file on disk is
/// never syntactically broken.
pub fn write_variables(
    path: &Path,
    updates: &BTreeMap<String, ScriptValue>,
) -> EditResult<()> {
    let bytes = read_existing(path)?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    if let Err(reason) = check_source(&content) {
        return Err(EditError::InvalidSource { path: path.to_path_buf(), reason });
    }

    let updated = apply_updates(&content, updates)?;

    back_up_file(path)?;
    fs::write(path, &updated)?;

    if let Err(reason) = check_source(&updated) {
        warn!(path = %path.display(), reason = %reason, "post-edit validation failed, reverting");
        restore_file(path)?;
        return Err(EditError::InvalidSource { path: path.to_path_buf(), reason });
    }

    debug!(path = %path.display(), variables = updates.len(), backup = %backup_path(path).display(), "script patched");
    Ok(())
}

/// Restore the script at `path` from its backup and remove the backup.
pub fn reset_from_backup(path: &Path) -> EditResult<()> {
    restore_file(path)?;
    debug!(path = %path.display(), "script restored from backup");
    Ok(())
}

/// First assignment whose right-hand side differs from the first one found.
fn first_conflict(found: &[Assignment]) -> Option<&Assignment> {
    let first = found.first()?;
    found.iter().find(|a| a.rhs != first.rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::has_backup;
    use tempfile::TempDir;

    const SCRIPT: &str = "#!/usr/bin/env python3\n# Test script\nepochs = 10\nbatch_size = 32\nlearning_rate = 0.001\n";

    fn updates(pairs: &[(&str, ScriptValue)]) -> BTreeMap<String, ScriptValue> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_read_existing_variable() {
        assert_eq!(read_variable(SCRIPT, "epochs").unwrap(), Some("10".to_string()));
        assert_eq!(read_variable(SCRIPT, "learning_rate").unwrap(), Some("0.001".to_string()));
    }

    #[test]
    fn test_read_missing_variable_is_none() {
        assert_eq!(read_variable(SCRIPT, "momentum").unwrap(), None);
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let updated = apply_updates(SCRIPT, &updates(&[("epochs", ScriptValue::Int(2))])).unwrap();
        assert_eq!(read_variable(&updated, "epochs").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_ambiguous_assignment_fails_read_and_write() {
        let source = "epochs = 10\nepochs = 20\n";
        let read_err = read_variable(source, "epochs").unwrap_err();
        assert!(read_err.to_string().contains("different values"));

        let write_err =
            apply_updates(source, &updates(&[("epochs", ScriptValue::Int(5))])).unwrap_err();
        assert!(write_err.to_string().contains("different values"));
    }

    #[test]
    fn test_identical_repeated_assignments_all_updated() {
        let source = "epochs = 10\nif fast:\n    epochs = 10\n";
        let updated =
            apply_updates(source, &updates(&[("epochs", ScriptValue::Int(3))])).unwrap();
        assert_eq!(updated, "epochs = 3\nif fast:\n    epochs = 3\n");
    }

    #[test]
    fn test_read_repeated_identical_returns_last() {
        let source = "epochs = 10\nepochs = 10\n";
        assert_eq!(read_variable(source, "epochs").unwrap(), Some("10".to_string()));
    }

    #[test]
    fn test_missing_variable_fails_whole_batch() {
        let err = apply_updates(
            SCRIPT,
            &updates(&[("epochs", ScriptValue::Int(2)), ("missing", ScriptValue::Int(1))]),
        )
        .unwrap_err();
        assert!(matches!(err, EditError::Missing { .. }));
    }

    #[test]
    fn test_self_assignment_never_touched_or_read() {
        let source = "x = x\n";
        assert_eq!(read_variable(source, "x").unwrap(), None);
        let err = apply_updates(source, &updates(&[("x", ScriptValue::Int(1))])).unwrap_err();
        assert!(matches!(err, EditError::Missing { .. }));
    }

    #[test]
    fn test_expr_value_injects_raw_expression() {
        let source = "gating = torch.arange(0, 8)\n";
        let updated = apply_updates(
            source,
            &updates(&[("gating", ScriptValue::Expr("torch.arange(236, 246)".to_string()))]),
        )
        .unwrap();
        assert_eq!(updated, "gating = torch.arange(236, 246)\n");
    }

    #[test]
    fn test_indentation_and_unrelated_lines_preserved() {
        let source = "import os\n\ndef setup():\n    epochs = 4\n    return epochs\n";
        let updated =
            apply_updates(source, &updates(&[("epochs", ScriptValue::Int(7))])).unwrap();
        assert_eq!(updated, "import os\n\ndef setup():\n    epochs = 7\n    return epochs\n");
    }

    #[test]
    fn test_crlf_endings_of_untouched_lines_preserved() {
        let source = "epochs = 1\r\nother = 2\r\n";
        let updated =
            apply_updates(source, &updates(&[("epochs", ScriptValue::Int(5))])).unwrap();
        assert_eq!(updated, "epochs = 5\r\nother = 2\r\n");
    }

    #[test]
    fn test_mixed_line_endings_preserved() {
        let source = "a = 1\nepochs = 2\r\nb = 3";
        let updated =
            apply_updates(source, &updates(&[("epochs", ScriptValue::Int(9))])).unwrap();
        assert_eq!(updated, "a = 1\nepochs = 9\r\nb = 3");
    }

    #[test]
    fn test_docstring_mention_does_not_shadow_real_assignment() {
        let source = "\"\"\"\nepochs = 99\n\"\"\"\nepochs = 50\n";
        assert_eq!(read_variable(source, "epochs").unwrap(), Some("50".to_string()));

        let updated =
            apply_updates(source, &updates(&[("epochs", ScriptValue::Int(2))])).unwrap();
        assert_eq!(updated, "\"\"\"\nepochs = 99\n\"\"\"\nepochs = 2\n");
    }

    #[test]
    fn test_variable_only_in_docstring_is_missing() {
        let source = "\"\"\"Set lr = 0.1 for fine-tuning\"\"\"\nepochs = 3\n";
        assert_eq!(read_variable(source, "lr").unwrap(), None);
        let err =
            apply_updates(source, &updates(&[("lr", ScriptValue::Float(0.5))])).unwrap_err();
        assert!(matches!(err, EditError::Missing { .. }));
    }

    #[test]
    fn test_write_variables_creates_exact_backup() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("Network.py");
        fs::write(&script, SCRIPT).unwrap();

        write_variables(&script, &updates(&[("epochs", ScriptValue::Int(2))])).unwrap();

        let backup = backup_path(&script);
        assert_eq!(fs::read_to_string(backup).unwrap(), SCRIPT);
        let patched = fs::read_to_string(&script).unwrap();
        assert!(patched.contains("epochs = 2"));
    }

    #[test]
    fn test_reset_restores_bytes_and_removes_backup() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("Network.py");
        fs::write(&script, SCRIPT).unwrap();

        write_variables(&script, &updates(&[("epochs", ScriptValue::Int(2))])).unwrap();
        reset_from_backup(&script).unwrap();

        assert_eq!(fs::read_to_string(&script).unwrap(), SCRIPT);
        assert!(!has_backup(&script));
    }

    #[test]
    fn test_reset_without_backup_errors() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("Network.py");
        fs::write(&script, SCRIPT).unwrap();

        let err = reset_from_backup(&script).unwrap_err();
        assert!(matches!(err, EditError::NoBackup(_)));
    }

    #[test]
    fn test_invalid_pre_edit_source_rejected() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("Network.py");
        fs::write(&script, "epochs = f(1, 2\n").unwrap();

        let err =
            write_variables(&script, &updates(&[("epochs", ScriptValue::Int(2))])).unwrap_err();
        assert!(matches!(err, EditError::InvalidSource { .. }));
        assert!(!has_backup(&script));
    }

    #[test]
    fn test_invalid_post_edit_reverts_from_backup() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("Network.py");
        fs::write(&script, SCRIPT).unwrap();

        let err = write_variables(
            &script,
            &updates(&[("epochs", ScriptValue::Expr("f(1, 2".to_string()))]),
        )
        .unwrap_err();
        assert!(matches!(err, EditError::InvalidSource { .. }));
        assert_eq!(fs::read_to_string(&script).unwrap(), SCRIPT);
        assert!(!has_backup(&script));
    }

    #[test]
    fn test_independent_backups_per_file() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.py");
        let b = temp.path().join("b.py");
        fs::write(&a, "epochs = 1\n").unwrap();
        fs::write(&b, "epochs = 2\n").unwrap();

        write_variables(&a, &updates(&[("epochs", ScriptValue::Int(9))])).unwrap();
        write_variables(&b, &updates(&[("epochs", ScriptValue::Int(8))])).unwrap();

        reset_from_backup(&a).unwrap();
        assert_eq!(fs::read_to_string(&a).unwrap(), "epochs = 1\n");
        // b's backup is untouched by a's reset
        assert!(has_backup(&b));
    }
}
