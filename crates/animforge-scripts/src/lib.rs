//! AnimForge Script Editing
//!
//! Reversible text-level patching of variable assignments inside external,
//! unmodified third-party training scripts:
//! - Locating `name = value` assignments (`find_assignments`)
//! - Reading and batch-updating assignment values (`read_variable`, `apply_updates`)
//! - File edits with backup/restore (`write_variables`, `reset_from_backup`)
//!
//! Edits are line-indexed text replacements, never AST rewrites, so the target
//! script's formatting and comments survive untouched.

pub mod assign;
pub mod backup;
pub mod check;
pub mod editor;
pub mod error;
pub mod value;

pub use assign::{Assignment, find_assignments};
pub use backup::{BACKUP_SUFFIX, back_up_file, backup_path, has_backup, restore_file};
pub use check::check_source;
pub use editor::{apply_updates, read_variable, reset_from_backup, write_variables};
pub use error::{EditError, EditResult};
pub use value::ScriptValue;
