//! The two training phases and their on-disk layout inside the framework.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A training phase. The encoder (PAE) learns a periodic latent embedding of
/// joint velocities; the controller (GNN) learns motion prediction on top of
/// the exported motion features. PAE always runs before GNN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Pae,
    Gnn,
}

impl Phase {
    /// Execution order.
    pub const ALL: [Self; 2] = [Self::Pae, Self::Gnn];

    /// Directory of this phase under the framework root.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Pae => "PAE",
            Self::Gnn => "GNN",
        }
    }

    /// Directory the phase reads its staged training data from, relative to
    /// the phase directory.
    #[must_use]
    pub fn data_dir_name(self) -> &'static str {
        match self {
            Self::Pae => "Dataset",
            Self::Gnn => "Data",
        }
    }

    /// Both phases use the same entry script filename.
    #[must_use]
    pub fn entry_script(self) -> &'static str {
        "Network.py"
    }

    /// Human-facing name used in status text.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Pae => "Encoder",
            Self::Gnn => "Controller",
        }
    }

    /// Position in the fixed two-phase sequence, as shown to the user.
    #[must_use]
    pub fn ordinal(self) -> &'static str {
        match self {
            Self::Pae => "1/2",
            Self::Gnn => "2/2",
        }
    }

    #[must_use]
    pub fn root(self, framework: &Path) -> PathBuf {
        framework.join(self.dir_name())
    }

    #[must_use]
    pub fn data_dir(self, framework: &Path) -> PathBuf {
        self.root(framework).join(self.data_dir_name())
    }

    #[must_use]
    pub fn entry_script_path(self, framework: &Path) -> PathBuf {
        self.root(framework).join(self.entry_script())
    }

    /// Where the framework writes checkpoints and exported weights.
    #[must_use]
    pub fn training_output_dir(self, framework: &Path) -> PathBuf {
        self.root(framework).join("Training")
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_phase_specific() {
        let framework = Path::new("/fw");
        assert_eq!(Phase::Pae.data_dir(framework), Path::new("/fw/PAE/Dataset"));
        assert_eq!(Phase::Gnn.data_dir(framework), Path::new("/fw/GNN/Data"));
        assert_eq!(
            Phase::Gnn.entry_script_path(framework),
            Path::new("/fw/GNN/Network.py")
        );
    }

    #[test]
    fn test_pae_runs_first() {
        assert_eq!(Phase::ALL, [Phase::Pae, Phase::Gnn]);
        assert_eq!(Phase::Pae.ordinal(), "1/2");
    }
}
