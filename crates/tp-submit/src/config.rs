//! Submit configuration (`[submit]` section of .tp/config.toml)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Branch, remote, and PR settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    /// Git remote name
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Target branch for PRs and the start point for new branches
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Branch naming prefix (e.g., "feature/"); empty means none
    #[serde(default)]
    pub branch_prefix: String,

    /// Open PRs as drafts
    #[serde(default)]
    pub draft: bool,

    /// Path to PR body template (optional)
    pub pr_template: Option<PathBuf>,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            base_branch: default_base_branch(),
            branch_prefix: String::new(),
            draft: false,
            pr_template: None,
        }
    }
}

// Serde default functions
fn default_remote() -> String {
    "origin".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}
