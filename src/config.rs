//! Configuration loading and parsing for `prweave.toml` files.
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::result::Result;

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "prweave.toml";

/// Default branch-name prefix for generated integration branches.
pub const DEFAULT_BRANCH_PREFIX: &str = "weekly-build";

/// Default number of generated branches to keep on the fork.
pub const DEFAULT_BRANCH_RETENTION: usize = 30;

/// Token rename applied to the working tree before publishing.
///
/// Expands into lower / Capitalized / UPPER case-variant rules, each
/// appending the suffix to whole-word occurrences of the token.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameConfig {
    /// Token to rewrite (e.g. "bonsai").
    pub token: String,
    /// Suffix appended to each occurrence (e.g. "PR").
    pub suffix: String,
}

/// Root configuration structure for `prweave.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base branch or tag on the upstream repository that integration
    /// branches are created from.
    pub base_ref: String,
    /// Local path of the working clone.
    pub clone_dir: PathBuf,
    /// Directory where generated reports are written.
    pub report_dir: PathBuf,
    /// Path of the JSON file recording the last observed PR state.
    pub state_file: PathBuf,
    /// Directory containing build artifacts to upload with a release.
    pub dist_dir: PathBuf,
    /// Version string embedded in branch, report, and release names.
    pub version: String,
    /// Prefix for generated integration branch names.
    pub branch_prefix: String,
    /// Number of generated branches to keep on the fork; older ones are
    /// pruned after each push.
    pub branch_retention: usize,
    /// Only process PRs authored by these users. Empty means all users.
    pub authors: Vec<String>,
    /// PR numbers excluded from processing.
    pub excluded_prs: HashSet<u64>,
    /// Optional token rename applied to the tree after merging.
    pub rename: Option<RenameConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_ref: "main".to_string(),
            clone_dir: PathBuf::from("./work"),
            report_dir: PathBuf::from("./reports"),
            state_file: PathBuf::from("./reports/pr_state.json"),
            dist_dir: PathBuf::from("./dist"),
            version: "0.1.0".to_string(),
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            branch_retention: DEFAULT_BRANCH_RETENTION,
            authors: vec![],
            excluded_prs: HashSet::new(),
            rename: None,
        }
    }
}

impl Config {
    /// Load configuration from the given path, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if let Ok(content) = fs::read_to_string(path) {
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }

        Ok(Config::default())
    }

    /// Name of the integration branch for the given build date
    /// (e.g. `weekly-build-0.8.4-alpha260808`).
    pub fn branch_name(&self, date_stamp: &str) -> String {
        format!("{}-{}-alpha{}", self.branch_prefix, self.version, date_stamp)
    }

    /// Path of the report file for the given build date.
    pub fn report_path(&self, date_stamp: &str) -> PathBuf {
        self.report_dir.join(format!(
            "README-{}-{}-alpha{}.txt",
            self.branch_prefix, self.version, date_stamp
        ))
    }

    /// Tag name of the release for the given build date.
    pub fn release_tag(&self, date_stamp: &str) -> String {
        format!("v{}-alpha{}", self.version, date_stamp)
    }
}
