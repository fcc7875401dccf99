//! CLI argument parsing and remote repository configuration.
use clap::{Parser, Subcommand};
use color_eyre::eyre::{ContextCompat, eyre};
use git_url_parse::GitUrl;
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;

use crate::{config::DEFAULT_CONFIG_FILE, forge::config::RemoteConfig, result::Result};

/// Global CLI arguments for repository configuration and debugging.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    /// Path to the prweave configuration file.
    pub config: PathBuf,

    #[arg(long, default_value = "", global = true)]
    /// Upstream repository URL (https://github.com/owner/repo).
    pub upstream_repo: String,

    #[arg(long, default_value = "", global = true)]
    /// Fork repository URL used as the integration staging area.
    pub fork_repo: String,

    #[arg(long, default_value = "", global = true)]
    /// GitHub access token. Falls back to GITHUB_TOKEN env var.
    pub github_token: String,

    #[arg(long, default_value_t = false, global = true)]
    /// Enable debug logging.
    pub debug: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Integration pipeline subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline: sync, merge open PRs, retest failures,
    /// generate the report, and publish the integration branch.
    Build {
        /// Process PRs newest-first instead of oldest-first.
        #[arg(long, default_value_t = false)]
        reverse: bool,

        /// Build even if no PR changes were detected since the last run.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Stop after report generation; do not push or prune branches.
        #[arg(long, default_value_t = false)]
        no_push: bool,
    },

    /// Check whether open PRs changed since the last recorded snapshot.
    /// Exits 0 when a rebuild is needed, 1 when nothing changed.
    Check,

    /// Apply the configured token rename to a directory tree.
    Rename {
        /// Root directory to rewrite.
        #[arg(long)]
        dir: PathBuf,
    },

    /// Create the dated prerelease and upload build artifacts and the report.
    Release {
        /// Only upload artifacts whose filename contains this platform name.
        #[arg(long)]
        platform: Option<String>,
    },
}

impl Args {
    /// Remote configuration for the upstream repository (PRs are fetched
    /// from here).
    pub fn upstream_remote(&self) -> Result<RemoteConfig> {
        if self.upstream_repo.is_empty() {
            return Err(eyre!("must configure an upstream repo"));
        }
        parse_remote(&self.upstream_repo, &self.resolve_token()?)
    }

    /// Remote configuration for the fork repository (the integration branch,
    /// generated branches, and releases live here).
    pub fn fork_remote(&self) -> Result<RemoteConfig> {
        if self.fork_repo.is_empty() {
            return Err(eyre!("must configure a fork repo"));
        }
        parse_remote(&self.fork_repo, &self.resolve_token()?)
    }

    /// Resolve the API token from the CLI flag or the GITHUB_TOKEN env var.
    fn resolve_token(&self) -> Result<String> {
        let mut token = self.github_token.clone();

        if token.is_empty()
            && let Ok(env_var_token) = env::var("GITHUB_TOKEN")
        {
            token = env_var_token;
        }

        if token.is_empty() {
            return Err(eyre!("must set github token"));
        }

        Ok(token)
    }
}

/// Validate repository URL uses HTTP or HTTPS scheme.
fn validate_scheme(scheme: git_url_parse::Scheme) -> Result<()> {
    match scheme {
        git_url_parse::Scheme::Http => Ok(()),
        git_url_parse::Scheme::Https => Ok(()),
        _ => Err(eyre!(
            "only http and https schemes are supported for repo urls"
        )),
    }
}

/// Parse a repository URL into a remote configuration.
fn parse_remote(repo_url: &str, token: &str) -> Result<RemoteConfig> {
    let parsed = GitUrl::parse(repo_url)?;

    validate_scheme(parsed.scheme)?;

    let host = parsed
        .host
        .ok_or(eyre!("unable to parse host from repo url"))?;

    let owner = parsed
        .owner
        .ok_or(eyre!("unable to parse owner from repo url"))?;

    let repo = parsed.name.trim_end_matches(".git").to_string();

    let project_path = parsed
        .path
        .strip_prefix("/")
        .wrap_err("failed to process project path")?
        .trim_end_matches(".git")
        .to_string();

    Ok(RemoteConfig {
        host,
        scheme: parsed.scheme.to_string(),
        owner,
        repo,
        path: project_path,
        token: SecretString::from(token.to_string()),
    })
}
