//! Git repository operations and management.
//!
//! This module provides a high-level interface for interacting with the
//! local working clone used by the integration pipeline. It handles:
//!
//! - Cloning or opening the working copy and wiring the upstream remote
//! - Hard-resetting the tree to the upstream base ref between runs
//! - Branch creation, switching, and deletion
//! - Temporary per-PR remotes and non-fast-forward merges with clean aborts
//! - Force-pushing the integration branch to the fork
//!
//! Every phase of the pipeline goes through this handle; the current branch
//! is never left implicit between phases. Authentication uses username/token
//! pairs via Git credential callbacks, suitable for HTTPS remotes.
use color_eyre::eyre::eyre;
use git2::RemoteCallbacks;
use log::*;
use secrecy::ExposeSecret;
use std::path::Path;

use crate::{forge::config::RemoteConfig, result::Result};

/// Name of the remote pointing at the upstream repository. The fork remains
/// "origin", matching the conventional fork-based workflow.
const UPSTREAM_REMOTE: &str = "upstream";

/// Outcome of a single merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    /// Merge commit created (or ref already contained in HEAD).
    Merged,
    /// Index conflicts; the merge was aborted and the tree restored.
    Conflict,
}

/// High-level Git repository interface for the integration pipeline.
///
/// Wraps `git2::Repository` with the operations the pipeline needs. The
/// fork remote ("origin") is authenticated with the configured token; the
/// upstream remote and per-PR remotes are fetched anonymously.
pub struct Repository {
    config: RemoteConfig,
    repo: git2::Repository,
}

/// Create Git authentication callbacks for username/token authentication.
fn get_auth_callbacks<'r>(user: String, token: String) -> RemoteCallbacks<'r> {
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username, _allowed| {
        git2::Cred::userpass_plaintext(&user, &token)
    });
    callbacks
}

impl Repository {
    /// Open an existing working clone, or clone the fork when the path does
    /// not hold a repository yet. Ensures the upstream remote exists.
    pub fn open_or_clone(
        local_path: &Path,
        fork: RemoteConfig,
        upstream_url: &str,
    ) -> Result<Self> {
        let repo = match git2::Repository::open(local_path) {
            Ok(repo) => {
                info!(
                    "using existing working clone at {}",
                    local_path.display()
                );
                repo
            }
            Err(_) => {
                info!(
                    "cloning {} into {}",
                    fork.clone_url(),
                    local_path.display()
                );
                let git_config = git2::Config::open_default()?.snapshot()?;
                let user = git_config.get_str("user.name")?.to_string();
                let token = fork.token.expose_secret().to_string();

                let callbacks = get_auth_callbacks(user, token);
                let mut fetch_options = git2::FetchOptions::new();
                fetch_options.remote_callbacks(callbacks);

                let mut builder = git2::build::RepoBuilder::new();
                builder
                    .fetch_options(fetch_options)
                    .clone(&fork.clone_url(), local_path)?
            }
        };

        if repo.find_remote(UPSTREAM_REMOTE).is_err() {
            repo.remote(UPSTREAM_REMOTE, upstream_url)?;
        }

        Ok(Self { config: fork, repo })
    }

    /// Open an existing repository without touching its remotes.
    pub fn open(local_path: &Path, config: RemoteConfig) -> Result<Self> {
        let repo = git2::Repository::open(local_path)?;
        Ok(Self { config, repo })
    }

    /// Fetch the upstream base ref and hard-reset the current branch and
    /// working tree to it, discarding local changes and untracked files.
    pub fn sync_to_base(&self, base_ref: &str) -> Result<()> {
        info!("syncing working tree to upstream/{base_ref}");

        let mut remote = self.repo.find_remote(UPSTREAM_REMOTE)?;
        remote.fetch(&[base_ref], None, None)?;
        drop(remote);

        // base may be a branch or a tag
        let target = self
            .repo
            .revparse_single(&format!("refs/remotes/{UPSTREAM_REMOTE}/{base_ref}"))
            .or_else(|_| {
                self.repo.revparse_single(&format!("refs/tags/{base_ref}"))
            })
            .map_err(|_| {
                eyre!("could not resolve base ref {base_ref} on upstream")
            })?;

        self.repo.reset(&target, git2::ResetType::Hard, None)?;

        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.repo.checkout_head(Some(&mut checkout))?;

        Ok(())
    }

    /// Create a new branch at the current HEAD, overwriting any existing
    /// branch with the same name.
    pub fn create_branch(&self, branch: &str) -> Result<()> {
        info!("creating branch: {branch}");
        let head = self.repo.head()?;
        let commit = head.peel_to_commit()?;
        self.repo.branch(branch, &commit, true)?;
        Ok(())
    }

    /// Switch to the specified branch and update the working directory.
    pub fn switch_branch(&self, branch: &str) -> Result<()> {
        debug!("switching to branch: {branch}");
        let ref_name = format!("refs/heads/{}", branch);
        let target_obj = self.repo.revparse_single(&ref_name)?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_tree(&target_obj, Some(&mut checkout))?;
        self.repo.set_head(&ref_name)?;
        Ok(())
    }

    /// Delete a local branch. Missing branches are not an error.
    pub fn delete_branch(&self, branch: &str) -> Result<()> {
        match self.repo.find_branch(branch, git2::BranchType::Local) {
            Ok(mut found) => {
                debug!("deleting branch: {branch}");
                found.delete()?;
                Ok(())
            }
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Add a named remote, replacing any stale remote with the same name.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.remove_remote(name);
        self.repo.remote(name, url)?;
        Ok(())
    }

    /// Remove a named remote. Best-effort: failure is logged, not escalated,
    /// since the remote may simply never have existed.
    pub fn remove_remote(&self, name: &str) {
        if let Err(err) = self.repo.remote_delete(name) {
            debug!("could not remove remote {name}: {err}");
        }
    }

    /// Fetch a single ref from a named remote. The fetched tip is left in
    /// FETCH_HEAD for a subsequent merge.
    pub fn fetch_ref(&self, remote_name: &str, refname: &str) -> Result<()> {
        let mut remote = self.repo.find_remote(remote_name)?;
        remote.fetch(&[refname], None, None)?;
        Ok(())
    }

    /// Attempt a non-fast-forward merge of the last fetched ref into the
    /// current branch, committing with the given message on success.
    ///
    /// A merge commit is always created, even when a fast-forward would be
    /// possible. On conflict the merge is aborted and the working tree
    /// restored before returning.
    pub fn merge_no_ff(&self, message: &str) -> Result<MergeStatus> {
        let fetch_head = self.repo.find_reference("FETCH_HEAD")?;
        let annotated = self.repo.reference_to_annotated_commit(&fetch_head)?;

        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;
        if analysis.is_up_to_date() {
            debug!("merge target already contained in HEAD");
            return Ok(MergeStatus::Merged);
        }

        // allow the checkout to proceed on conflicts so they land in the
        // index, where has_conflicts() can classify them
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.allow_conflicts(true).conflict_style_merge(true);
        self.repo.merge(&[&annotated], None, Some(&mut checkout))?;

        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            self.abort_merge();
            return Ok(MergeStatus::Conflict);
        }

        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let head_commit = self.repo.head()?.peel_to_commit()?;
        let their_commit = self.repo.find_commit(annotated.id())?;

        let config = self.repo.config()?.snapshot()?;
        let user = config.get_str("user.name")?;
        let email = config.get_str("user.email")?;
        let committer = git2::Signature::now(user, email)?;

        self.repo.commit(
            Some("HEAD"),
            &committer,
            &committer,
            message,
            &tree,
            &[&head_commit, &their_commit],
        )?;

        self.repo.cleanup_state()?;

        Ok(MergeStatus::Merged)
    }

    /// Abort an in-progress merge, restoring the pre-merge tree. Best-effort
    /// cleanup: failures are logged and swallowed.
    pub fn abort_merge(&self) {
        if let Err(err) = self.repo.cleanup_state() {
            warn!("failed to clean up merge state: {err}");
        }

        let reset = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .and_then(|commit| {
                self.repo.reset(
                    commit.as_object(),
                    git2::ResetType::Hard,
                    None,
                )
            });

        if let Err(err) = reset {
            warn!("failed to reset after aborted merge: {err}");
        }
    }

    /// Stage all changes in the working tree.
    pub fn add_all(&self) -> Result<()> {
        debug!("adding changed files to index");
        let mut index = self.repo.index()?;
        index.add_all(["."], git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        Ok(())
    }

    /// Commit the currently staged changes. Returns false when the index
    /// matches HEAD and there is nothing to commit.
    pub fn commit(&self, msg: &str) -> Result<bool> {
        let mut index = self.repo.index()?;
        let oid = index.write_tree()?;
        let parent_commit = self.repo.head()?.peel_to_commit()?;

        if oid == parent_commit.tree_id() {
            debug!("nothing to commit");
            return Ok(false);
        }

        debug!("committing changes with msg: {msg}");
        let config = self.repo.config()?.snapshot()?;
        let user = config.get_str("user.name")?;
        let email = config.get_str("user.email")?;
        let tree = self.repo.find_tree(oid)?;
        let committer = git2::Signature::now(user, email)?;
        self.repo.commit(
            Some("HEAD"),
            &committer,
            &committer,
            msg,
            &tree,
            &[&parent_commit],
        )?;
        Ok(true)
    }

    /// Short hash of the current HEAD commit.
    pub fn head_sha(&self) -> Result<String> {
        let commit = self.repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Force-push a local branch to the fork remote.
    pub fn push_branch(&self, branch: &str) -> Result<()> {
        info!("pushing branch {branch}");
        let config = self.repo.config()?.snapshot()?;
        let user = config.get_str("user.name")?;
        let token = self.config.token.expose_secret().to_string();
        let callbacks = get_auth_callbacks(user.into(), token);
        let mut push_opts = git2::PushOptions::default();
        push_opts.remote_callbacks(callbacks);

        let mut remote = self.repo.find_remote("origin")?;

        // + indicates "force" push
        let ref_spec = format!("+refs/heads/{branch}");
        remote.push(&[ref_spec], Some(&mut push_opts))?;

        Ok(())
    }

    /// Working directory of the repository.
    pub fn workdir(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .ok_or_else(|| eyre!("repository has no working directory"))
    }
}
