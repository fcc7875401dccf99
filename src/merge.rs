//! Sequential merge engine for open pull requests.
//!
//! Builds a fresh integration branch from the base and merges each PR onto
//! it in order. Later PRs merge against the effects of earlier ones, so
//! outcomes are order-dependent by design; the caller controls the order
//! (ascending or descending PR number).
use log::*;
use std::collections::HashSet;
use std::fmt;

use crate::{
    forge::types::PullRequest,
    repo::{MergeStatus, Repository},
    result::Result,
};

/// Why a PR was never attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Excluded by configuration.
    Excluded,
    /// PR is in draft status.
    Draft,
    /// Head repository deleted or inaccessible.
    InaccessibleFork,
    /// Head ref or clone URL missing from the PR payload.
    MissingRefInfo,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::Excluded => "Excluded by configuration",
            SkipReason::Draft => "DRAFT status",
            SkipReason::InaccessibleFork => {
                "Repository no longer accessible (deleted fork)"
            }
            SkipReason::MissingRefInfo => "Missing required PR information",
        };
        write!(f, "{reason}")
    }
}

/// Terminal state of a PR within a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Merged onto the integration branch.
    Applied,
    /// Attempted but not merged.
    Failed { reason: String },
    /// Never attempted.
    Skipped(SkipReason),
}

/// One PR paired with its terminal outcome, in processing order.
#[derive(Debug, Clone)]
pub struct MergeRecord {
    pub pr: PullRequest,
    pub outcome: MergeOutcome,
}

/// Result of a full merge pass.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub records: Vec<MergeRecord>,
}

impl MergeSummary {
    pub fn applied(&self) -> Vec<&MergeRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, MergeOutcome::Applied))
            .collect()
    }

    pub fn failed(&self) -> Vec<&MergeRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, MergeOutcome::Failed { .. }))
            .collect()
    }

    pub fn skipped(&self) -> Vec<&MergeRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, MergeOutcome::Skipped(_)))
            .collect()
    }
}

/// Merge every PR onto a freshly created integration branch.
///
/// The caller must leave HEAD on the clean base before calling; the engine
/// deletes and recreates `branch` from it, then processes `prs` strictly in
/// the given order. Every PR ends in exactly one terminal outcome.
pub fn apply_prs(
    repo: &Repository,
    branch: &str,
    prs: &[PullRequest],
    excluded: &HashSet<u64>,
) -> Result<MergeSummary> {
    repo.delete_branch(branch)?;
    repo.create_branch(branch)?;
    repo.switch_branch(branch)?;

    let mut summary = MergeSummary::default();

    for pr in prs {
        let outcome = merge_one(repo, pr, excluded);

        match &outcome {
            MergeOutcome::Applied => {
                info!("applied PR #{}: {}", pr.number, pr.title)
            }
            MergeOutcome::Failed { reason } => {
                warn!("failed to apply PR #{}: {reason}", pr.number)
            }
            MergeOutcome::Skipped(reason) => {
                info!("skipping PR #{}: {reason}", pr.number)
            }
        }

        summary.records.push(MergeRecord {
            pr: pr.clone(),
            outcome,
        });
    }

    info!(
        "merge pass complete: {} applied, {} failed, {} skipped",
        summary.applied().len(),
        summary.failed().len(),
        summary.skipped().len()
    );

    Ok(summary)
}

/// Classify and, when eligible, merge a single PR onto the current branch.
fn merge_one(
    repo: &Repository,
    pr: &PullRequest,
    excluded: &HashSet<u64>,
) -> MergeOutcome {
    if excluded.contains(&pr.number) {
        return MergeOutcome::Skipped(SkipReason::Excluded);
    }

    if pr.draft {
        return MergeOutcome::Skipped(SkipReason::Draft);
    }

    let Some(head) = &pr.head else {
        return MergeOutcome::Skipped(SkipReason::InaccessibleFork);
    };

    let Some(head_repo) = &head.repo else {
        return MergeOutcome::Skipped(SkipReason::InaccessibleFork);
    };

    if head.branch.is_empty() || head_repo.clone_url.is_empty() {
        return MergeOutcome::Skipped(SkipReason::MissingRefInfo);
    }

    let remote_name = format!("pr-{}", pr.number);

    if let Err(err) = repo.add_remote(&remote_name, &head_repo.clone_url) {
        return MergeOutcome::Failed {
            reason: format!("Could not add PR remote: {err}"),
        };
    }

    if let Err(err) = repo.fetch_ref(&remote_name, &head.branch) {
        repo.remove_remote(&remote_name);
        return MergeOutcome::Failed {
            reason: format!("Failed to fetch PR head: {err}"),
        };
    }

    let message = format!("Merge PR #{}: {}", pr.number, pr.title);
    let outcome = match repo.merge_no_ff(&message) {
        Ok(MergeStatus::Merged) => MergeOutcome::Applied,
        Ok(MergeStatus::Conflict) => MergeOutcome::Failed {
            reason: "Merge conflict or git error".to_string(),
        },
        Err(err) => {
            repo.abort_merge();
            MergeOutcome::Failed {
                reason: format!("Merge conflict or git error: {err}"),
            }
        }
    };

    // cleanup is idempotent and runs regardless of outcome
    repo.remove_remote(&remote_name);

    outcome
}
