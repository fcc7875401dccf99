//! Isolation retester for PRs that failed during the sequential merge.
//!
//! A PR can fail the sequential pass either because it conflicts with
//! another PR merged before it, or because it no longer applies to the base
//! at all. Re-attempting each failed PR alone on a disposable branch from
//! the clean base distinguishes the two.
use log::*;
use std::collections::HashMap;
use std::fmt;

use crate::{
    forge::types::PullRequest,
    repo::{MergeStatus, Repository},
    result::Result,
};

/// Classification of a failed PR after an isolated merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetestOutcome {
    /// Not retested (retest errored before a verdict).
    #[default]
    Unknown,
    /// Merges cleanly alone; the sequential failure came from another PR.
    ConflictsWithOthers,
    /// Fails even against the clean base.
    FailsAgainstBase,
}

impl fmt::Display for RetestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RetestOutcome::Unknown => "Merge conflict or git error",
            RetestOutcome::ConflictsWithOthers => {
                "Merges cleanly against base (conflict with other PRs)"
            }
            RetestOutcome::FailsAgainstBase => {
                "Fails to merge even against clean base"
            }
        };
        write!(f, "{reason}")
    }
}

/// Retest each failed PR alone against the clean base branch.
///
/// Never touches the integration branch. The working tree is left on the
/// base branch when done; the caller re-checkouts the integration branch at
/// the next phase boundary.
pub fn retest_failed(
    repo: &Repository,
    base_branch: &str,
    failed: &[&PullRequest],
) -> Result<HashMap<u64, RetestOutcome>> {
    let mut outcomes = HashMap::new();

    if failed.is_empty() {
        return Ok(outcomes);
    }

    info!(
        "retesting {} failed PR(s) in isolation against {base_branch}",
        failed.len()
    );

    for pr in failed {
        let outcome = retest_one(repo, base_branch, pr);
        match outcome {
            RetestOutcome::ConflictsWithOthers => info!(
                "PR #{} merges cleanly alone: conflicts with other PRs",
                pr.number
            ),
            RetestOutcome::FailsAgainstBase => {
                info!("PR #{} fails even against clean base", pr.number)
            }
            RetestOutcome::Unknown => {
                warn!("PR #{} could not be retested", pr.number)
            }
        }
        outcomes.insert(pr.number, outcome);
    }

    Ok(outcomes)
}

fn retest_one(
    repo: &Repository,
    base_branch: &str,
    pr: &PullRequest,
) -> RetestOutcome {
    // skip-classified PRs never reach the failed set, so head info is
    // present here; guard anyway rather than panic
    let Some(head) = &pr.head else {
        return RetestOutcome::Unknown;
    };
    let Some(head_repo) = &head.repo else {
        return RetestOutcome::Unknown;
    };

    let scratch_branch = format!("retest-pr-{}", pr.number);
    let remote_name = format!("pr-{}", pr.number);

    let outcome = (|| -> Result<RetestOutcome> {
        repo.switch_branch(base_branch)?;
        repo.delete_branch(&scratch_branch)?;
        repo.create_branch(&scratch_branch)?;
        repo.switch_branch(&scratch_branch)?;

        repo.add_remote(&remote_name, &head_repo.clone_url)?;
        repo.fetch_ref(&remote_name, &head.branch)?;

        let message =
            format!("Retest merge PR #{}: {}", pr.number, pr.title);
        let status = repo.merge_no_ff(&message)?;

        Ok(match status {
            MergeStatus::Merged => RetestOutcome::ConflictsWithOthers,
            MergeStatus::Conflict => RetestOutcome::FailsAgainstBase,
        })
    })();

    // cleanup runs on every path; its own failures are logged, not escalated
    repo.abort_merge();
    repo.remove_remote(&remote_name);
    if let Err(err) = repo
        .switch_branch(base_branch)
        .and_then(|_| repo.delete_branch(&scratch_branch))
    {
        warn!(
            "failed to clean up retest branch {scratch_branch}: {err}"
        );
    }

    match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("retest of PR #{} errored: {err}", pr.number);
            RetestOutcome::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge;
    use crate::test_helpers;
    use std::collections::HashSet;

    #[test_log::test]
    fn conflict_with_sibling_pr_is_detected() {
        let fixture = test_helpers::MergeFixture::new();
        fixture.add_pr_branch("pr-10", "shared.txt", "ten\n");
        fixture.add_pr_branch("pr-11", "shared.txt", "eleven\n");
        fixture.add_pr_branch("pr-12", "twelve.txt", "twelve\n");

        let prs = vec![
            fixture.pull_request(10, "pr-10"),
            fixture.pull_request(11, "pr-11"),
            fixture.pull_request(12, "pr-12"),
        ];

        let repo = fixture.work_repo();
        let summary =
            merge::apply_prs(&repo, "integration", &prs, &HashSet::new())
                .unwrap();

        let failed: Vec<&crate::forge::types::PullRequest> =
            summary.failed().iter().map(|r| &r.pr).collect();
        let outcomes =
            retest_failed(&repo, test_helpers::BASE_BRANCH, &failed)
                .unwrap();

        assert_eq!(
            outcomes.get(&11),
            Some(&RetestOutcome::ConflictsWithOthers)
        );
    }

    #[test]
    fn broken_against_base_is_detected() {
        let fixture = test_helpers::MergeFixture::new();
        // pr-13 branches from the original base, then the base moves on with
        // a conflicting edit to the same file
        fixture.add_pr_branch("pr-13", "shared.txt", "thirteen\n");
        fixture.advance_base("shared.txt", "base has moved on\n");

        let prs = vec![fixture.pull_request(13, "pr-13")];

        let repo = fixture.work_repo();
        let summary =
            merge::apply_prs(&repo, "integration", &prs, &HashSet::new())
                .unwrap();
        assert_eq!(summary.failed().len(), 1);

        let failed: Vec<&crate::forge::types::PullRequest> =
            summary.failed().iter().map(|r| &r.pr).collect();
        let outcomes =
            retest_failed(&repo, test_helpers::BASE_BRANCH, &failed)
                .unwrap();

        assert_eq!(
            outcomes.get(&13),
            Some(&RetestOutcome::FailsAgainstBase)
        );
    }

    #[test]
    fn leaves_working_tree_on_base_branch() {
        let fixture = test_helpers::MergeFixture::new();
        fixture.add_pr_branch("pr-10", "shared.txt", "ten\n");
        fixture.add_pr_branch("pr-11", "shared.txt", "eleven\n");

        let prs = vec![
            fixture.pull_request(10, "pr-10"),
            fixture.pull_request(11, "pr-11"),
        ];

        let repo = fixture.work_repo();
        let summary =
            merge::apply_prs(&repo, "integration", &prs, &HashSet::new())
                .unwrap();

        let failed: Vec<&crate::forge::types::PullRequest> =
            summary.failed().iter().map(|r| &r.pr).collect();
        retest_failed(&repo, test_helpers::BASE_BRANCH, &failed).unwrap();

        // integration branch still exists and can be checked out again
        repo.switch_branch("integration").unwrap();
    }

    #[test]
    fn empty_failed_set_is_a_no_op() {
        let fixture = test_helpers::MergeFixture::new();
        let repo = fixture.work_repo();
        let outcomes =
            retest_failed(&repo, test_helpers::BASE_BRANCH, &[]).unwrap();
        assert!(outcomes.is_empty());
    }
}
