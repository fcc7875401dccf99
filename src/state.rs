//! PR state snapshots for change detection between runs.
//!
//! A build is only worth running when something about the open PR set
//! changed: a PR opened or closed, went in or out of draft, or received new
//! commits. The snapshot is a SHA-256 digest over a normalized, sorted
//! representation of the relevant PR fields, persisted to a small JSON file
//! between runs.
use chrono::Local;
use log::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::{forge::types::PullRequest, result::Result};

/// Normalized PR fields that trigger a rebuild when they change.
#[derive(Debug, Serialize)]
struct PrStateRecord<'a> {
    number: u64,
    updated_at: &'a str,
    draft: bool,
    head_sha: Option<&'a str>,
    state: &'a str,
    mergeable: Option<bool>,
}

/// Persisted snapshot of the last observed PR state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub hash: String,
    pub pr_count: usize,
    pub timestamp: String,
    pub checked_at: String,
}

/// Digest of the current open PR set. Excluded PRs and PRs with an
/// inaccessible head repository are left out; records are sorted by number
/// so the digest is independent of API ordering.
pub fn state_digest(
    prs: &[PullRequest],
    excluded: &HashSet<u64>,
) -> (String, usize) {
    let mut records: Vec<PrStateRecord> = prs
        .iter()
        .filter(|pr| !excluded.contains(&pr.number))
        .filter(|pr| {
            pr.head.as_ref().is_some_and(|head| head.repo.is_some())
        })
        .map(|pr| PrStateRecord {
            number: pr.number,
            updated_at: &pr.updated_at,
            draft: pr.draft,
            head_sha: pr.head.as_ref().map(|head| head.sha.as_str()),
            state: &pr.state,
            mergeable: pr.mergeable,
        })
        .collect();

    records.sort_by_key(|record| record.number);
    let count = records.len();

    let canonical =
        serde_json::to_string(&records).expect("state records serialize");
    let digest = Sha256::digest(canonical.as_bytes());

    (hex::encode(digest), count)
}

/// Load the previous snapshot. Returns None when the file is missing or
/// unreadable; a corrupt snapshot just means "rebuild".
pub fn load_state(path: &Path) -> Option<StateFile> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!("could not parse previous state file: {err}");
            None
        }
    }
}

/// Overwrite the snapshot file with the current state.
pub fn save_state(path: &Path, hash: &str, pr_count: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let now = Local::now().to_rfc3339();
    let state = StateFile {
        hash: hash.to_string(),
        pr_count,
        timestamp: now.clone(),
        checked_at: now,
    };

    fs::write(path, serde_json::to_string_pretty(&state)?)?;
    Ok(())
}

/// Compare the current digest against the stored snapshot and persist the
/// new state. Returns true when a rebuild is needed.
pub fn check_and_update(
    path: &Path,
    prs: &[PullRequest],
    excluded: &HashSet<u64>,
) -> Result<bool> {
    let (digest, count) = state_digest(prs, excluded);

    let changed = match load_state(path) {
        None => {
            info!("no previous PR state found: initial build needed");
            true
        }
        Some(previous) if previous.hash != digest => {
            info!(
                "PR state changed ({} -> {} relevant PRs): rebuild needed",
                previous.pr_count, count
            );
            true
        }
        Some(_) => {
            info!("PR state unchanged ({count} relevant PRs)");
            false
        }
    };

    if changed {
        save_state(path, &digest, count)?;
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers;
    use tempfile::TempDir;

    fn prs() -> Vec<PullRequest> {
        let fixture = test_helpers::MergeFixture::new();
        vec![
            fixture.pull_request(10, "pr-10"),
            fixture.pull_request(11, "pr-11"),
        ]
    }

    #[test]
    fn digest_is_stable_for_same_input() {
        let prs = prs();
        let excluded = HashSet::new();
        let (first, count) = state_digest(&prs, &excluded);
        let (second, _) = state_digest(&prs, &excluded);
        assert_eq!(first, second);
        assert_eq!(count, 2);
    }

    #[test]
    fn digest_ignores_api_ordering() {
        let prs = prs();
        let reversed: Vec<PullRequest> =
            prs.iter().rev().cloned().collect();
        let excluded = HashSet::new();
        assert_eq!(
            state_digest(&prs, &excluded).0,
            state_digest(&reversed, &excluded).0
        );
    }

    #[test]
    fn digest_changes_with_head_sha() {
        let mut prs = prs();
        let excluded = HashSet::new();
        let (before, _) = state_digest(&prs, &excluded);

        prs[0].head.as_mut().unwrap().sha = "different".into();
        let (after, _) = state_digest(&prs, &excluded);
        assert_ne!(before, after);
    }

    #[test]
    fn digest_skips_excluded_and_inaccessible_prs() {
        let mut prs = prs();
        prs.push(test_helpers::pull_request_without_fork(12));

        let excluded = HashSet::from([11]);
        let (_, count) = state_digest(&prs, &excluded);
        assert_eq!(count, 1);
    }

    #[test]
    fn first_check_reports_changes_and_saves_state() {
        let dir = TempDir::new().unwrap();
        let state_path = dir.path().join("logs/pr_state.json");
        let prs = prs();
        let excluded = HashSet::new();

        assert!(check_and_update(&state_path, &prs, &excluded).unwrap());
        // unchanged on the second check
        assert!(!check_and_update(&state_path, &prs, &excluded).unwrap());

        let saved = load_state(&state_path).unwrap();
        assert_eq!(saved.pr_count, 2);
    }

    #[test]
    fn updated_pr_triggers_rebuild() {
        let dir = TempDir::new().unwrap();
        let state_path = dir.path().join("pr_state.json");
        let mut prs = prs();
        let excluded = HashSet::new();

        check_and_update(&state_path, &prs, &excluded).unwrap();

        prs[1].updated_at = "2026-08-07T09:00:00Z".into();
        assert!(check_and_update(&state_path, &prs, &excluded).unwrap());
    }

    #[test]
    fn corrupt_state_file_means_rebuild() {
        let dir = TempDir::new().unwrap();
        let state_path = dir.path().join("pr_state.json");
        fs::write(&state_path, "not json").unwrap();

        let prs = prs();
        assert!(
            check_and_update(&state_path, &prs, &HashSet::new()).unwrap()
        );
    }
}
