//! Shared git fixtures for merge and retest tests.
//!
//! Builds a throwaway "upstream" repository with PR branches plus a working
//! clone for the engine to operate on, all inside temp directories.
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::forge::config::RemoteConfig;
use crate::forge::types::{PrAuthor, PrHead, PrRepo, PullRequest};
use crate::repo::Repository;

/// Branch name used as the integration base in fixtures.
pub const BASE_BRANCH: &str = "main";

pub struct MergeFixture {
    upstream: TempDir,
    work: TempDir,
    work_clone: OnceCell<PathBuf>,
}

fn set_test_identity(repo: &git2::Repository) {
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Fixture").unwrap();
    config.set_str("user.email", "fixture@example.com").unwrap();
}

fn commit_file(
    repo: &git2::Repository,
    workdir: &Path,
    file: &str,
    content: &str,
    message: &str,
) {
    fs::write(workdir.join(file), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(file)).unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = repo.signature().unwrap();

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

fn checkout_branch(repo: &git2::Repository, branch: &str) {
    let ref_name = format!("refs/heads/{branch}");
    let obj = repo.revparse_single(&ref_name).unwrap();
    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(&obj, Some(&mut checkout)).unwrap();
    repo.set_head(&ref_name).unwrap();
}

impl MergeFixture {
    /// Upstream repo with a single base commit on `main` containing
    /// `shared.txt`.
    pub fn new() -> Self {
        let upstream = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();

        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head(BASE_BRANCH);
        let repo =
            git2::Repository::init_opts(upstream.path(), &opts).unwrap();
        set_test_identity(&repo);
        commit_file(
            &repo,
            upstream.path(),
            "shared.txt",
            "base\n",
            "initial commit",
        );

        Self {
            upstream,
            work,
            work_clone: OnceCell::new(),
        }
    }

    fn upstream_url(&self) -> String {
        self.upstream.path().to_string_lossy().to_string()
    }

    /// Create a PR branch off the base branch's current tip, committing one
    /// file change on it, then return the upstream to the base branch.
    pub fn add_pr_branch(&self, branch: &str, file: &str, content: &str) {
        let repo = git2::Repository::open(self.upstream.path()).unwrap();
        let base_commit = repo
            .find_branch(BASE_BRANCH, git2::BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap();
        repo.branch(branch, &base_commit, true).unwrap();
        checkout_branch(&repo, branch);
        commit_file(
            &repo,
            self.upstream.path(),
            file,
            content,
            &format!("change on {branch}"),
        );
        checkout_branch(&repo, BASE_BRANCH);
    }

    /// Advance the upstream base branch with another commit. Call before the
    /// first `work_repo()` so the clone picks it up.
    pub fn advance_base(&self, file: &str, content: &str) {
        let repo = git2::Repository::open(self.upstream.path()).unwrap();
        checkout_branch(&repo, BASE_BRANCH);
        commit_file(
            &repo,
            self.upstream.path(),
            file,
            content,
            "advance base",
        );
    }

    /// The working clone the engine operates on. Cloned from the upstream
    /// fixture on first use; HEAD starts on the base branch.
    pub fn work_repo(&self) -> Repository {
        let path = self.work_clone.get_or_init(|| {
            let dest = self.work.path().join("clone");
            let cloned = git2::build::RepoBuilder::new()
                .clone(&self.upstream_url(), &dest)
                .unwrap();
            set_test_identity(&cloned);
            dest
        });

        Repository::open(path, RemoteConfig::default()).unwrap()
    }

    /// A PR whose head lives on the upstream fixture repo.
    pub fn pull_request(&self, number: u64, head_ref: &str) -> PullRequest {
        PullRequest {
            number,
            title: format!("Test PR {number}"),
            user: PrAuthor {
                login: "fixture-author".into(),
            },
            html_url: format!(
                "https://github.com/fixture/repo/pull/{number}"
            ),
            state: "open".into(),
            draft: false,
            created_at: "2026-08-01T10:00:00Z".into(),
            updated_at: "2026-08-02T10:00:00Z".into(),
            head: Some(PrHead {
                branch: head_ref.into(),
                sha: format!("sha-{number}"),
                repo: Some(PrRepo {
                    clone_url: self.upstream_url(),
                }),
            }),
            mergeable: None,
        }
    }
}

/// A PR whose head repository has been deleted.
pub fn pull_request_without_fork(number: u64) -> PullRequest {
    PullRequest {
        number,
        title: format!("Orphaned PR {number}"),
        user: PrAuthor {
            login: "gone".into(),
        },
        html_url: format!("https://github.com/fixture/repo/pull/{number}"),
        state: "open".into(),
        draft: false,
        created_at: "2026-08-01T10:00:00Z".into(),
        updated_at: "2026-08-02T10:00:00Z".into(),
        head: Some(PrHead {
            branch: "lost".into(),
            sha: format!("sha-{number}"),
            repo: None,
        }),
        mergeable: None,
    }
}
