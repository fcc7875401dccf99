//! Traits related to remote git forges
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::path::Path;

use crate::forge::types::{
    Branch, CreateReleaseRequest, PullRequest, Release, ReleaseAsset,
};
use crate::result::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Forge {
    /// List all open pull requests, optionally filtered to the given
    /// authors. Returns whatever was collected so far if a page request
    /// fails.
    async fn list_open_prs(
        &self,
        authors: &[String],
    ) -> Result<Vec<PullRequest>>;

    /// List branches on the repository, bounded by a hard page cap.
    async fn list_branches(&self) -> Result<Vec<Branch>>;

    /// Delete a branch by name.
    async fn delete_branch(&self, name: &str) -> Result<()>;

    /// Look up a release by tag. Returns None when no release exists.
    async fn get_release_by_tag(&self, tag: &str) -> Result<Option<Release>>;

    /// Create a new release.
    async fn create_release(
        &self,
        req: CreateReleaseRequest,
    ) -> Result<Release>;

    /// List assets already attached to a release.
    async fn list_release_assets(
        &self,
        release_id: u64,
    ) -> Result<Vec<ReleaseAsset>>;

    /// Upload a file as a release asset.
    async fn upload_release_asset(
        &self,
        release_id: u64,
        asset_name: &str,
        file_path: &Path,
    ) -> Result<()>;
}
