//! Payload types for the forge REST API.
use serde::{Deserialize, Serialize};

/// Head repository of a pull request. Null in the API when the fork has
/// been deleted.
#[derive(Debug, Clone, Deserialize)]
pub struct PrRepo {
    pub clone_url: String,
}

/// Head ref information of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PrHead {
    #[serde(rename = "ref")]
    pub branch: String,
    pub sha: String,
    pub repo: Option<PrRepo>,
}

/// Author of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PrAuthor {
    pub login: String,
}

/// An open pull request as returned by the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub user: PrAuthor,
    pub html_url: String,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub created_at: String,
    pub updated_at: String,
    pub head: Option<PrHead>,
    #[serde(default)]
    pub mergeable: Option<bool>,
}

/// A branch as returned by the branch list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// Request body for creating a release.
#[derive(Debug, Clone, Serialize)]
pub struct CreateReleaseRequest {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

/// A release as returned by the release endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    pub html_url: String,
}

/// An uploaded release asset.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
}
