//! Configuration for forge platform connections.
use secrecy::SecretString;

/// Page size for paginated list endpoints.
pub const DEFAULT_PAGE_SIZE: u8 = 100;

/// Hard cap on branch-listing pages; bounds worst-case work when a fork has
/// accumulated an unexpected number of branches.
pub const MAX_BRANCH_PAGES: u32 = 10;

/// Remote repository connection configuration for authenticating and
/// interacting with the forge API.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Forge host (e.g., "github.com").
    pub host: String,
    /// URL scheme (http or https).
    pub scheme: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Full repository path ("owner/repo").
    pub path: String,
    /// Access token for authentication.
    pub token: SecretString,
}

impl RemoteConfig {
    /// Public https clone URL for this repository.
    pub fn clone_url(&self) -> String {
        format!("{}://{}/{}.git", self.scheme, self.host, self.path)
    }

    /// Browser URL of a branch on this repository.
    pub fn branch_url(&self, branch: &str) -> String {
        format!(
            "{}://{}/{}/tree/{}",
            self.scheme, self.host, self.path, branch
        )
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            scheme: "https".to_string(),
            owner: "".to_string(),
            repo: "".to_string(),
            path: "".to_string(),
            token: SecretString::from("".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls_from_path() {
        let config = RemoteConfig {
            path: "owner/repo".into(),
            ..RemoteConfig::default()
        };
        assert_eq!(config.clone_url(), "https://github.com/owner/repo.git");
        assert_eq!(
            config.branch_url("weekly-build-1"),
            "https://github.com/owner/repo/tree/weekly-build-1"
        );
    }
}
