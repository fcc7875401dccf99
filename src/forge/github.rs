//! Implements the Forge trait for GitHub
use async_trait::async_trait;
use log::*;
use reqwest::{
    Client, StatusCode, Url,
    header::{HeaderMap, HeaderValue},
};
use secrecy::ExposeSecret;
use std::path::Path;
use tokio::fs;

use crate::{
    forge::{
        config::{DEFAULT_PAGE_SIZE, MAX_BRANCH_PAGES, RemoteConfig},
        traits::Forge,
        types::{
            Branch, CreateReleaseRequest, PullRequest, Release, ReleaseAsset,
        },
    },
    result::Result,
};

const USER_AGENT: &str = concat!("prweave/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

/// GitHub forge implementation using reqwest for API interactions with
/// pull requests, branches, and releases.
pub struct Github {
    config: RemoteConfig,
    base_url: Url,
    upload_url: Url,
    client: Client,
}

impl Github {
    /// Create a GitHub client with token authentication. Handles both
    /// github.com and GitHub Enterprise hosts.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let token = config.token.expose_secret();

        let mut headers = HeaderMap::new();

        let token_value =
            HeaderValue::from_str(format!("token {}", token).as_str())?;
        headers.append("Authorization", token_value);
        headers.append(
            "Accept",
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.append(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        let (api_base, upload_base) = if config.host == "github.com" {
            (
                format!(
                    "{}://api.github.com/repos/{}/",
                    config.scheme, config.path
                ),
                format!(
                    "{}://uploads.github.com/repos/{}/",
                    config.scheme, config.path
                ),
            )
        } else {
            let base = format!(
                "{}://{}/api/v3/repos/{}/",
                config.scheme, config.host, config.path
            );
            (base.clone(), base)
        };

        let base_url = Url::parse(&api_base)?;
        let upload_url = Url::parse(&upload_base)?;

        Ok(Self {
            config,
            base_url,
            upload_url,
            client,
        })
    }
}

#[async_trait]
impl Forge for Github {
    async fn list_open_prs(
        &self,
        authors: &[String],
    ) -> Result<Vec<PullRequest>> {
        let mut page = 1u32;
        let mut all: Vec<PullRequest> = vec![];

        loop {
            let mut pulls_url = self.base_url.join("pulls")?;

            pulls_url
                .query_pairs_mut()
                .append_pair("state", "open")
                .append_pair("per_page", &DEFAULT_PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let request = self.client.get(pulls_url).build()?;
            let response = match self.client.execute(request).await {
                Ok(response) => response,
                Err(err) => {
                    warn!("error fetching pull requests page {page}: {err}");
                    break;
                }
            };

            if !response.status().is_success() {
                warn!(
                    "error fetching pull requests page {page}: status {}",
                    response.status()
                );
                break;
            }

            let prs: Vec<PullRequest> = match response.json().await {
                Ok(prs) => prs,
                Err(err) => {
                    warn!("error decoding pull requests page {page}: {err}");
                    break;
                }
            };

            let page_len = prs.len();
            if page_len == 0 {
                break;
            }

            // author filter applies per page, before accumulation
            all.extend(prs.into_iter().filter(|pr| {
                authors.is_empty() || authors.contains(&pr.user.login)
            }));

            if page_len < DEFAULT_PAGE_SIZE as usize {
                break;
            }

            page += 1;
        }

        info!(
            "found {} open pull requests for {}",
            all.len(),
            self.config.path
        );

        Ok(all)
    }

    async fn list_branches(&self) -> Result<Vec<Branch>> {
        let mut page = 1u32;
        let mut branches: Vec<Branch> = vec![];

        while page <= MAX_BRANCH_PAGES {
            let mut branches_url = self.base_url.join("branches")?;

            branches_url
                .query_pairs_mut()
                .append_pair("per_page", &DEFAULT_PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let request = self.client.get(branches_url).build()?;
            let response = self.client.execute(request).await?;
            let result = response.error_for_status()?;
            let page_branches: Vec<Branch> = result.json().await?;

            let page_len = page_branches.len();
            branches.extend(page_branches);

            if page_len < DEFAULT_PAGE_SIZE as usize {
                break;
            }

            page += 1;
        }

        Ok(branches)
    }

    async fn delete_branch(&self, name: &str) -> Result<()> {
        let url = self.base_url.join(&format!("git/refs/heads/{name}"))?;
        let request = self.client.delete(url).build()?;
        let response = self.client.execute(request).await?;
        response.error_for_status()?;
        Ok(())
    }

    async fn get_release_by_tag(&self, tag: &str) -> Result<Option<Release>> {
        let url = self.base_url.join(&format!("releases/tags/{tag}"))?;
        let request = self.client.get(url).build()?;
        let response = self.client.execute(request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let result = response.error_for_status()?;
        let release: Release = result.json().await?;
        Ok(Some(release))
    }

    async fn create_release(
        &self,
        req: CreateReleaseRequest,
    ) -> Result<Release> {
        let url = self.base_url.join("releases")?;
        let request = self.client.post(url).json(&req).build()?;
        let response = self.client.execute(request).await?;
        let result = response.error_for_status()?;
        let release: Release = result.json().await?;
        Ok(release)
    }

    async fn list_release_assets(
        &self,
        release_id: u64,
    ) -> Result<Vec<ReleaseAsset>> {
        let url = self
            .base_url
            .join(&format!("releases/{release_id}/assets"))?;
        let request = self.client.get(url).build()?;
        let response = self.client.execute(request).await?;
        let result = response.error_for_status()?;
        let assets: Vec<ReleaseAsset> = result.json().await?;
        Ok(assets)
    }

    async fn upload_release_asset(
        &self,
        release_id: u64,
        asset_name: &str,
        file_path: &Path,
    ) -> Result<()> {
        let mut url = self
            .upload_url
            .join(&format!("releases/{release_id}/assets"))?;
        url.query_pairs_mut().append_pair("name", asset_name);

        let content = fs::read(file_path).await?;

        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .build()?;
        let response = self.client.execute(request).await?;
        response.error_for_status()?;

        info!("uploaded release asset: {asset_name}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_config() -> RemoteConfig {
        RemoteConfig {
            host: "github.com".into(),
            scheme: "https".into(),
            owner: "owner".into(),
            repo: "repo".into(),
            path: "owner/repo".into(),
            token: SecretString::from("a_token".to_string()),
        }
    }

    #[test]
    fn uses_api_subdomain_for_github_dot_com() {
        let github = Github::new(test_config()).unwrap();
        assert_eq!(
            github.base_url.as_str(),
            "https://api.github.com/repos/owner/repo/"
        );
        assert_eq!(
            github.upload_url.as_str(),
            "https://uploads.github.com/repos/owner/repo/"
        );
    }

    #[test]
    fn uses_api_v3_path_for_enterprise_hosts() {
        let config = RemoteConfig {
            host: "github.example.com".into(),
            ..test_config()
        };
        let github = Github::new(config).unwrap();
        assert_eq!(
            github.base_url.as_str(),
            "https://github.example.com/api/v3/repos/owner/repo/"
        );
    }
}
