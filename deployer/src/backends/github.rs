//! GitHub backend
//!
//! Tree listings come from the REST API
//! (`GET /repos/{owner}/{repo}/git/trees/{branch}?recursive=1`), file
//! bodies from the raw content host.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ContentSource, RawContent, TreeEntry, TreeListing, TreeSource};
use crate::config::GithubConfig;

/// HTTP client for the GitHub API and raw content host
#[derive(Clone)]
pub struct GithubBackend {
    client: Client,
    config: GithubConfig,
}

// Tree API response
#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Option<Vec<TreeEntry>>,
    #[serde(default)]
    truncated: bool,
}

impl GithubBackend {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn tree_url(&self, owner: &str, repo: &str, branch: &str) -> String {
        format!(
            "{}/repos/{}/{}/git/trees/{}",
            self.config.api_url.trim_end_matches('/'),
            owner,
            repo,
            branch
        )
    }
}

#[async_trait]
impl TreeSource for GithubBackend {
    async fn list_tree(&self, owner: &str, repo: &str, branch: &str) -> Result<TreeListing> {
        let url = self.tree_url(owner, repo, branch);
        tracing::debug!(%url, "Listing tree");

        let mut request = self
            .client
            .get(&url)
            .query(&[("recursive", "1")])
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            tracing::debug!(%url, %status, "Tree request returned non-success status");
            return Ok(TreeListing {
                status: status.as_u16(),
                tree: None,
            });
        }

        let body: TreeResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid tree response from {}", url))?;
        if body.truncated {
            tracing::warn!(%owner, %repo, %branch, "Tree listing was truncated by the API");
        }

        Ok(TreeListing {
            status: status.as_u16(),
            tree: body.tree,
        })
    }
}

#[async_trait]
impl ContentSource for GithubBackend {
    fn raw_base_url(&self) -> &str {
        self.config.raw_url.trim_end_matches('/')
    }

    async fn fetch(&self, url: &str) -> Result<RawContent> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let bytes = if response.status().is_success() {
            response.bytes().await?.to_vec()
        } else {
            Vec::new()
        };

        Ok(RawContent { status, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_url() {
        let backend = GithubBackend::new(GithubConfig {
            api_url: "https://api.example.test/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            backend.tree_url("octo", "site", "main"),
            "https://api.example.test/repos/octo/site/git/trees/main"
        );
    }

    #[test]
    fn test_raw_base_trims_slash() {
        let backend = GithubBackend::new(GithubConfig {
            raw_url: "https://raw.example.test/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(backend.raw_base_url(), "https://raw.example.test");
    }

    #[test]
    fn test_tree_response_parsing() {
        let json = r#"{
            "sha": "abc",
            "tree": [
                {"path": "index.html", "type": "blob", "mode": "100644"},
                {"path": "css", "type": "tree", "mode": "040000"}
            ],
            "truncated": false
        }"#;
        let parsed: TreeResponse = serde_json::from_str(json).unwrap();
        let tree = parsed.tree.unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree[0].is_blob());
        assert!(!tree[1].is_blob());
    }
}
