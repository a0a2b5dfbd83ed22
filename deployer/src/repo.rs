//! Repository identity and snapshot types

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DeployError, DeployResult};

const GITHUB_HOSTS: &[&str] = &["github.com", "www.github.com"];

/// Owner/name pair parsed from a user-supplied GitHub URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
    /// The URL exactly as the user typed it (trimmed)
    pub original_url: String,
}

impl RepositoryIdentity {
    /// Parse `https://github.com/{owner}/{repo}[.git]`
    ///
    /// Extra path segments (e.g. `/tree/main`) are ignored. Anything that is
    /// not a github.com URL with two non-empty segments is rejected before
    /// any network access happens.
    pub fn parse(input: &str) -> DeployResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DeployError::Validation(
                "Please enter a GitHub repository URL.".to_string(),
            ));
        }

        let url = Url::parse(input).map_err(|_| invalid_url())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid_url());
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if !GITHUB_HOSTS.contains(&host.as_str()) {
            return Err(DeployError::Validation(
                "Please enter a valid GitHub repository URL (must be from github.com).".to_string(),
            ));
        }

        let mut segments = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty());

        let owner = segments.next().ok_or_else(invalid_format)?;
        let raw_name = segments.next().ok_or_else(invalid_format)?;
        let name = raw_name.strip_suffix(".git").unwrap_or(raw_name);

        if name.is_empty() {
            return Err(invalid_format());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            original_url: input.to_string(),
        })
    }

    /// `owner/name`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn invalid_url() -> DeployError {
    DeployError::Validation(
        "Please enter a valid GitHub repository URL (must be from github.com).".to_string(),
    )
}

fn invalid_format() -> DeployError {
    DeployError::Validation(
        "Invalid GitHub URL format. Please provide a valid repository URL.".to_string(),
    )
}

/// A resolved branch and its flat blob listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySnapshot {
    pub identity: RepositoryIdentity,
    pub branch: String,
    /// Blob paths in the tree's native order; never empty
    pub file_paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_url() {
        let id = RepositoryIdentity::parse("https://github.com/octo/site").unwrap();
        assert_eq!(id.owner, "octo");
        assert_eq!(id.name, "site");
        assert_eq!(id.slug(), "octo/site");
    }

    #[test]
    fn test_parse_strips_git_suffix_and_whitespace() {
        let id = RepositoryIdentity::parse("  https://github.com/octo/site.git/  ").unwrap();
        assert_eq!(id.name, "site");
        assert_eq!(id.original_url, "https://github.com/octo/site.git/");
    }

    #[test]
    fn test_parse_ignores_extra_segments() {
        let id = RepositoryIdentity::parse("https://www.github.com/octo/site/tree/dev").unwrap();
        assert_eq!(id.owner, "octo");
        assert_eq!(id.name, "site");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for input in [
            "",
            "   ",
            "github.com/octo/site",
            "https://gitlab.com/octo/site",
            "https://github.com/octo",
            "https://github.com/octo/.git",
            "ftp://github.com/octo/site",
        ] {
            let err = RepositoryIdentity::parse(input).unwrap_err();
            assert!(matches!(err, DeployError::Validation(_)), "accepted {input:?}");
        }
    }
}
