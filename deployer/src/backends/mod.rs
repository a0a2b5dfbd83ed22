//! Collaborator traits and their implementations
//!
//! The pipeline only talks to the outside world through these traits, so
//! every stage can be exercised with in-memory fakes. Concrete backends:
//!
//! - [`github`]: tree listing and raw content over HTTP
//! - [`local`]: filesystem workspace, directory-based publishing, auth and
//!   subdomain names
//! - [`sqlite`]: persistent key/value store for deployment history

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

pub mod github;
pub mod local;
pub mod sqlite;

/// One entry of a recursive tree listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    /// `blob` for files, `tree` for directories
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            kind: "blob".to_string(),
            path: path.into(),
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            kind: "tree".to_string(),
            path: path.into(),
        }
    }

    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

/// Response of a tree listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeListing {
    pub status: u16,
    pub tree: Option<Vec<TreeEntry>>,
}

impl TreeListing {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Response of a raw content request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl RawContent {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Signed-in user details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
}

/// Lists repository trees for a given branch
#[async_trait]
pub trait TreeSource: Send + Sync {
    async fn list_tree(&self, owner: &str, repo: &str, branch: &str) -> Result<TreeListing>;
}

/// Retrieves raw file content by fully-qualified URL
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Base URL under which `{owner}/{repo}/{branch}/{path}` resolves
    fn raw_base_url(&self) -> &str;

    async fn fetch(&self, url: &str) -> Result<RawContent>;
}

/// Destination storage for downloaded site files
#[async_trait]
pub trait SiteFilesystem: Send + Sync {
    /// Create a fresh directory and return its full path
    async fn mkdir(&self, name: &str) -> Result<PathBuf>;

    /// Write bytes, creating missing parents and overwriting existing content
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Hosting platform that turns a directory into a live site
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `source_dir` under `subdomain` and return the public URL
    async fn create(&self, subdomain: &str, source_dir: &Path) -> Result<String>;
}

/// Produces human-readable unique subdomain tokens
pub trait NameGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Sign-in collaborator
#[async_trait]
pub trait Authenticator: Send + Sync {
    fn is_signed_in(&self) -> bool;

    /// Prompt for sign-in; fails when the user cancels
    async fn sign_in(&self) -> Result<()>;

    async fn user(&self) -> Result<User>;
}

/// Keyed persistent storage that survives restarts
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_entry_deserialize() {
        let json = r#"{"path": "src/index.html", "mode": "100644", "type": "blob", "sha": "abc"}"#;
        let entry: TreeEntry = serde_json::from_str(json).unwrap();
        assert!(entry.is_blob());
        assert_eq!(entry.path, "src/index.html");
        assert!(!TreeEntry::dir("src").is_blob());
    }

    #[test]
    fn test_status_ranges() {
        let listing = TreeListing { status: 404, tree: None };
        assert!(!listing.ok());
        let raw = RawContent { status: 200, bytes: vec![] };
        assert!(raw.ok());
    }
}
