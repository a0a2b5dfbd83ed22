//! Resilient file retrieval
//!
//! Downloads the selected files one at a time, retrying each with linear
//! backoff, and records which ones could not be retrieved. A file that
//! keeps failing never stops the batch.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::backends::{ContentSource, SiteFilesystem};
use crate::retry::{self, RetryPolicy};
use crate::status::{StatusKind, StatusReporter};

/// Aggregate result of a batch download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub succeeded_count: usize,
    /// Repository-relative paths that failed every attempt, in input order
    pub failed_paths: Vec<String>,
}

impl FetchOutcome {
    pub fn attempted(&self) -> usize {
        self.succeeded_count + self.failed_paths.len()
    }

    pub fn is_partial(&self) -> bool {
        self.succeeded_count > 0 && !self.failed_paths.is_empty()
    }
}

/// Destination-relative path for a repository path under `prefix`
pub fn relative_destination<'a>(repo_path: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return repo_path;
    }
    repo_path
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(repo_path)
}

/// Base URL of a branch on the raw content host
///
/// Each segment is percent-encoded; a branch containing `/` keeps its
/// slashes as path separators.
pub fn branch_base_url(raw_base: &str, owner: &str, repo: &str, branch: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw_base).with_context(|| format!("Invalid raw content URL: {}", raw_base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Raw content URL cannot take a path: {}", raw_base))?
        .pop_if_empty()
        .extend([owner, repo])
        .extend(branch.split('/'));
    Ok(url)
}

/// Content URL of `repo_path` under `base`, one encoded segment per path part
pub fn file_url(base: &Url, repo_path: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("Content URL cannot take a path: {}", base))?
        .pop_if_empty()
        .extend(repo_path.split('/'));
    Ok(url)
}

/// Downloads files from a content source into a site directory
pub struct FileFetcher {
    content: Arc<dyn ContentSource>,
    filesystem: Arc<dyn SiteFilesystem>,
    reporter: Arc<dyn StatusReporter>,
}

impl FileFetcher {
    pub fn new(
        content: Arc<dyn ContentSource>,
        filesystem: Arc<dyn SiteFilesystem>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            content,
            filesystem,
            reporter,
        }
    }

    /// Download every file in `selected_files` into `destination`
    ///
    /// Each repository path is appended to `base_url` to form the content
    /// URL. `prefix` is stripped from the path before writing.
    pub async fn fetch_all(
        &self,
        base_url: &Url,
        selected_files: &[String],
        prefix: &str,
        destination: &Path,
        policy: &RetryPolicy,
    ) -> FetchOutcome {
        let total = selected_files.len();
        let mut outcome = FetchOutcome::default();

        for (index, repo_path) in selected_files.iter().enumerate() {
            self.reporter
                .progress(&format!("Downloading {}/{}...", index + 1, total));
            self.reporter.status(
                &format!("Downloading {}... ({}/{})", repo_path, index + 1, total),
                StatusKind::Info,
            );

            let url = match file_url(base_url, repo_path) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(path = %repo_path, "Skipping file: {:#}", e);
                    outcome.failed_paths.push(repo_path.clone());
                    continue;
                }
            };
            let target = destination.join(relative_destination(repo_path, prefix));

            let result = retry::with_backoff(
                policy,
                |attempt, delay, err: &anyhow::Error| {
                    tracing::warn!(
                        path = %repo_path,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        "Download failed: {:#}",
                        err
                    );
                    self.reporter.status(
                        &format!(
                            "Download failed for {}. Retrying ({}/{})...",
                            repo_path, attempt, policy.max_attempts
                        ),
                        StatusKind::Info,
                    );
                },
                |attempt| self.fetch_one(url.as_str(), &target, attempt),
            )
            .await;

            match result {
                Ok(bytes) => {
                    tracing::debug!(path = %repo_path, bytes, "Downloaded");
                    outcome.succeeded_count += 1;
                }
                Err(e) => {
                    tracing::error!(
                        path = %repo_path,
                        attempts = policy.max_attempts,
                        "Giving up on file: {:#}",
                        e
                    );
                    outcome.failed_paths.push(repo_path.clone());
                }
            }
        }

        outcome
    }

    async fn fetch_one(&self, url: &str, target: &Path, attempt: u32) -> Result<usize> {
        tracing::debug!(%url, attempt, "Fetching");
        let response = self.content.fetch(url).await?;
        if !response.ok() {
            return Err(anyhow!("HTTP {}", response.status));
        }

        self.filesystem
            .write(target, &response.bytes)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;

        Ok(response.bytes.len())
    }
}
