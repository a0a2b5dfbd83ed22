//! Branch discovery
//!
//! Probes a fixed list of conventional branch names and settles on the
//! first one whose recursive tree is non-empty.

use std::fmt;
use std::sync::Arc;

use crate::backends::TreeSource;
use crate::error::{DeployError, DeployResult};
use crate::repo::{RepositoryIdentity, RepositorySnapshot};

/// Branch names tried, in order
pub const CANDIDATE_BRANCHES: &[&str] = &["main", "master", "dev", "develop"];

/// Why a probed branch was not used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Non-success HTTP status
    Status(u16),
    /// Success, but no entries
    EmptyTree,
    /// The request never produced a response
    Transport(String),
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::EmptyTree => write!(f, "empty tree"),
            Self::Transport(msg) => write!(f, "request failed: {}", msg),
        }
    }
}

/// A branch that was tried and rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchProbe {
    pub branch: String,
    pub outcome: ProbeOutcome,
}

/// Finds a usable branch and lists its files
pub struct BranchResolver {
    trees: Arc<dyn TreeSource>,
    candidates: Vec<String>,
}

impl BranchResolver {
    pub fn new(trees: Arc<dyn TreeSource>) -> Self {
        Self {
            trees,
            candidates: CANDIDATE_BRANCHES.iter().map(|b| b.to_string()).collect(),
        }
    }

    /// Override the probe order
    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Resolve the snapshot for `identity`
    ///
    /// Each candidate is requested exactly once. A failed request, a
    /// non-success status and an empty tree are all treated as "branch
    /// absent"; only exhausting every candidate is an error.
    pub async fn resolve(&self, identity: &RepositoryIdentity) -> DeployResult<RepositorySnapshot> {
        let mut attempted = Vec::with_capacity(self.candidates.len());

        for branch in &self.candidates {
            tracing::debug!(repo = %identity.slug(), %branch, "Probing branch");

            let outcome = match self
                .trees
                .list_tree(&identity.owner, &identity.name, branch)
                .await
            {
                Ok(listing) if !listing.ok() => ProbeOutcome::Status(listing.status),
                Ok(listing) => {
                    let tree = listing.tree.unwrap_or_default();
                    if tree.is_empty() {
                        ProbeOutcome::EmptyTree
                    } else {
                        let file_paths: Vec<String> = tree
                            .into_iter()
                            .filter(|entry| entry.is_blob())
                            .map(|entry| entry.path)
                            .collect();

                        // A tree made only of directories still has nothing to deploy
                        if file_paths.is_empty() {
                            ProbeOutcome::EmptyTree
                        } else {
                            tracing::info!(
                                repo = %identity.slug(),
                                %branch,
                                files = file_paths.len(),
                                "Found branch"
                            );
                            return Ok(RepositorySnapshot {
                                identity: identity.clone(),
                                branch: branch.clone(),
                                file_paths,
                            });
                        }
                    }
                }
                Err(e) => ProbeOutcome::Transport(e.to_string()),
            };

            tracing::debug!(repo = %identity.slug(), %branch, %outcome, "Branch not usable");
            attempted.push(BranchProbe {
                branch: branch.clone(),
                outcome,
            });
        }

        tracing::warn!(repo = %identity.slug(), "No candidate branch has files");
        Err(DeployError::RepositoryUnavailable {
            owner: identity.owner.clone(),
            repo: identity.name.clone(),
            url: identity.original_url.clone(),
            attempted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{TreeEntry, TreeListing};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTrees {
        branches: HashMap<String, Vec<TreeEntry>>,
        broken: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTrees {
        fn with_branch(mut self, branch: &str, entries: Vec<TreeEntry>) -> Self {
            self.branches.insert(branch.to_string(), entries);
            self
        }

        fn with_broken(mut self, branch: &str) -> Self {
            self.broken.push(branch.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TreeSource for FakeTrees {
        async fn list_tree(&self, _owner: &str, _repo: &str, branch: &str) -> Result<TreeListing> {
            self.calls.lock().unwrap().push(branch.to_string());
            if self.broken.iter().any(|b| b == branch) {
                return Err(anyhow!("connection reset"));
            }
            Ok(match self.branches.get(branch) {
                Some(entries) => TreeListing {
                    status: 200,
                    tree: Some(entries.clone()),
                },
                None => TreeListing {
                    status: 404,
                    tree: None,
                },
            })
        }
    }

    fn identity() -> RepositoryIdentity {
        RepositoryIdentity::parse("https://github.com/octo/site").unwrap()
    }

    #[tokio::test]
    async fn test_first_branch_with_files_wins() {
        let trees = Arc::new(
            FakeTrees::default()
                .with_branch("main", vec![])
                .with_branch("master", vec![TreeEntry::blob("index.html")])
                .with_branch("dev", vec![TreeEntry::blob("other.html")]),
        );
        let resolver = BranchResolver::new(trees.clone());

        let snapshot = resolver.resolve(&identity()).await.unwrap();

        assert_eq!(snapshot.branch, "master");
        assert_eq!(snapshot.file_paths, vec!["index.html"]);
        assert_eq!(trees.calls(), vec!["main", "master"]);
    }

    #[tokio::test]
    async fn test_only_blobs_in_tree_order() {
        let trees = Arc::new(FakeTrees::default().with_branch(
            "main",
            vec![
                TreeEntry::blob("z.js"),
                TreeEntry::dir("src"),
                TreeEntry::blob("src/index.html"),
                TreeEntry::blob("a.css"),
            ],
        ));

        let snapshot = BranchResolver::new(trees).resolve(&identity()).await.unwrap();

        assert_eq!(snapshot.branch, "main");
        assert_eq!(snapshot.file_paths, vec!["z.js", "src/index.html", "a.css"]);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_fatal_and_not_retried() {
        let trees = Arc::new(
            FakeTrees::default()
                .with_broken("main")
                .with_branch("develop", vec![TreeEntry::blob("index.html")]),
        );

        let snapshot = BranchResolver::new(trees.clone())
            .resolve(&identity())
            .await
            .unwrap();

        assert_eq!(snapshot.branch, "develop");
        assert_eq!(trees.calls(), vec!["main", "master", "dev", "develop"]);
    }

    #[tokio::test]
    async fn test_all_candidates_exhausted() {
        let trees = Arc::new(
            FakeTrees::default()
                .with_branch("main", vec![])
                .with_branch("dev", vec![TreeEntry::dir("empty")])
                .with_broken("develop"),
        );

        let err = BranchResolver::new(trees)
            .resolve(&identity())
            .await
            .unwrap_err();

        match err {
            DeployError::RepositoryUnavailable {
                owner,
                repo,
                attempted,
                ..
            } => {
                assert_eq!(owner, "octo");
                assert_eq!(repo, "site");
                let outcomes: Vec<_> = attempted.iter().map(|p| p.outcome.clone()).collect();
                assert_eq!(outcomes[0], ProbeOutcome::EmptyTree);
                assert_eq!(outcomes[1], ProbeOutcome::Status(404));
                assert_eq!(outcomes[2], ProbeOutcome::EmptyTree);
                assert!(matches!(outcomes[3], ProbeOutcome::Transport(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_custom_candidates() {
        let trees = Arc::new(FakeTrees::default().with_branch("gh-pages", vec![TreeEntry::blob("a.html")]));
        let resolver = BranchResolver::new(trees).with_candidates(vec!["gh-pages".to_string()]);

        let snapshot = resolver.resolve(&identity()).await.unwrap();
        assert_eq!(snapshot.branch, "gh-pages");
    }
}
