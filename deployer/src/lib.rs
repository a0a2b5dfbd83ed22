//! Deploy a GitHub repository's static web root to a hosted subdomain
//!
//! This crate provides:
//! - Branch resolution over a fixed candidate list
//! - Web-root selection (repository root or the best-scoring subfolder)
//! - Sequential file download with per-file linear-backoff retry
//! - A staged deployment engine with a bounded deployment history
//!
//! # Example
//!
//! ```rust,ignore
//! use deployer::{Collaborators, DeploymentEngine, EngineConfig};
//!
//! let engine = DeploymentEngine::new(collaborators, EngineConfig::default());
//! engine.load_history().await;
//!
//! let summary = engine.deploy("https://github.com/octo/site").await?;
//! println!("{}", summary.site_url());
//! ```

pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod repo;
pub mod resolver;
pub mod retry;
pub mod status;
pub mod web_root;

pub use config::DeployerConfig;
pub use engine::{Collaborators, DeploymentEngine, DeploymentSummary, EngineConfig, Stage};
pub use error::{DeployError, DeployResult};
pub use fetcher::{FetchOutcome, FileFetcher};
pub use history::{DeploymentHistory, DeploymentRecord, HistoryStore};
pub use repo::{RepositoryIdentity, RepositorySnapshot};
pub use resolver::BranchResolver;
pub use retry::RetryPolicy;
pub use status::{StatusKind, StatusReporter};
pub use web_root::{WebRootAnalysis, WebRootDecision, WebRootMode};
