//! Deployment engine
//!
//! Runs one repository deployment end to end:
//! - Validation and sign-in
//! - Branch resolution and web-root selection
//! - Resilient download into a fresh working directory
//! - Publishing and history recording
//!
//! Stages run strictly in sequence. Any failure ends the run in
//! [`Stage::Failed`]; only individual file downloads are retried.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::backends::{
    Authenticator, ContentSource, KvStore, NameGenerator, Publisher, SiteFilesystem, TreeSource,
};
use crate::error::{DeployError, DeployResult};
use crate::fetcher::{branch_base_url, FetchOutcome, FileFetcher};
use crate::history::{DeploymentHistory, DeploymentRecord, HistoryStore, HISTORY_LIMIT};
use crate::repo::{RepositoryIdentity, RepositorySnapshot};
use crate::resolver::BranchResolver;
use crate::retry::RetryPolicy;
use crate::status::{StatusKind, StatusReporter};
use crate::web_root::{self, WebRootAnalysis, WebRootMode};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    /// Claimed by a run that has not reached sign-in yet
    Starting,
    Authenticating,
    Resolving,
    Selecting,
    Fetching,
    Publishing,
    Recording,
    Done,
    Failed,
}

impl Stage {
    /// Whether a new deployment may start from this stage
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Idle | Stage::Done | Stage::Failed)
    }

    fn label(self) -> &'static str {
        match self {
            Stage::Idle => "Ready",
            Stage::Starting => "Starting...",
            Stage::Authenticating => "Authenticating...",
            Stage::Resolving => "Fetching repository data...",
            Stage::Selecting => "Analyzing repository...",
            Stage::Fetching => "Downloading files...",
            Stage::Publishing => "Creating hosted site...",
            Stage::Recording => "Saving deployment history...",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Everything the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn Authenticator>,
    pub trees: Arc<dyn TreeSource>,
    pub content: Arc<dyn ContentSource>,
    pub filesystem: Arc<dyn SiteFilesystem>,
    pub publisher: Arc<dyn Publisher>,
    pub names: Arc<dyn NameGenerator>,
    pub store: Arc<dyn KvStore>,
    pub reporter: Arc<dyn StatusReporter>,
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub retry_policy: RetryPolicy,
    /// Maximum number of history records kept
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            history_limit: HISTORY_LIMIT,
        }
    }
}

/// Result of a successful deployment
#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub record: DeploymentRecord,
    pub branch: String,
    pub mode: WebRootMode,
    pub prefix: String,
    pub working_dir: PathBuf,
    /// Repository paths missing from the published site
    pub failed_paths: Vec<String>,
    /// False when the site went live but the history could not be saved
    pub history_saved: bool,
}

impl DeploymentSummary {
    pub fn site_url(&self) -> &str {
        &self.record.site_url
    }

    pub fn files_count(&self) -> usize {
        self.record.files_count
    }
}

/// Runs deployments, one at a time
pub struct DeploymentEngine {
    collab: Collaborators,
    config: EngineConfig,
    resolver: BranchResolver,
    fetcher: FileFetcher,
    history_store: HistoryStore,
    history: tokio::sync::Mutex<DeploymentHistory>,
    stage: Mutex<Stage>,
    last_error: Mutex<Option<String>>,
}

/// Marks the engine busy; restores the ready state when dropped
struct ActiveRun<'a> {
    engine: &'a DeploymentEngine,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        // A run dropped mid-flight still ends in a terminal stage
        if let Ok(mut stage) = self.engine.stage.lock() {
            if !stage.is_terminal() {
                *stage = Stage::Failed;
            }
        }
        self.engine.collab.reporter.progress(Stage::Idle.label());
        self.engine.collab.reporter.ready();
    }
}

impl DeploymentEngine {
    /// Create an engine with an empty in-memory history
    ///
    /// Call [`DeploymentEngine::load_history`] to pick up stored records.
    pub fn new(collab: Collaborators, config: EngineConfig) -> Self {
        let resolver = BranchResolver::new(collab.trees.clone());
        let fetcher = FileFetcher::new(
            collab.content.clone(),
            collab.filesystem.clone(),
            collab.reporter.clone(),
        );
        let history_store = HistoryStore::with_limit(collab.store.clone(), config.history_limit);
        let history = DeploymentHistory::with_limit(config.history_limit);

        Self {
            collab,
            config,
            resolver,
            fetcher,
            history_store,
            history: tokio::sync::Mutex::new(history),
            stage: Mutex::new(Stage::Idle),
            last_error: Mutex::new(None),
        }
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.stage.lock().map(|s| *s).unwrap_or(Stage::Failed)
    }

    /// Message of the most recent failure, if the last run failed
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    /// Load persisted history; unreadable history is treated as empty
    pub async fn load_history(&self) -> usize {
        let loaded = self.history_store.load_or_default().await;
        let count = loaded.len();
        *self.history.lock().await = loaded;
        tracing::debug!(count, "Deployment history loaded");
        count
    }

    /// Snapshot of the history, newest first
    pub async fn history(&self) -> Vec<DeploymentRecord> {
        self.history.lock().await.records().to_vec()
    }

    /// Forget every record, in memory and in the store
    pub async fn clear_history(&self) -> DeployResult<()> {
        self.history_store
            .clear()
            .await
            .map_err(|e| DeployError::Persistence(format!("{:#}", e)))?;
        self.history.lock().await.clear();
        tracing::info!(count = 0, "Deployment history cleared");
        Ok(())
    }

    /// Resolve and analyze a repository without deploying anything
    pub async fn analyze(
        &self,
        input: &str,
    ) -> DeployResult<(RepositorySnapshot, WebRootAnalysis)> {
        let identity = RepositoryIdentity::parse(input)?;
        let snapshot = self.resolver.resolve(&identity).await?;
        let analysis = web_root::analyze(&snapshot.file_paths);
        Ok((snapshot, analysis))
    }

    /// Deploy the repository at `input`
    ///
    /// Fails with [`DeployError::Busy`] while another deployment on this
    /// engine is still running.
    pub async fn deploy(&self, input: &str) -> DeployResult<DeploymentSummary> {
        let _run = self.begin()?;

        let result = self.run_pipeline(input).await;
        match &result {
            Ok(summary) => {
                self.set_stage(Stage::Done);
                tracing::info!(
                    site = %summary.site_url(),
                    files = summary.files_count(),
                    failed = summary.failed_paths.len(),
                    "Deployment complete"
                );
            }
            Err(e) => {
                self.set_stage(Stage::Failed);
                if let Ok(mut last) = self.last_error.lock() {
                    *last = Some(e.to_string());
                }
                tracing::error!(kind = e.kind(), "Deployment failed: {}", e);
                self.collab
                    .reporter
                    .status(&format!("Deployment failed: {}", e), StatusKind::Error);
            }
        }
        result
    }

    fn begin(&self) -> DeployResult<ActiveRun<'_>> {
        let mut stage = self.stage.lock().map_err(|_| DeployError::Busy)?;
        if !stage.is_terminal() {
            tracing::warn!(stage = %*stage, "Deployment already in progress");
            return Err(DeployError::Busy);
        }
        // Claimed under the lock so a concurrent caller sees a busy engine
        *stage = Stage::Starting;
        drop(stage);

        if let Ok(mut last) = self.last_error.lock() {
            *last = None;
        }
        Ok(ActiveRun { engine: self })
    }

    fn set_stage(&self, next: Stage) {
        if let Ok(mut stage) = self.stage.lock() {
            tracing::debug!(from = %*stage, to = %next, "Stage transition");
            *stage = next;
        }
        if !next.is_terminal() {
            self.collab.reporter.progress(next.label());
        }
    }

    async fn run_pipeline(&self, input: &str) -> DeployResult<DeploymentSummary> {
        let reporter = &self.collab.reporter;

        // Rejected before any network activity
        let identity = RepositoryIdentity::parse(input)?;
        tracing::info!(owner = %identity.owner, repo = %identity.name, "Starting deployment");

        self.set_stage(Stage::Authenticating);
        self.ensure_authenticated().await?;

        self.set_stage(Stage::Resolving);
        reporter.status("Fetching repository data...", StatusKind::Info);
        let snapshot = self.resolver.resolve(&identity).await?;

        self.set_stage(Stage::Selecting);
        reporter.status("Analyzing repository structure...", StatusKind::Info);
        let analysis = web_root::analyze(&snapshot.file_paths);
        tracing::info!(analysis = %analysis.summary(), "Web root analysis");
        let decision = analysis.decision;

        match decision.mode {
            WebRootMode::None => return Err(DeployError::NoDeployableContent),
            WebRootMode::Root => reporter.status(
                "Web files found in repository root. Deploying root.",
                StatusKind::Success,
            ),
            WebRootMode::Subfolder => reporter.status(
                &format!(
                    "Web files found in /{}/ folder. Deploying this folder.",
                    decision.prefix
                ),
                StatusKind::Success,
            ),
        }
        if decision.selected_files.is_empty() {
            return Err(DeployError::EmptySelection {
                source_dir: decision.source_label(),
            });
        }

        self.set_stage(Stage::Fetching);
        let subdomain = self.collab.names.generate();
        reporter.status(
            &format!("Preparing deployment to {}...", subdomain),
            StatusKind::Info,
        );

        let base_url = branch_base_url(
            self.collab.content.raw_base_url(),
            &identity.owner,
            &identity.name,
            &snapshot.branch,
        )
        .map_err(|e| DeployError::Configuration(format!("{:#}", e)))?;

        let dir_name = format!(
            "gh-deploy-{}-{}-{}",
            identity.owner,
            identity.name,
            Utc::now().timestamp_millis()
        );
        let working_dir = self
            .collab
            .filesystem
            .mkdir(&dir_name)
            .await
            .map_err(|e| DeployError::Workspace(format!("{:#}", e)))?;

        let outcome = self
            .fetcher
            .fetch_all(
                &base_url,
                &decision.selected_files,
                &decision.prefix,
                &working_dir,
                &self.config.retry_policy,
            )
            .await;
        self.check_outcome(&outcome, decision.selected_files.len())?;

        self.set_stage(Stage::Publishing);
        let message = if outcome.failed_paths.is_empty() {
            format!("Creating hosted site with {} files...", outcome.succeeded_count)
        } else {
            format!(
                "Downloaded {} files. {} files failed. Proceeding...",
                outcome.succeeded_count,
                outcome.failed_paths.len()
            )
        };
        reporter.status(&message, StatusKind::Info);

        let site_url = self
            .collab
            .publisher
            .create(&subdomain, &working_dir)
            .await
            .map_err(|e| DeployError::Publish(format!("{:#}", e)))?;

        self.set_stage(Stage::Recording);
        let record = DeploymentRecord::new(site_url, outcome.succeeded_count, &identity, Utc::now());
        let history_saved = self.record(record.clone()).await;

        reporter.status(
            &format!("Deployment successful! Your site is live at {}", record.site_url),
            StatusKind::Success,
        );
        if !outcome.failed_paths.is_empty() {
            reporter.status(
                &format!(
                    "{} file(s) could not be downloaded and might be missing from your site.",
                    outcome.failed_paths.len()
                ),
                StatusKind::Warning,
            );
        }

        Ok(DeploymentSummary {
            record,
            branch: snapshot.branch,
            mode: decision.mode,
            prefix: decision.prefix,
            working_dir,
            failed_paths: outcome.failed_paths,
            history_saved,
        })
    }

    async fn ensure_authenticated(&self) -> DeployResult<()> {
        let auth = &self.collab.auth;
        let reporter = &self.collab.reporter;

        if !auth.is_signed_in() {
            reporter.status("Please sign in...", StatusKind::Info);
            if let Err(e) = auth.sign_in().await {
                let text = format!("{:#}", e);
                let message = if text.to_lowercase().contains("cancel") {
                    "Sign-in cancelled.".to_string()
                } else {
                    format!("Authentication failed: {}", text)
                };
                return Err(DeployError::Authentication(message));
            }
            reporter.status("Successfully signed in!", StatusKind::Success);
        }

        let user = auth
            .user()
            .await
            .map_err(|e| DeployError::Authentication(format!("Authentication failed: {:#}", e)))?;
        tracing::info!(username = %user.username, "User authenticated");
        Ok(())
    }

    fn check_outcome(&self, outcome: &FetchOutcome, selected: usize) -> DeployResult<()> {
        if outcome.succeeded_count == 0 && selected > 0 {
            return Err(DeployError::TotalFetchFailure {
                attempted: selected,
            });
        }
        if !outcome.failed_paths.is_empty() {
            tracing::warn!(
                failed = outcome.failed_paths.len(),
                succeeded = outcome.succeeded_count,
                "Some files could not be downloaded"
            );
        }
        Ok(())
    }

    // The site is already live here, so a failed save is only a warning
    async fn record(&self, record: DeploymentRecord) -> bool {
        let mut history = self.history.lock().await;
        history.push(record);

        match self.history_store.save(&history).await {
            Ok(()) => {
                tracing::info!(count = history.len(), "Deployment history saved");
                true
            }
            Err(e) => {
                let err = DeployError::Persistence(format!("{:#}", e));
                tracing::error!("{}", err);
                self.collab
                    .reporter
                    .status(&err.to_string(), StatusKind::Warning);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_stages() {
        assert!(Stage::Idle.is_terminal());
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Failed.is_terminal());
        for stage in [
            Stage::Starting,
            Stage::Authenticating,
            Stage::Resolving,
            Stage::Selecting,
            Stage::Fetching,
            Stage::Publishing,
            Stage::Recording,
        ] {
            assert!(!stage.is_terminal(), "{stage} should block new runs");
        }
    }
}
