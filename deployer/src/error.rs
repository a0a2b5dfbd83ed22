//! Deployment error taxonomy
//!
//! Every stage of the pipeline maps its failure onto one [`DeployError`]
//! variant. Per-file download errors never show up here; they are folded
//! into [`crate::fetcher::FetchOutcome`] instead.

use crate::resolver::BranchProbe;

/// Result alias used across the pipeline
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that abort a deployment
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error(
        "Could not access repository \"{owner}/{repo}\". Please verify:\n\
         • The repository exists and is public\n\
         • The URL is correct: {url}\n\
         • The repository has a {} branch",
        branch_list(.attempted)
    )]
    RepositoryUnavailable {
        owner: String,
        repo: String,
        url: String,
        attempted: Vec<BranchProbe>,
    },

    #[error("No web files (HTML, CSS, JS) found in this repository. This doesn't appear to be a web project.")]
    NoDeployableContent,

    #[error("No files found in the selected deployment source: {source_dir}")]
    EmptySelection { source_dir: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Could not prepare deployment directory: {0}")]
    Workspace(String),

    #[error("No files could be downloaded from the repository after multiple retries ({attempted} attempted).")]
    TotalFetchFailure { attempted: usize },

    #[error("Publishing failed: {0}")]
    Publish(String),

    #[error("Could not save deployment history: {0}")]
    Persistence(String),

    #[error("A deployment is already in progress")]
    Busy,
}

impl DeployError {
    /// Short machine-friendly label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authentication(_) => "authentication",
            Self::RepositoryUnavailable { .. } => "repository_unavailable",
            Self::NoDeployableContent => "no_deployable_content",
            Self::EmptySelection { .. } => "empty_selection",
            Self::Configuration(_) => "configuration",
            Self::Workspace(_) => "workspace",
            Self::TotalFetchFailure { .. } => "total_fetch_failure",
            Self::Publish(_) => "publish",
            Self::Persistence(_) => "persistence",
            Self::Busy => "busy",
        }
    }
}

fn branch_list(attempted: &[BranchProbe]) -> String {
    let names: Vec<&str> = attempted.iter().map(|p| p.branch.as_str()).collect();
    match names.split_last() {
        None => "usable".to_string(),
        Some((last, [])) => (*last).to_string(),
        Some((last, rest)) => format!("{}, or {}", rest.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ProbeOutcome;

    fn probe(branch: &str) -> BranchProbe {
        BranchProbe {
            branch: branch.to_string(),
            outcome: ProbeOutcome::Status(404),
        }
    }

    #[test]
    fn test_repository_unavailable_lists_branches() {
        let err = DeployError::RepositoryUnavailable {
            owner: "octo".to_string(),
            repo: "site".to_string(),
            url: "https://github.com/octo/site".to_string(),
            attempted: vec![probe("main"), probe("master"), probe("dev"), probe("develop")],
        };

        let message = err.to_string();
        assert!(message.contains("\"octo/site\""));
        assert!(message.contains("exists and is public"));
        assert!(message.contains("main, master, dev, or develop branch"));
        assert_eq!(err.kind(), "repository_unavailable");
    }

    #[test]
    fn test_single_branch_list() {
        assert_eq!(branch_list(&[probe("main")]), "main");
        assert_eq!(branch_list(&[]), "usable");
    }
}
