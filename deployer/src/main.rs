//! Deployer CLI
//!
//! Publishes the static web root of a GitHub repository to a subdomain.
//!
//! Usage:
//!   deployer deploy https://github.com/octo/site
//!   deployer analyze https://github.com/octo/site
//!   deployer history list [--json]
//!   deployer history clear [--yes]

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deployer::backends::github::GithubBackend;
use deployer::backends::local::{
    DirectoryPublisher, LocalAuthenticator, LocalFilesystem, WordNameGenerator,
};
use deployer::backends::sqlite::SqliteKvStore;
use deployer::config::DeployerConfig;
use deployer::engine::{Collaborators, DeploymentEngine, EngineConfig};
use deployer::status::TerminalReporter;
use deployer::web_root::WebRootMode;

#[derive(Parser)]
#[command(name = "deployer")]
#[command(about = "Deploy a GitHub repository's web files to a hosted subdomain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/deployer/deployer.toml)
    #[arg(long, env = "DEPLOYER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a repository
    Deploy {
        /// Repository URL, e.g. https://github.com/owner/repo
        url: String,
    },
    /// Show which branch and folder would be deployed, without deploying
    Analyze {
        /// Repository URL
        url: String,
    },
    /// Deployment history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List past deployments, newest first
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all deployment records
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// Initialize tracing with the given verbosity level
///
/// - 0: warn (default)
/// - 1: info (-v)
/// - 2: debug (-vv)
/// - 3+: trace (-vvv)
///
/// `RUST_LOG` overrides the level; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs go to stderr
    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn build_engine(config: &DeployerConfig, verbose: bool) -> Result<DeploymentEngine> {
    let github = Arc::new(GithubBackend::new(config.github.clone())?);
    let store = SqliteKvStore::open_at(config.history.db_path.clone())
        .context("Failed to open deployment history")?;

    let collab = Collaborators {
        auth: Arc::new(LocalAuthenticator::new(
            config.auth.username.clone(),
            io::stdin().is_terminal(),
        )),
        trees: github.clone(),
        content: github,
        filesystem: Arc::new(LocalFilesystem::new(&config.hosting.workspace_dir)),
        publisher: Arc::new(DirectoryPublisher::new(
            &config.hosting.sites_dir,
            &config.hosting.domain,
        )),
        names: Arc::new(WordNameGenerator),
        store: Arc::new(store),
        reporter: Arc::new(TerminalReporter::new(verbose)),
    };

    let engine_config = EngineConfig {
        retry_policy: config.retry.policy(),
        history_limit: config.history.limit,
    };
    Ok(DeploymentEngine::new(collab, engine_config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = DeployerConfig::load(cli.config.as_deref())?;
    let engine = build_engine(&config, cli.verbose >= 1)?;
    engine.load_history().await;

    match cli.command {
        Commands::Deploy { url } => run_deploy(&engine, &url).await,
        Commands::Analyze { url } => run_analyze(&engine, &url).await,
        Commands::History { command } => run_history_command(&engine, command).await,
    }
}

async fn run_deploy(engine: &DeploymentEngine, url: &str) -> Result<()> {
    // Failures are already reported through the status output
    let Ok(summary) = engine.deploy(url).await else {
        std::process::exit(1);
    };

    println!("\nSite URL: {}", summary.site_url());
    println!("Branch: {}", summary.branch);
    match summary.mode {
        WebRootMode::Subfolder => println!("Source: /{}/", summary.prefix),
        _ => println!("Source: repository root"),
    }
    println!("Files deployed: {}", summary.files_count());

    if !summary.failed_paths.is_empty() {
        println!("\nMissing files:");
        for path in &summary.failed_paths {
            println!("  {}", path);
        }
    }
    if !summary.history_saved {
        println!("\nThe deployment is live but was not added to the history.");
    }

    Ok(())
}

async fn run_analyze(engine: &DeploymentEngine, url: &str) -> Result<()> {
    let (snapshot, analysis) = match engine.analyze(url).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("Repository: {}", snapshot.identity.slug());
    println!("Branch: {}", snapshot.branch);
    println!("Files: {}", snapshot.file_paths.len());
    println!("Root web files: {}", analysis.root_web_files.len());

    if !analysis.ranking.is_empty() {
        println!("\nCandidate folders:");
        for candidate in &analysis.ranking {
            println!(
                "  {:<8} score {:>4}  ({} web files, index: {}, depth: {})",
                candidate.folder,
                candidate.score,
                candidate.web_file_count,
                candidate.has_index,
                candidate.max_depth
            );
        }
    }

    println!("\n{}", analysis.summary());
    if analysis.decision.mode != WebRootMode::None {
        println!(
            "Would deploy {} file(s) from {}",
            analysis.decision.selected_files.len(),
            analysis.decision.source_label()
        );
    }

    Ok(())
}

async fn run_history_command(engine: &DeploymentEngine, command: HistoryCommands) -> Result<()> {
    match command {
        HistoryCommands::List { json } => {
            let records = engine.history().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }

            if records.is_empty() {
                println!("No deployments yet.");
                return Ok(());
            }

            println!("Deployment history ({}):\n", records.len());
            for record in &records {
                println!(
                    "  {}  {}/{}  {} files  {}",
                    record.deployed_at.format("%Y-%m-%d %H:%M"),
                    record.repo_owner,
                    record.repo_name,
                    record.files_count,
                    record.site_url
                );
            }
        }

        HistoryCommands::Clear { yes } => {
            if !yes && !confirm("Are you sure you want to clear all deployment history?")? {
                println!("Cancelled.");
                return Ok(());
            }

            engine.clear_history().await?;
            println!("Deployment history cleared.");
        }
    }

    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{} [y/N] ", question)?;
    stderr.flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
