mod analysis;
mod auth;
mod config;
mod pr;
mod report;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use analysis::FileFilter;
use auth::device::{DeviceFlow, LoginOutcome};
use auth::storage::TokenStorage;
use auth::AuthError;
use config::{Config, ConfigError};
use pr::{ChangedFile, CommentSink, GitHubClient, PrError, PrUrl, PullRequestSource};
use report::{Report, ReportError};

/// Process exit codes.
const EXIT_FAILURE: u8 = 1;
const EXIT_MISSING_CONFIG: u8 = 2;
const EXIT_FETCH_FAILED: u8 = 3;
const EXIT_POST_FAILED: u8 = 4;

/// PR Helper: reports added/deleted tests, deleted public methods and
/// project reference changes of a pull request.
///
/// Exit codes: 0 success, 1 other failure, 2 missing or invalid run
/// configuration, 3 listing the PR files failed, 4 posting the comment failed.
#[derive(Parser, Debug)]
#[command(name = "pr-helper", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run as a GitHub Action: read GITHUB_TOKEN, GITHUB_REPOSITORY and
    /// GITHUB_PULL_REQUEST_NUMBER (or GITHUB_EVENT_PATH) and comment on the PR
    Action {
        /// Print the report instead of posting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Analyze a pull request by URL (e.g., https://github.com/org/repo/pull/42)
    Analyze {
        pr_url: String,
        /// Also post the report as a comment on the pull request
        #[arg(long)]
        post: bool,
        /// Optional output file path for markdown report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Analyze a local `git diff` output file
    Diff {
        patch: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Analyze a built-in sample diff (no GitHub token needed)
    Demo {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Log in with the GitHub device flow and store the token
    Login,
    /// Delete the stored token
    Logout,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to fetch pull request files: {0}")]
    Fetch(#[source] PrError),

    #[error("Failed to post comment: {0}")]
    Post(#[source] PrError),

    #[error(transparent)]
    Pr(#[from] PrError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Failed to read patch file {path}: {source}")]
    PatchRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(ConfigError::Missing(_) | ConfigError::Invalid { .. }) => EXIT_MISSING_CONFIG,
            CliError::Pr(PrError::InvalidUrl(_)) => EXIT_MISSING_CONFIG,
            CliError::Fetch(_) => EXIT_FETCH_FAILED,
            CliError::Post(_) => EXIT_POST_FAILED,
            _ => EXIT_FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pr-helper failed");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(command: Command) -> Result<(), CliError> {
    let config = Config::load()?;
    let filter = FileFilter::new(&config.analysis);

    match command {
        Command::Action { dry_run } => {
            let run_config = config.run_config()?;
            let target = run_config.target;

            let client = GitHubClient::new(config.api_url(), run_config.token)?;
            let built_report = analyze_remote(&client, &target, &filter)
                .instrument(info_span!("action", pr = %target))
                .await?;
            println!("{}", report::render(&built_report.result));

            if dry_run {
                info!("dry run, not posting comment");
            } else {
                publish(&client, &target, &built_report).await?;
            }
        }
        Command::Analyze {
            pr_url,
            post,
            output,
        } => {
            let target = pr::parse_pr_url(&pr_url)?;
            let token = config
                .github_token()
                .ok_or(ConfigError::Missing(vec!["GITHUB_TOKEN"]))?;

            let client = GitHubClient::new(config.api_url(), token)?;
            let built_report = analyze_remote(&client, &target, &filter)
                .instrument(info_span!("analyze", pr = %target))
                .await?;
            report::output(&built_report, output.as_deref())?;

            if post {
                publish(&client, &target, &built_report).await?;
            }
        }
        Command::Diff { patch, output } => {
            let raw = std::fs::read_to_string(&patch).map_err(|source| CliError::PatchRead {
                path: patch.clone(),
                source,
            })?;
            let built_report = analyze_local(&raw, &patch.display().to_string(), &filter)?;
            report::output(&built_report, output.as_deref())?;
        }
        Command::Demo { output } => {
            info!("using sample diff for demo");
            let raw = include_str!("../tests/fixtures/sample_pr.patch");
            let built_report = analyze_local(raw, "sample_pr.patch", &filter)?;
            report::output(&built_report, output.as_deref())?;
        }
        Command::Login => login(&config).await?,
        Command::Logout => {
            let storage = token_storage()?;
            if storage.delete()? {
                println!("Removed stored token at {}", storage.path().display());
            } else {
                println!("No stored token found.");
            }
        }
    }

    Ok(())
}

/// Fetch the PR's changed files and run every analyzer over them.
async fn analyze_remote(
    source: &dyn PullRequestSource,
    target: &PrUrl,
    filter: &FileFilter,
) -> Result<Report, CliError> {
    info!("fetching changed files");
    let files = pr::collect_changed_files(source, target, filter)
        .await
        .map_err(CliError::Fetch)?;

    info!("running analysis");
    let result = analysis::run(&files, filter);
    Ok(report::build(result, target.to_string(), files.len()))
}

fn analyze_local(raw_diff: &str, source: &str, filter: &FileFilter) -> Result<Report, CliError> {
    let files: Vec<ChangedFile> = pr::diff::split_diff(raw_diff)?
        .into_iter()
        .filter(|f| filter.is_relevant(&f.filename))
        .collect();
    debug!(files = files.len(), "split local diff");

    let result = analysis::run(&files, filter);
    Ok(report::build(result, source, files.len()))
}

async fn publish(sink: &dyn CommentSink, target: &PrUrl, built_report: &Report) -> Result<(), CliError> {
    let body = report::comment_body(&report::render(&built_report.result));
    sink.post_comment(target, &body).await.map_err(CliError::Post)
}

fn token_storage() -> Result<TokenStorage, CliError> {
    TokenStorage::default_location().ok_or_else(|| {
        CliError::Auth(AuthError::Storage(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no configuration directory on this platform",
        )))
    })
}

async fn login(config: &Config) -> Result<(), CliError> {
    let client_id = config.client_id().ok_or(AuthError::MissingClientId)?;
    let storage = token_storage()?;
    let flow = DeviceFlow::new(client_id)?;

    let code = flow.request_code().await?;
    println!();
    println!("  To authenticate, visit: {}", code.verification_uri);
    println!("  Enter this code: {}", code.user_code);
    println!();
    println!("  Waiting for authorization (Ctrl-C to cancel)...");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match flow.poll_for_token(&code, &cancel).await? {
        LoginOutcome::Authorized(token) => {
            storage.save(&token)?;
            println!("Logged in. Token saved to {}", storage.path().display());
        }
        LoginOutcome::Cancelled => {
            warn!("login cancelled");
            println!("Login cancelled.");
        }
    }
    Ok(())
}
