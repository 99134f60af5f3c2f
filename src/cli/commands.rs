//! CLI command definitions for review-loop.
//!
//! Each subcommand runs one batch task of the review workflow. Task inputs
//! arrive through environment variables set by the workflow orchestrator.

use std::sync::Arc;

use anyhow::Context;
use aws_config::BehaviorVersion;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::notify::SnsNotifier;
use crate::pipeline::{
    CompletionConfig, CompletionOutcome, ConfigError, DispatchConfig, LogLevel, MergeConfig, ResultMerge,
    ReviewCompletion, ReviewDispatch,
};
use crate::review::SageMakerReviewService;
use crate::staging::DynamoDbStagingTable;
use crate::storage::S3ObjectStore;
use crate::workflow::{StepFunctionsClient, TaskToken};

/// Human review loop for named-entity annotations.
#[derive(Parser)]
#[command(name = "review-loop")]
#[command(about = "Dispatch, complete and merge human entity reviews")]
#[command(version)]
#[command(
    long_about = "review-loop runs the batch tasks of a human-in-the-loop entity review workflow.\n\nThe workflow orchestrator runs `dispatch` to open one review per manifest record, `complete` for every finished review, and `merge` to build the reviewed manifest.\n\nTask settings are read from the environment (EXECUTION_ID, INPUT_MANIFEST, ...)."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (DEBUG, INFO, WARNING, ERROR).
    #[arg(short, long, env = "LOG_LEVEL", value_enum, ignore_case = true, global = true)]
    pub log_level: Option<LogLevel>,
}

impl Cli {
    /// Filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> &'static str {
        self.log_level.unwrap_or_default().as_filter()
    }
}

/// The dispatch task must be given a log level, by flag or by `LOG_LEVEL`.
fn require_log_level(log_level: Option<LogLevel>) -> Result<LogLevel, ConfigError> {
    log_level.ok_or_else(|| ConfigError::MissingEnvVar("LOG_LEVEL".to_string()))
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Open one human review per manifest record.
    Dispatch,

    /// Merge completed reviews into the output manifest.
    Merge,

    /// Record that a human review finished and resume the workflow after the last one.
    Complete(CompleteArgs),
}

/// Arguments for `review-loop complete`.
#[derive(Parser, Debug)]
pub struct CompleteArgs {
    /// Name of the human loop that reached a terminal state.
    #[arg(long, env = "HUMAN_LOOP_NAME")]
    pub human_loop_name: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Dispatch => run_dispatch_command(cli.log_level).await,
        Commands::Merge => run_merge_command().await,
        Commands::Complete(args) => run_complete_command(args).await,
    }
}

async fn run_dispatch_command(log_level: Option<LogLevel>) -> anyhow::Result<()> {
    require_log_level(log_level).context("Invalid dispatch configuration")?;
    let token = TaskToken::from_env().context("Cannot read the task token")?;
    let config = DispatchConfig::from_env().context("Invalid dispatch configuration")?;

    let sdk = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let dispatch = ReviewDispatch::new(
        config.clone(),
        Arc::new(S3ObjectStore::from_sdk_config(&sdk)),
        Arc::new(SageMakerReviewService::from_sdk_config(&sdk)),
        Arc::new(DynamoDbStagingTable::from_sdk_config(
            &sdk,
            &config.staging_table_name,
        )),
        Arc::new(StepFunctionsClient::from_sdk_config(&sdk)),
        Arc::new(SnsNotifier::from_sdk_config(
            &sdk,
            &config.execution.sns_topic_arn,
        )),
    );

    let cancel = shutdown_token();
    let report = dispatch.execute(&token, &cancel).await?;
    info!(
        loops_started = report.loops_started,
        resolution = ?report.resolution,
        "Dispatch complete"
    );
    Ok(())
}

async fn run_merge_command() -> anyhow::Result<()> {
    let token = TaskToken::from_env().context("Cannot read the task token")?;
    let config = MergeConfig::from_env().context("Invalid merge configuration")?;

    let sdk = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let notifier = SnsNotifier::from_sdk_config(&sdk, &config.execution.sns_topic_arn);
    let merge = ResultMerge::new(
        config,
        Arc::new(S3ObjectStore::from_sdk_config(&sdk)),
        Arc::new(StepFunctionsClient::from_sdk_config(&sdk)),
        Arc::new(notifier),
    );

    let report = merge.execute(&token).await?;
    info!(records = report.records_written, "Merge complete");
    Ok(())
}

async fn run_complete_command(args: CompleteArgs) -> anyhow::Result<()> {
    let config = CompletionConfig::from_env().context("Invalid completion configuration")?;

    let sdk = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let completion = ReviewCompletion::new(
        Arc::new(SageMakerReviewService::from_sdk_config(&sdk)),
        Arc::new(DynamoDbStagingTable::from_sdk_config(
            &sdk,
            &config.staging_table_name,
        )),
        Arc::new(StepFunctionsClient::from_sdk_config(&sdk)),
    );

    match completion.handle(&args.human_loop_name).await? {
        CompletionOutcome::Resumed { execution_id } => {
            info!(execution_id = %execution_id, "All reviews complete")
        }
        CompletionOutcome::Pending {
            execution_id,
            remaining,
        } => info!(execution_id = %execution_id, remaining, "Waiting for more reviews"),
    }
    Ok(())
}

/// Cancellation token fired on Ctrl+C or SIGTERM.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });
    cancel
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, cancelling");
        },
        _ = terminate => {
            warn!("Received SIGTERM, cancelling");
        },
    }
}
