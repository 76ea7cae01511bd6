//! ingest-watch - Progress subscription client for document ingestion tasks
//!
//! This is the main entry point for the ingest-watch binary. It attaches to
//! a running ingestion task on the knowledge-base backend, streams progress
//! to the terminal, and exits with a code that reflects the task's outcome.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use ingest_watch::cli::{Cli, Commands, ConfigSubcommand, LabelLanguage};
use ingest_watch::config::{self, WatchConfig};
use ingest_watch::error::{Error, Result};
use ingest_watch::subscription::{ConnectionState, ProgressHandler, TaskConnection};
use ingest_watch::types::{IngestStep, ProgressSnapshot, TaskStatus};
use ingest_watch::{logging, version};

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    // Commands that don't need full logging use a minimal setup
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return;
        }
        Commands::Config { subcommand } => {
            let _ = logging::init_simple(tracing::Level::WARN);
            if let Err(e) = handle_config_command(subcommand.clone()) {
                eprint!("{}", e.format_for_terminal());
                process::exit(e.exit_code());
            }
            return;
        }
        _ => {}
    }

    let config_path = match &cli.command {
        Commands::Watch { config, .. } | Commands::Cancel { config, .. } => config.clone(),
        _ => None,
    };

    // Load config (or use defaults)
    let config = match WatchConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            process::exit(e.exit_code());
        }
    };

    // Initialize logging with config settings.
    // The guards must be kept alive for the lifetime of the program.
    let _log_guards = match logging::init_logging(&config.logging, cli.verbose, cli.quiet) {
        Ok(guards) => guards,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            process::exit(e.exit_code());
        }
    };

    let result = match cli.command {
        Commands::Watch {
            task_id, labels, ..
        } => run_subscriber(config, &task_id, labels, false),
        Commands::Cancel { task_id, .. } => {
            run_subscriber(config, &task_id, LabelLanguage::En, true)
        }
        Commands::Version | Commands::Config { .. } => unreachable!(),
    };

    if let Err(e) = result {
        eprint!("{}", e.format_for_terminal());
        process::exit(e.exit_code());
    }
}

/// Handle `config show|init|validate`
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let config = WatchConfig::load(config.as_deref())?;
            let rendered = toml::to_string(&config)?;
            print!("{}", rendered);
            Ok(())
        }
        ConfigSubcommand::Init { path, force } => config::init_config(path.as_deref(), force),
        ConfigSubcommand::Validate { config } => {
            WatchConfig::load(config.as_deref())?;
            println!("Configuration is valid");
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Watch / Cancel Runner
// ─────────────────────────────────────────────────────────────────

/// Terminal outcome of one subscription, as seen by the CLI
#[derive(Debug)]
enum Outcome {
    Completed(ProgressSnapshot),
    Cancelled(ProgressSnapshot),
    Failed(String),
    GaveUp(u32),
}

/// Prints progress lines and reports the terminal outcome
struct CliProgressHandler {
    labels: LabelLanguage,
    outcome: mpsc::UnboundedSender<Outcome>,
}

impl CliProgressHandler {
    fn label(&self, step: IngestStep) -> &'static str {
        match self.labels {
            LabelLanguage::En => step.label_en(),
            LabelLanguage::Zh => step.label_zh(),
        }
    }
}

impl ProgressHandler for CliProgressHandler {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        println!(
            "[{:>3}%] {:<24} {}",
            snapshot.progress,
            self.label(snapshot.step),
            snapshot.message
        );
        if snapshot.status == TaskStatus::Cancelled {
            let _ = self.outcome.send(Outcome::Cancelled(snapshot.clone()));
        }
    }

    fn on_complete(&self, snapshot: &ProgressSnapshot) {
        let _ = self.outcome.send(Outcome::Completed(snapshot.clone()));
    }

    fn on_error(&self, error: &str) {
        let _ = self.outcome.send(Outcome::Failed(error.to_string()));
    }

    fn on_reconnecting(&self, attempt: u32) {
        eprintln!("Connection lost, reconnecting (attempt {})...", attempt);
    }

    fn on_gave_up(&self, attempts: u32) {
        let _ = self.outcome.send(Outcome::GaveUp(attempts));
    }
}

/// Subscribe to a task and block until it reaches a terminal outcome
fn run_subscriber(
    config: WatchConfig,
    task_id: &str,
    labels: LabelLanguage,
    cancel: bool,
) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

    rt.block_on(async {
        info!(task_id, url = %config.server.url, "Subscribing to task progress");

        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(CliProgressHandler {
            labels,
            outcome: outcome_tx,
        });

        let connection = TaskConnection::new(config.subscription_config(), handler);
        connection.connect(task_id)?;

        if cancel {
            wait_for_open(&connection).await;
            connection.cancel();
            println!("Cancel requested for task {}", task_id);
        }

        let outcome = outcome_rx.recv().await.ok_or_else(|| {
            Error::Internal("Subscription ended without a terminal outcome".to_string())
        })?;
        connection.disconnect();

        match outcome {
            Outcome::Completed(snapshot) => {
                match snapshot.chunk_count {
                    Some(chunks) => {
                        println!("Task {} completed ({} chunks indexed)", task_id, chunks)
                    }
                    None => println!("Task {} completed", task_id),
                }
                Ok(())
            }
            Outcome::Cancelled(_) => {
                println!("Task {} cancelled", task_id);
                Ok(())
            }
            Outcome::Failed(message) => Err(Error::task_failed(task_id, message)),
            Outcome::GaveUp(attempts) => Err(Error::ReconnectExhausted { attempts }),
        }
    })
}

/// Wait briefly for the subscription to open so a cancel request has a
/// connection to travel on
async fn wait_for_open(connection: &TaskConnection) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        match connection.state() {
            ConnectionState::Open | ConnectionState::Terminal => return,
            _ if tokio::time::Instant::now() >= deadline => return,
            _ => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
}
