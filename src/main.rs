//! gated-pipeline
//!
//! Runs the resilient gated operation pipeline from the command line.
//!
//! # Architecture Overview
//!
//! ```text
//!   register --dir DIR                      mint --artist-id .. --user-id ..
//!         │                                          │
//!         ▼                                          ▼
//!   discovery (**/*.json)                    one OperationRequest
//!         │                                          │
//!         └──────────────┬───────────────────────────┘
//!                        ▼
//!   ┌───────────────────────────────────────────────────────────┐
//!   │                        PIPELINE                           │
//!   │  validate → scope(acquire) → retry(attempt) → gate        │
//!   │           → execute → release → audit (exactly once)      │
//!   └───────────────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!        JSON summary on stdout, exit code 0 / 1 / 2
//! ```
//!
//! # Exit codes
//! - `0`: every run succeeded
//! - `1`: configuration or a required dependency is missing
//! - `2`: at least one run ended in a non-success outcome

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use gated_pipeline::audit::{AuditSink, JsonlLedger};
use gated_pipeline::blockchain::{MintOperation, Wallet};
use gated_pipeline::config::{load_config, PipelineConfig};
use gated_pipeline::gate::{DecisionGate, HttpDecisionEngine};
use gated_pipeline::lifecycle::signals::spawn_ctrl_c_handler;
use gated_pipeline::lifecycle::startup::{check_mint, check_register, report};
use gated_pipeline::lifecycle::{CancelToken, CancellationSignal};
use gated_pipeline::observability::logging::init_logging;
use gated_pipeline::observability::metrics::init_metrics;
use gated_pipeline::pipeline::{Pipeline, PipelineReport};
use gated_pipeline::registry::{discover, RegistrationOperation};
use gated_pipeline::resilience::RetryExecutor;
use gated_pipeline::validation::{OperationRequest, Target};

const EXIT_MISSING_DEPENDENCY: u8 = 1;
const EXIT_RUN_FAILED: u8 = 2;

#[derive(Parser)]
#[command(name = "gated-pipeline")]
#[command(about = "Resilient gated operation pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register every service definition found under a directory
    Register {
        /// Discovery directory (defaults to registry.discovery_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Mint tokens for an artist/user pair once the decision engine agrees
    Mint {
        #[arg(long)]
        artist_id: String,
        #[arg(long)]
        user_id: String,
        /// Address receiving the minted tokens
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: Option<u64>,
        /// Composition descriptor passed to the decision engine
        #[arg(long)]
        composition: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_MISSING_DEPENDENCY);
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(EXIT_MISSING_DEPENDENCY);
    }

    tracing::info!("gated-pipeline v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address"),
        }
    }

    let signal = Arc::new(CancellationSignal::new());
    spawn_ctrl_c_handler(signal.clone());
    let cancel = signal.token();

    let outcome = match cli.command {
        Commands::Register { dir } => run_register(&config, dir, &cancel).await,
        Commands::Mint {
            artist_id,
            user_id,
            recipient,
            amount,
            composition,
        } => {
            let mut request = OperationRequest::new(format!("{}:{}", artist_id, user_id))
                .with_field("artist_id", artist_id)
                .with_field("user_id", user_id)
                .with_field("recipient", recipient);
            if let Some(amount) = amount {
                request = request.with_field("amount", amount);
            }
            if let Some(composition) = composition {
                request = request.with_target(Target::Composition(composition));
            }
            run_mint(&config, request, &cancel).await
        }
    };

    match outcome {
        Ok(reports) => summarize(&reports),
        Err(code) => code,
    }
}

async fn run_register(
    config: &PipelineConfig,
    dir: Option<PathBuf>,
    cancel: &CancelToken,
) -> Result<Vec<PipelineReport>, ExitCode> {
    let dir = dir.unwrap_or_else(|| config.registry.discovery_dir.clone());
    if !report(&check_register(&dir)) {
        return Err(ExitCode::from(EXIT_MISSING_DEPENDENCY));
    }

    let requests: Vec<OperationRequest> = match discover(&dir) {
        Ok(documents) => documents.into_iter().map(|doc| doc.into_request()).collect(),
        Err(e) => {
            tracing::error!(error = %e, "Service discovery failed");
            return Err(ExitCode::from(EXIT_MISSING_DEPENDENCY));
        }
    };
    if requests.is_empty() {
        tracing::warn!(dir = %dir.display(), "No service definitions found");
    }

    let pipeline = Pipeline::new(
        RegistrationOperation::new(config.registry.clone()),
        retry_executor(config)?,
        audit_sink(config),
    );
    Ok(pipeline.run_all(&requests, config.workers.concurrency, cancel).await)
}

async fn run_mint(
    config: &PipelineConfig,
    request: OperationRequest,
    cancel: &CancelToken,
) -> Result<Vec<PipelineReport>, ExitCode> {
    if !report(&check_mint(config, |name| std::env::var(name).ok())) {
        return Err(ExitCode::from(EXIT_MISSING_DEPENDENCY));
    }

    let wallet = Wallet::from_env(config.blockchain.chain_id).map_err(|e| {
        tracing::error!(error = %e, "Mint signer unavailable");
        ExitCode::from(EXIT_MISSING_DEPENDENCY)
    })?;
    let operation = MintOperation::new(config.blockchain.clone(), config.mint.clone(), wallet).map_err(|e| {
        tracing::error!(error = %e, "Mint operation unavailable");
        ExitCode::from(EXIT_MISSING_DEPENDENCY)
    })?;
    let engine = HttpDecisionEngine::from_config(&config.decision).map_err(|e| {
        tracing::error!(error = %e, "Decision engine unavailable");
        ExitCode::from(EXIT_MISSING_DEPENDENCY)
    })?;
    let gate = DecisionGate::new(Arc::new(engine), &config.decision.affirmative_keywords);

    let pipeline = Pipeline::new(operation, retry_executor(config)?, audit_sink(config)).with_gate(gate);
    Ok(vec![pipeline.run(&request, cancel).await])
}

fn retry_executor(config: &PipelineConfig) -> Result<RetryExecutor, ExitCode> {
    RetryExecutor::from_config(&config.retries).map_err(|e| {
        tracing::error!(error = %e, "Invalid retry configuration");
        ExitCode::from(EXIT_MISSING_DEPENDENCY)
    })
}

fn audit_sink(config: &PipelineConfig) -> AuditSink {
    AuditSink::new(Arc::new(JsonlLedger::new(&config.audit.directory)))
        .with_dead_letter(Arc::new(JsonlLedger::new(&config.audit.dead_letter_directory)))
}

fn summarize(reports: &[PipelineReport]) -> ExitCode {
    let succeeded = reports.iter().filter(|r| r.outcome.is_success()).count();
    let summary = json!({
        "runs": reports.len(),
        "succeeded": succeeded,
        "failed": reports.len() - succeeded,
        "reports": reports,
    });

    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::error!(error = %e, "Failed to render summary"),
    }

    tracing::info!(runs = reports.len(), succeeded, "Pipeline finished");
    if succeeded == reports.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_RUN_FAILED)
    }
}
