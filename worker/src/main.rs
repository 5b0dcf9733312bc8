//! Worker entrypoint for conclave
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use conclave_application::{
    JobMessage, JobOutcome, JobPayload, JobQueue, ProcessJobUseCase, RunStore,
};
use conclave_domain::{Priority, Run, RunId, RunKind};
use conclave_infrastructure::{
    ConfigLoader, FileConfig, HttpEvaluationService, MemoryJobQueue, MemoryRunStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod consumer;

use consumer::WorkerPool;

#[derive(Parser)]
#[command(
    name = "conclave-worker",
    about = "Proposal evaluation pipeline worker",
    version
)]
struct Cli {
    /// Path to a config file (highest priority source)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip config file discovery and use built-in defaults
    #[arg(long)]
    no_config: bool,

    /// Override the configured worker concurrency
    #[arg(long)]
    concurrency: Option<usize>,

    /// Evaluate one idea end to end and print the decision, then exit
    #[arg(long, value_name = "IDEA")]
    demo: Option<String>,

    /// Queue the demo run at high priority
    #[arg(long, requires = "demo")]
    high_priority: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting conclave worker");

    let config: FileConfig = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };

    let policy = config.panel.to_policy()?;
    let budgets = config.worker.to_budgets();
    let concurrency = cli.concurrency.unwrap_or(config.worker.concurrency);

    // === Dependency Injection ===
    let service = Arc::new(HttpEvaluationService::new(
        &config.evaluation.base_url,
        config.evaluation.timeout(),
    )?);
    let store = MemoryRunStore::new();
    let queue = MemoryJobQueue::new();
    let use_case = Arc::new(
        ProcessJobUseCase::new(service, Arc::new(store.clone()))
            .with_policy(policy)
            .with_budgets(budgets),
    );

    if let Some(idea) = cli.demo {
        let priority = if cli.high_priority {
            Priority::High
        } else {
            Priority::Normal
        };
        return run_demo(idea, priority, &queue, &store, use_case).await;
    }

    // Ctrl-C closes the queue and cancels the intake loop; the pool then
    // drains in-flight jobs within the configured timeout.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        let queue = queue.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                queue.close();
                shutdown.cancel();
            }
        });
    }

    let pool = WorkerPool::new(
        Arc::new(queue),
        use_case,
        concurrency,
        config.worker.drain_timeout(),
    );
    pool.run(shutdown).await?;

    info!("Worker stopped");
    Ok(())
}

/// Publish a single idea, process it inline, and print the decision
async fn run_demo(
    idea: String,
    priority: Priority,
    queue: &MemoryJobQueue,
    store: &MemoryRunStore,
    use_case: Arc<ProcessJobUseCase<HttpEvaluationService, MemoryRunStore>>,
) -> Result<()> {
    let run = store
        .create_run(Run::queued(RunId::generate(), priority))
        .await?;
    println!("Queued run {}", run.id);

    let message = JobMessage {
        run_id: run.id.clone(),
        run_kind: RunKind::Initial,
        priority,
        payload: JobPayload {
            idea,
            security_concern: false,
        },
    };
    queue.publish(&message).await?;

    let delivery = queue
        .receive()
        .await?
        .context("queue closed before the demo job was delivered")?;
    let outcome = match use_case.process(delivery.body()).await {
        Ok(outcome) => {
            delivery.ack().await?;
            outcome
        }
        Err(e) => {
            delivery.nack().await?;
            return Err(e.into());
        }
    };

    match outcome {
        JobOutcome::Completed { decision } => {
            let aggregation = store
                .decision(&run.id)
                .context("run completed but no decision was persisted")?;

            println!();
            println!(
                "Decision: {} (weighted confidence {:.4})",
                decision, aggregation.weighted_confidence
            );
            println!();
            println!("Breakdown:");
            for contribution in &aggregation.breakdown {
                println!(
                    "  {:<14} weight {:.2}  confidence {:.2}  -> {:.4}",
                    contribution.evaluator.as_str(),
                    contribution.weight,
                    contribution.confidence,
                    contribution.weighted
                );
            }
            if !aggregation.minority_reports.is_empty() {
                println!();
                println!("Minority reports:");
                for report in &aggregation.minority_reports {
                    println!(
                        "  {} (confidence {:.2}): {}",
                        report.evaluator.as_str(),
                        report.confidence,
                        report.mitigation
                    );
                }
            }
            Ok(())
        }
        other => Err(anyhow!("unexpected demo outcome: {:?}", other)),
    }
}
