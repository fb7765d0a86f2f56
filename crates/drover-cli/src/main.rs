use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use drover_core::app::{QueueRunner, RunnerConfig};
use drover_core::domain::QueueName;
use drover_core::impls::{InMemoryJobQueue, SubprocessPoolFactory};
use tracing_subscriber::EnvFilter;

/// Demo worker used when no worker command is configured: prints its job and naps.
const DEMO_WORKER: &str = "echo \"working on $1 ($3)\"; sleep 1";

#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(version)]
#[command(about = "Drain a job queue through a pool of worker subprocesses")]
struct Args {
    /// Queue to run (immediate, queued, large, ...)
    #[arg(default_value = QueueName::QUEUED)]
    queue: String,

    /// JSON config file; environment variables are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of demo jobs to seed before running
    #[arg(long, default_value = "3")]
    jobs: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let queue_name = QueueName::new(args.queue);

    // (A) 設定：ファイルがあればそれを、なければ環境変数
    let mut config = match &args.config {
        Some(path) => RunnerConfig::from_json_file(path)?,
        None => RunnerConfig::from_env()?,
    };
    if config.worker_command.is_none() {
        config.worker_command = Some(vec!["sh".into(), "-c".into(), DEMO_WORKER.into()]);
    }
    tracing::info!(config = %serde_json::to_string(&config)?, "Runner configured");

    // (B) Queue を用意してデモ用の job を投入
    let store = Arc::new(InMemoryJobQueue::new());
    for i in 0..args.jobs {
        let id = store
            .enqueue(queue_name.clone(), "demo", format!("demo job {i}"))
            .await;
        tracing::info!(job_id = %id, queue = %queue_name, "Enqueued demo job");
    }

    // (C) runner を回す（pool が空になり claim できる job がなくなるまで）
    let runner = QueueRunner::new(
        store.clone(),
        Arc::new(SubprocessPoolFactory::default()),
        config,
    );
    runner.run_queue(&queue_name).await?;

    // (D) worker は状態を書き戻さないので、ここでは Initializing のまま残る
    let counts = store.counts_by_status().await;
    tracing::info!(counts = %serde_json::to_string(&counts)?, "Final job counts");
    Ok(())
}
