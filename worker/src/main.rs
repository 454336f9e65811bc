//! Worker binary entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use extractor::{ExtractionEngine, RateLimiter};
use shared::logging::init_tracing_with_level;
use shared::{process_info, process_warn, Platform, WorkerId};
use worker::{
    register_interrupt, InterruptAction, MySqlStore, RealModelInvoker, RealTaskCoordinator, Worker, WorkerConfig,
    WorkerError, WorkerResult,
};

#[derive(Parser)]
#[command(name = "worker")]
#[command(about = "Claims extraction tasks and writes place-name results back to the central store")]
struct Args {
    /// Process a single task (or find none) and exit
    #[arg(long)]
    once: bool,

    /// Log level for the workspace crates (RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Model name (overrides PLACE_EXTRACT_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// LLM platform: siliconflow, aliyun or openrouter (overrides LLM_PLATFORM)
    #[arg(long)]
    platform: Option<Platform>,

    /// Concurrent batch invocations (overrides MAX_WORKERS)
    #[arg(long)]
    workers: Option<usize>,

    /// Request-rate ceiling across all invocations, 0 for none (overrides MAX_QPS)
    #[arg(long)]
    qps: Option<f64>,
}

impl Args {
    fn apply(&self, config: &mut WorkerConfig) -> WorkerResult<()> {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(qps) = self.qps {
            config.max_qps = qps;
        }
        config.validate()
    }
}

fn load_env_file(path: Option<&PathBuf>) -> WorkerResult<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .map_err(|e| WorkerError::config(format!("cannot load {}: {}", path.display(), e)))?;
        }
        None => {
            // a missing ./.env is fine
            let _ = dotenvy::dotenv();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> WorkerResult<()> {
    let args = Args::parse();

    load_env_file(args.env_file.as_ref())?;
    init_tracing_with_level(args.log_level.as_deref());

    let mut config = WorkerConfig::from_env()?;
    args.apply(&mut config)?;

    let worker_id = WorkerId::init(config.worker_name.as_deref());
    process_info!(
        worker_id,
        coordinator = %config.coordinator_url,
        platform = %config.platform,
        model = %config.model,
        "Worker configured"
    );

    let invoker = RealModelInvoker::from_env(config.platform)?;
    if !invoker.has_api_key() {
        process_warn!(
            worker_id,
            "{} is not set, {} calls will fail",
            config.platform.api_key_vars().join(" / "),
            config.platform
        );
    }

    let engine = ExtractionEngine::new(
        Arc::new(invoker),
        Arc::new(RateLimiter::new(config.max_qps)),
        config.engine_config()?,
    )?;
    let coordinator = RealTaskCoordinator::new(&config.coordinator_url)?;
    let store = MySqlStore::connect(&config).await?;

    let worker = Worker::new(coordinator, store.clone(), store, engine, config.poll_interval);

    let shutdown = worker.shutdown_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match register_interrupt(&shutdown) {
                InterruptAction::Graceful => {
                    process_warn!(
                        WorkerId::current(),
                        "🛑 Interrupt received, finishing current work (press Ctrl-C again to exit now)"
                    );
                }
                InterruptAction::Force => {
                    process_warn!(WorkerId::current(), "🛑 Second interrupt received, exiting immediately");
                    std::process::exit(130);
                }
            }
        }
    });

    worker.run(args.once).await
}
