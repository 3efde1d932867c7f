//! Operator binary for the documentation job orchestration engine,
//! exposing `serve` (the Submitter/HTTP surface) and `work` (the Worker
//! Runtime) as separate subcommands, each meant to run as its own OS
//! process in production — mirroring `buildit-cli`'s pattern of thin
//! subcommands that build a config and hand off to a library crate.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use docugen_config::Config;
use docugen_core::{
    ArtifactPublisher, ArtifactStore, CodeAnalyzer, DocGenerator, RepositoryFetcher, TreeScanner,
    WorkspaceCleaner,
};
use docugen_db::PgJobRepo;
use docugen_pipeline::{
    Cleaner, ExtractorRegistry, GitFetcher, Generator, HttpModelClient, Publisher, S3ArtifactStore,
    WalkScanner,
};
use docugen_queue::RedisBroker;
use docugen_worker::WorkerPool;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docugen")]
#[command(about = "AI documentation job orchestration engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Submitter and inbound HTTP surface.
    Serve,
    /// Run the Worker Runtime: claim work items and drive the pipeline.
    Work,
    /// One-shot sweep of stale `pending` jobs into `enqueue-timeout`.
    Reap,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn load_config() -> Config {
    match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(64);
        }
    }
}

/// Assembles the Stage Tools from `Config`, grounded on §4.5/§4.6/§4.7's
/// per-stage tool descriptions.
async fn build_pipeline(config: &Config) -> docugen_pipeline::Pipeline {
    let fetcher: Arc<dyn RepositoryFetcher> = Arc::new(GitFetcher::new(config.fetch_timeout));
    let scanner: Arc<dyn TreeScanner> = Arc::new(WalkScanner::new(
        config.scanner_max_depth,
        config.scanner_max_files,
        config.scanner_ignored_names.clone(),
    ));
    let analyzer: Arc<dyn CodeAnalyzer> = Arc::new(ExtractorRegistry::new(config.analyzer_max_files));

    let generator: Arc<dyn DocGenerator> = Arc::new(Generator::new(
        HttpModelClient::new(
            config.model_base_url.clone(),
            config.model_api_key.clone(),
            config.model_name.clone(),
        ),
        config.model_output_token_budget,
        config.model_retries,
        config.generator_readme_budget_chars as usize,
    ));

    let store: Option<Arc<dyn ArtifactStore>> = if config.artifact_store_enabled {
        let bucket = config.artifact_store_bucket.clone().unwrap_or_default();
        Some(Arc::new(
            S3ArtifactStore::from_env(bucket, config.artifact_store_base_url.clone()).await,
        ))
    } else {
        None
    };
    let comment_model = Some(HttpModelClient::new(
        config.model_base_url.clone(),
        config.model_api_key.clone(),
        config.model_name.clone(),
    ));
    let publisher: Arc<dyn ArtifactPublisher> = Arc::new(Publisher::new(
        config.workspace_root.clone(),
        store,
        config.github_token.clone(),
        comment_model,
        config.model_output_token_budget,
    ));
    let cleaner: Arc<dyn WorkspaceCleaner> = Arc::new(Cleaner);

    docugen_pipeline::Pipeline {
        fetcher,
        scanner,
        analyzer,
        generator,
        publisher,
        cleaner,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_config();
            if let Err(e) = docugen_api::serve(config).await {
                eprintln!("server error: {e}");
                std::process::exit(70);
            }
        }
        Commands::Work => run_worker().await,
        Commands::Reap => run_reap().await,
    }

    Ok(())
}

async fn run_worker() {
    let config = load_config();

    let pool = match docugen_db::create_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("database unavailable: {e}");
            std::process::exit(70);
        }
    };
    if let Err(e) = docugen_db::run_migrations(&pool).await {
        eprintln!("migration error: {e}");
        std::process::exit(70);
    }

    let conn = match docugen_queue::connect(&config.redis_url).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("broker unavailable: {e}");
            std::process::exit(69);
        }
    };

    let job_repo: Arc<dyn docugen_db::JobRepo> = Arc::new(PgJobRepo::new(pool));
    let broker: Arc<dyn docugen_queue::TaskBroker> = Arc::new(RedisBroker::new(conn, "docugen"));
    let pipeline = Arc::new(build_pipeline(&config).await);
    let config = Arc::new(config);

    let worker_pool = WorkerPool::spawn(config, broker, job_repo, pipeline);
    worker_pool.run_until_ctrl_c().await;
    std::process::exit(0);
}

async fn run_reap() {
    let config = load_config();
    let pool = match docugen_db::create_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("database unavailable: {e}");
            std::process::exit(70);
        }
    };

    let job_repo: Arc<dyn docugen_db::JobRepo> = Arc::new(PgJobRepo::new(pool));
    let grace_period = chrono::Duration::from_std(config.reaper_grace_period)
        .unwrap_or_else(|_| chrono::Duration::seconds(15 * 60));
    match docugen_api::submit::reap_stale_pending(&job_repo, grace_period).await {
        Ok(reaped) => {
            println!("reaped {} stale pending job(s)", reaped.len());
            for id in reaped {
                println!("  {id}");
            }
        }
        Err(e) => {
            eprintln!("reap failed: {e:?}");
            std::process::exit(70);
        }
    }
}
