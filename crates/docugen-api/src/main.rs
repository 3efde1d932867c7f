//! Standalone binary for the Submitter/HTTP surface, mirroring
//! `buildit-api`'s `buildit-server` binary.

use docugen_config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    docugen_api::serve(config).await
}
