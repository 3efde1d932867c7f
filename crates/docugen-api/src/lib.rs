//! The Submitter (C3) and inbound HTTP surface for the documentation job
//! orchestration engine.

pub mod error;
pub mod routes;
pub mod state;
pub mod submit;

use std::net::SocketAddr;
use std::sync::Arc;

use docugen_config::Config;
use docugen_db::PgJobRepo;
use docugen_queue::RedisBroker;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Build the database pool and broker connection, assemble `AppState`,
/// and serve the router until the process is killed. Shared by the
/// crate's own `docugen-api` binary and `docugen-cli serve`, the way
/// `buildit-cli`'s subcommands reuse `buildit-api`'s construction logic
/// rather than re-implementing it.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    info!("connecting to database...");
    let pool = docugen_db::create_pool(&config.database_url).await?;
    docugen_db::run_migrations(&pool).await?;
    info!("database connected");

    info!("connecting to redis...");
    let conn = docugen_queue::connect(&config.redis_url).await?;
    info!("redis connected");

    let job_repo: Arc<dyn docugen_db::JobRepo> = Arc::new(PgJobRepo::new(pool));
    let broker: Arc<dyn docugen_queue::TaskBroker> =
        Arc::new(RedisBroker::new(conn, "docugen"));
    let state = AppState::new(job_repo, broker, Arc::new(config));

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("starting server on {addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
