//! The Job Store for the documentation job orchestration engine.
//!
//! Provides the `JobRepo` trait and its PostgreSQL implementation.

pub mod error;
pub mod repo;

pub use error::{DbError, DbResult};
pub use repo::{JobRepo, PgJobRepo};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
