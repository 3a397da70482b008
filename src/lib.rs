mod api;
mod config;
mod database;
mod memory;
mod models;
mod repo;
mod schema;

use axum::{serve::Serve, Router};
use tokio::net::TcpListener;
use tracing::info;

pub use api::{build_app, ApiError, ApiOptions};
pub use config::{Config, ConfigError};
pub use database::{create_db_pool, DBPool, DatabaseBookRepo, DatabaseError};
pub use memory::{InMemoryBookRepo, MemoryError};
pub use models::{Book, BookChanges, BookInput, NewBook, ValidationErrors};
pub use repo::{BookRepo, RepoError, RepoResult};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create DB connection pool: {0}")]
    Pool(#[from] diesel_async::pooled_connection::PoolError),

    #[error("failed to bind listener: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn start_server(
    config: &Config,
) -> Result<Serve<TcpListener, Router, Router>, StartupError> {
    let pool = create_db_pool(&config.database_url, config.pool_max_size).await?;
    let repo = DatabaseBookRepo::new(pool);

    let router = build_app(
        repo,
        ApiOptions {
            expose_delete: config.expose_delete,
        },
    );

    let listener = TcpListener::bind(config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Listening on {}", local_addr);

    Ok(axum::serve(listener, router))
}
