//! Registry wiring and HTTP serving.
//!
//! # Responsibility
//! - Build the registry by explicit construction: connection -> store ->
//!   association manager -> request handler.
//! - Serve the RPC router until a shutdown signal arrives.

use crate::api::{router, SharedRegistry};
use crate::config::{ServerConfig, StoreLocation};
use carenet_core::db::{open_db, open_db_in_memory, DbError};
use carenet_core::{AssociationManager, RegistryService, RepoError, SqliteRecordStore};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Failure while wiring or serving the registry.
#[derive(Debug)]
pub enum ServerError {
    Db(DbError),
    Store(RepoError),
    Io(std::io::Error),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "failed to open registry database: {err}"),
            Self::Store(err) => write!(f, "failed to initialize record store: {err}"),
            Self::Io(err) => write!(f, "server i/o failure: {err}"),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<DbError> for ServerError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for ServerError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Opens the configured store and wires the request handler around it.
pub fn build_registry(location: &StoreLocation) -> Result<SharedRegistry, ServerError> {
    let conn = match location {
        StoreLocation::File(path) => open_db(path)?,
        StoreLocation::InMemory => {
            warn!("event=registry_build module=rpc status=ok store=memory persistent=false");
            open_db_in_memory()?
        }
    };
    let store = SqliteRecordStore::try_new(conn)?;
    let service = RegistryService::new(store, AssociationManager::new());
    Ok(Arc::new(Mutex::new(service)))
}

/// Binds `config.bind` and serves until ctrl-c.
pub async fn serve(config: &ServerConfig, registry: SharedRegistry) -> Result<(), ServerError> {
    let listener = TcpListener::bind(config.bind).await?;
    serve_on(listener, registry, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: TcpListener,
    registry: SharedRegistry,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let local_addr = listener.local_addr()?;
    info!("event=server_start module=rpc status=ok addr={local_addr}");
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("event=server_stop module=rpc status=ok addr={local_addr}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("event=server_signal module=rpc status=error error={err}");
        std::future::pending::<()>().await;
    }
}
