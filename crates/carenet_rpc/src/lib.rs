//! HTTP/JSON RPC surface for the carenet registry.
//!
//! # Responsibility
//! - Translate wire requests into `RegistryService` calls and back.
//! - Own transport concerns (routing, status codes, workers, shutdown).
//!
//! # Invariants
//! - Handlers never touch SQLite directly; they go through the registry.

pub mod api;
pub mod config;
pub mod messages;
pub mod server;

pub use api::{router, RpcError, SharedRegistry, METHODS};
pub use config::{ConfigError, ServerConfig, StoreLocation};
pub use server::{build_registry, serve, serve_on, ServerError};
