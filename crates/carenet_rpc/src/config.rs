//! Server configuration.
//!
//! # Invariants
//! - `bind` is a parsed socket address; malformed input never reaches
//!   the listener.
//! - A `db_path` of `:memory:` selects an ephemeral in-memory store.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_DB_PATH: &str = "carenet.sqlite3";
const IN_MEMORY_DB_PATH: &str = ":memory:";

/// Where the server stores records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub store: StoreLocation,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidBind {
        value: String,
        source: std::net::AddrParseError,
    },
    EmptyDbPath,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBind { value, source } => {
                write!(f, "invalid bind address `{value}`: {source}")
            }
            Self::EmptyDbPath => write!(f, "db_path cannot be empty"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidBind { source, .. } => Some(source),
            Self::EmptyDbPath => None,
        }
    }
}

impl ServerConfig {
    /// Validates raw bind/db-path settings.
    pub fn from_parts(bind: &str, db_path: &str) -> Result<Self, ConfigError> {
        let trimmed_bind = bind.trim();
        let bind = trimmed_bind
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidBind {
                value: trimmed_bind.to_string(),
                source,
            })?;

        let store = match db_path.trim() {
            "" => return Err(ConfigError::EmptyDbPath),
            IN_MEMORY_DB_PATH => StoreLocation::InMemory,
            path => StoreLocation::File(PathBuf::from(path)),
        };

        Ok(Self { bind, store })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            store: StoreLocation::File(PathBuf::from(DEFAULT_DB_PATH)),
        }
    }
}
