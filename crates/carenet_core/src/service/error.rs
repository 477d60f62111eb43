//! Registry service error taxonomy.
//!
//! `NotFound` is the only domain error; everything else is a store failure
//! passed through unchanged.

use crate::model::RecordRef;
use crate::repo::record_store::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors from registry operations.
#[derive(Debug)]
pub enum RegistryError {
    /// One or more referenced records do not exist. Lists every missing
    /// record, facility first.
    NotFound { missing: Vec<RecordRef> },
    /// Storage-layer failure.
    Store(RepoError),
}

impl RegistryError {
    pub fn not_found(record: impl Into<RecordRef>) -> Self {
        Self::NotFound {
            missing: vec![record.into()],
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable machine-readable code used in logs and transport envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Store(_) => "store_failure",
        }
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { missing } => {
                for (index, record) in missing.iter().enumerate() {
                    if index > 0 {
                        write!(f, " and ")?;
                    }
                    write!(f, "{record}")?;
                }
                write!(f, " not found")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<RepoError> for RegistryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(record) => Self::not_found(record),
            other => Self::Store(other),
        }
    }
}
