//! Core domain logic for the carenet registry.
//! This crate is the single source of truth for the facility/individual
//! association invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{Facility, FacilityId, Individual, IndividualId, RecordRef};
pub use repo::record_store::{RecordStore, RepoError, RepoResult, SqliteRecordStore};
pub use service::association::AssociationManager;
pub use service::error::{RegistryError, RegistryResult};
pub use service::registry_service::{
    CreateFacilityRequest, CreateIndividualRequest, DeleteFacilityRequest,
    DeleteIndividualRequest, ListFacilitiesOfIndividualRequest, ListIndividualsOfFacilityRequest,
    ModifyFacilityRequest, ModifyIndividualRequest, RegisterRequest, RegistryService,
};

/// Minimal health-check API for transport smoke checks.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
