//! Registry request handler.
//!
//! # Responsibility
//! - Expose one entry point per request kind (create/modify/delete/register/list).
//! - Map store and association outcomes to typed results or typed errors.
//!
//! # Invariants
//! - Each request runs as exactly one store unit of work.
//! - Lookups happen before mutations, so `NotFound` never leaves partial edits.
//! - The service keeps no state between requests.

use crate::model::{Facility, FacilityId, Individual, IndividualId};
use crate::repo::record_store::RecordStore;
use crate::service::association::AssociationManager;
use crate::service::error::{RegistryError, RegistryResult};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFacilityRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyFacilityRequest {
    pub id: FacilityId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFacilityRequest {
    pub id: FacilityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndividualRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyIndividualRequest {
    pub id: IndividualId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteIndividualRequest {
    pub id: IndividualId,
}

/// Links one individual to one facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub facility_id: FacilityId,
    pub individual_id: IndividualId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListIndividualsOfFacilityRequest {
    pub facility_id: FacilityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFacilitiesOfIndividualRequest {
    pub individual_id: IndividualId,
}

/// Request handler wired explicitly with its store and association manager.
pub struct RegistryService<S: RecordStore> {
    store: S,
    associations: AssociationManager,
}

impl<S: RecordStore> RegistryService<S> {
    pub fn new(store: S, associations: AssociationManager) -> Self {
        Self {
            store,
            associations,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a facility with an empty association set.
    pub fn create_facility(&self, request: &CreateFacilityRequest) -> RegistryResult<Facility> {
        observe("create_facility", || {
            self.store
                .atomically(|store| store.insert_facility(&request.name))
                .map_err(RegistryError::from)
        })
    }

    /// Renames an existing facility. Associations are untouched.
    pub fn modify_facility(&self, request: &ModifyFacilityRequest) -> RegistryResult<Facility> {
        observe("modify_facility", || {
            self.store.atomically(|store| {
                let mut facility = store
                    .get_facility(request.id)?
                    .ok_or_else(|| RegistryError::not_found(request.id))?;
                facility.name.clone_from(&request.name);
                Ok(store.update_facility(&facility)?)
            })
        })
    }

    /// Detaches the facility from all individuals and deletes it.
    pub fn delete_facility(&self, request: &DeleteFacilityRequest) -> RegistryResult<()> {
        observe("delete_facility", || {
            self.store.atomically(|store| {
                let facility = store
                    .get_facility(request.id)?
                    .ok_or_else(|| RegistryError::not_found(request.id))?;
                self.associations
                    .deregister_facility_on_delete(store, &facility)
            })
        })
    }

    /// Creates an individual with an empty association set.
    pub fn create_individual(
        &self,
        request: &CreateIndividualRequest,
    ) -> RegistryResult<Individual> {
        observe("create_individual", || {
            self.store
                .atomically(|store| store.insert_individual(&request.name))
                .map_err(RegistryError::from)
        })
    }

    /// Renames an existing individual. Associations are untouched.
    pub fn modify_individual(
        &self,
        request: &ModifyIndividualRequest,
    ) -> RegistryResult<Individual> {
        observe("modify_individual", || {
            self.store.atomically(|store| {
                let mut individual = store
                    .get_individual(request.id)?
                    .ok_or_else(|| RegistryError::not_found(request.id))?;
                individual.name.clone_from(&request.name);
                Ok(store.update_individual(&individual)?)
            })
        })
    }

    /// Detaches the individual from all facilities and deletes it.
    pub fn delete_individual(&self, request: &DeleteIndividualRequest) -> RegistryResult<()> {
        observe("delete_individual", || {
            self.store.atomically(|store| {
                let individual = store
                    .get_individual(request.id)?
                    .ok_or_else(|| RegistryError::not_found(request.id))?;
                self.associations
                    .deregister_individual_on_delete(store, &individual)
            })
        })
    }

    /// Associates an individual with a facility on both sides. Idempotent.
    pub fn register(&self, request: &RegisterRequest) -> RegistryResult<()> {
        observe("register", || {
            self.associations
                .register(&self.store, request.facility_id, request.individual_id)
        })
    }

    /// Lists the facility's individuals in registration order.
    pub fn list_individuals_of_facility(
        &self,
        request: &ListIndividualsOfFacilityRequest,
    ) -> RegistryResult<Vec<Individual>> {
        observe("list_individuals_of_facility", || {
            self.store.atomically(|store| {
                let facility = store
                    .get_facility(request.facility_id)?
                    .ok_or_else(|| RegistryError::not_found(request.facility_id))?;
                self.associations.individuals_of(store, &facility)
            })
        })
    }

    /// Lists the individual's facilities in registration order.
    pub fn list_facilities_of_individual(
        &self,
        request: &ListFacilitiesOfIndividualRequest,
    ) -> RegistryResult<Vec<Facility>> {
        observe("list_facilities_of_individual", || {
            self.store.atomically(|store| {
                let individual = store
                    .get_individual(request.individual_id)?
                    .ok_or_else(|| RegistryError::not_found(request.individual_id))?;
                self.associations.facilities_of(store, &individual)
            })
        })
    }

    pub fn list_all_individuals(&self) -> RegistryResult<Vec<Individual>> {
        observe("list_all_individuals", || {
            self.store
                .atomically(|store| store.list_individuals())
                .map_err(RegistryError::from)
        })
    }

    pub fn list_all_facilities(&self) -> RegistryResult<Vec<Facility>> {
        observe("list_all_facilities", || {
            self.store
                .atomically(|store| store.list_facilities())
                .map_err(RegistryError::from)
        })
    }

    /// Reads one facility without going through the RPC surface.
    pub fn get_facility(&self, id: FacilityId) -> RegistryResult<Option<Facility>> {
        Ok(self.store.get_facility(id)?)
    }

    /// Reads one individual without going through the RPC surface.
    pub fn get_individual(&self, id: IndividualId) -> RegistryResult<Option<Individual>> {
        Ok(self.store.get_individual(id)?)
    }
}

fn observe<T>(event: &'static str, op: impl FnOnce() -> RegistryResult<T>) -> RegistryResult<T> {
    let started_at = Instant::now();
    let result = op();
    match &result {
        Ok(_) => info!(
            "event={event} module=registry status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) if err.is_not_found() => warn!(
            "event={event} module=registry status=error duration_ms={} error_code={} error={}",
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
        Err(err) => error!(
            "event={event} module=registry status=error duration_ms={} error_code={} error={}",
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
    result
}
