//! Association manager for the facility ↔ individual relationship.
//!
//! # Responsibility
//! - Be the only place that mutates both sides of an association.
//! - Detach a record from every counterpart before it is deleted.
//!
//! # Invariants
//! - Facility `F` lists individual `I` iff `I` lists `F`, at every commit.
//! - Every operation runs inside one `RecordStore::atomically` unit, so a
//!   failure at any step leaves the store as it was.
//! - Deletion is two-phase: counterpart ids are collected before any
//!   counterpart is rewritten.
//!
//! No locking happens here; concurrent writers are serialized by the store's
//! transaction discipline.

use crate::model::{Facility, FacilityId, Individual, IndividualId, RecordRef};
use crate::repo::record_store::{RecordStore, RepoError};
use crate::service::error::{RegistryError, RegistryResult};
use log::debug;

/// Stateless coordinator for association edits; all state lives in the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssociationManager;

impl AssociationManager {
    pub fn new() -> Self {
        Self
    }

    /// Links `individual_id` to `facility_id` on both sides.
    ///
    /// Registering an existing link is a no-op.
    ///
    /// # Errors
    /// - `NotFound` naming every missing side when either record is absent.
    pub fn register<S: RecordStore>(
        &self,
        store: &S,
        facility_id: FacilityId,
        individual_id: IndividualId,
    ) -> RegistryResult<()> {
        store.atomically(|store| {
            let facility = store.get_facility(facility_id)?;
            let individual = store.get_individual(individual_id)?;
            let (mut facility, mut individual) = match (facility, individual) {
                (Some(facility), Some(individual)) => (facility, individual),
                (facility, individual) => {
                    let mut missing = Vec::with_capacity(2);
                    if facility.is_none() {
                        missing.push(RecordRef::Facility(facility_id));
                    }
                    if individual.is_none() {
                        missing.push(RecordRef::Individual(individual_id));
                    }
                    return Err(RegistryError::NotFound { missing });
                }
            };

            let facility_changed = facility.link_individual(individual.id);
            let individual_changed = individual.link_facility(facility.id);
            if facility_changed {
                store.update_facility(&facility)?;
            }
            if individual_changed {
                store.update_individual(&individual)?;
            }

            debug!(
                "event=association_register module=association facility_id={} individual_id={} changed={}",
                facility.id,
                individual.id,
                facility_changed || individual_changed
            );
            Ok(())
        })
    }

    /// Detaches `facility` from every individual, then deletes it.
    ///
    /// `facility` must have been loaded inside the caller's unit of work.
    pub fn deregister_facility_on_delete<S: RecordStore>(
        &self,
        store: &S,
        facility: &Facility,
    ) -> RegistryResult<()> {
        store.atomically(|store| {
            let counterpart_ids = facility.individual_ids.clone();
            for individual_id in &counterpart_ids {
                let mut individual = store
                    .get_individual(*individual_id)?
                    .ok_or_else(|| dangling(facility.id.into(), (*individual_id).into()))?;
                if individual.unlink_facility(facility.id) {
                    store.update_individual(&individual)?;
                }
            }

            store.delete_facility(facility.id)?;
            debug!(
                "event=association_detach module=association facility_id={} detached={}",
                facility.id,
                counterpart_ids.len()
            );
            Ok(())
        })
    }

    /// Detaches `individual` from every facility, then deletes it.
    ///
    /// `individual` must have been loaded inside the caller's unit of work.
    pub fn deregister_individual_on_delete<S: RecordStore>(
        &self,
        store: &S,
        individual: &Individual,
    ) -> RegistryResult<()> {
        store.atomically(|store| {
            let counterpart_ids = individual.facility_ids.clone();
            for facility_id in &counterpart_ids {
                let mut facility = store
                    .get_facility(*facility_id)?
                    .ok_or_else(|| dangling(individual.id.into(), (*facility_id).into()))?;
                if facility.unlink_individual(individual.id) {
                    store.update_facility(&facility)?;
                }
            }

            store.delete_individual(individual.id)?;
            debug!(
                "event=association_detach module=association individual_id={} detached={}",
                individual.id,
                counterpart_ids.len()
            );
            Ok(())
        })
    }

    /// Loads the individuals associated with `facility`, in registration order.
    pub fn individuals_of<S: RecordStore>(
        &self,
        store: &S,
        facility: &Facility,
    ) -> RegistryResult<Vec<Individual>> {
        facility
            .individual_ids
            .iter()
            .map(|id| {
                store
                    .get_individual(*id)?
                    .ok_or_else(|| dangling(facility.id.into(), (*id).into()))
            })
            .collect()
    }

    /// Loads the facilities associated with `individual`, in registration order.
    pub fn facilities_of<S: RecordStore>(
        &self,
        store: &S,
        individual: &Individual,
    ) -> RegistryResult<Vec<Facility>> {
        individual
            .facility_ids
            .iter()
            .map(|id| {
                store
                    .get_facility(*id)?
                    .ok_or_else(|| dangling(individual.id.into(), (*id).into()))
            })
            .collect()
    }
}

fn dangling(owner: RecordRef, target: RecordRef) -> RegistryError {
    RegistryError::Store(RepoError::InvalidData(format!(
        "{owner} references missing {target}"
    )))
}
