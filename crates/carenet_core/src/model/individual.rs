//! Individual record.

use super::facility::FacilityId;
use super::{insert_unique, remove_id};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage-assigned individual identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndividualId(pub i64);

impl Display for IndividualId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Patient-like record with the facilities it is registered at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    pub id: IndividualId,
    pub name: String,
    /// Associated facilities in registration order, without duplicates.
    pub facility_ids: Vec<FacilityId>,
}

impl Individual {
    pub fn new(id: IndividualId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            facility_ids: Vec::new(),
        }
    }

    pub fn link_facility(&mut self, facility: FacilityId) -> bool {
        insert_unique(&mut self.facility_ids, facility)
    }

    pub fn unlink_facility(&mut self, facility: FacilityId) -> bool {
        remove_id(&mut self.facility_ids, &facility)
    }

    pub fn has_facility(&self, facility: FacilityId) -> bool {
        self.facility_ids.contains(&facility)
    }
}
