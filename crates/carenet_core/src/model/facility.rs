//! Facility record.

use super::individual::IndividualId;
use super::{insert_unique, remove_id};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage-assigned facility identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(pub i64);

impl Display for FacilityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hospital-like record with its associated individuals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
    /// Associated individuals in registration order, without duplicates.
    pub individual_ids: Vec<IndividualId>,
}

impl Facility {
    /// Builds a facility record with an empty association set.
    pub fn new(id: FacilityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            individual_ids: Vec::new(),
        }
    }

    /// Adds `individual` to the association set. Returns `false` when it was
    /// already present.
    pub fn link_individual(&mut self, individual: IndividualId) -> bool {
        insert_unique(&mut self.individual_ids, individual)
    }

    /// Drops `individual` from the association set. Returns `false` when it
    /// was not present.
    pub fn unlink_individual(&mut self, individual: IndividualId) -> bool {
        remove_id(&mut self.individual_ids, &individual)
    }

    pub fn has_individual(&self, individual: IndividualId) -> bool {
        self.individual_ids.contains(&individual)
    }
}
