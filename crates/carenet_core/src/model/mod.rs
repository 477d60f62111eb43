//! Registry domain model.
//!
//! # Responsibility
//! - Define the facility and individual records plus their typed ids.
//! - Keep association sets as explicit id lists, never live object graphs.
//!
//! # Invariants
//! - Ids are assigned by storage, start at 1, and are never reused.
//! - An association set holds each counterpart id at most once.
//! - Facility `F` lists individual `I` iff `I` lists `F`.

pub mod facility;
pub mod individual;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub use facility::{Facility, FacilityId};
pub use individual::{Individual, IndividualId};

/// Typed reference to one stored record, used in not-found reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecordRef {
    Facility(FacilityId),
    Individual(IndividualId),
}

impl Display for RecordRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Facility(id) => write!(f, "facility {id}"),
            Self::Individual(id) => write!(f, "individual {id}"),
        }
    }
}

impl From<FacilityId> for RecordRef {
    fn from(value: FacilityId) -> Self {
        Self::Facility(value)
    }
}

impl From<IndividualId> for RecordRef {
    fn from(value: IndividualId) -> Self {
        Self::Individual(value)
    }
}

/// Appends `id` unless already present. Returns whether the set changed.
fn insert_unique<T: PartialEq + Copy>(ids: &mut Vec<T>, id: T) -> bool {
    if ids.contains(&id) {
        return false;
    }
    ids.push(id);
    true
}

/// Removes `id` when present, preserving the order of the rest.
fn remove_id<T: PartialEq>(ids: &mut Vec<T>, id: &T) -> bool {
    let before = ids.len();
    ids.retain(|current| current != id);
    ids.len() != before
}

#[cfg(test)]
mod tests {
    use super::{Facility, FacilityId, IndividualId, RecordRef};
    use serde_json::json;

    #[test]
    fn ids_serialize_as_bare_integers() {
        let mut facility = Facility::new(FacilityId(1), "General Hospital");
        facility.link_individual(IndividualId(4));
        assert_eq!(
            serde_json::to_value(&facility).unwrap(),
            json!({ "id": 1, "name": "General Hospital", "individual_ids": [4] })
        );
    }

    #[test]
    fn record_ref_is_tagged_by_kind() {
        let value = serde_json::to_value(RecordRef::Individual(IndividualId(9))).unwrap();
        assert_eq!(value, json!({ "kind": "individual", "id": 9 }));
        assert_eq!(RecordRef::Facility(FacilityId(3)).to_string(), "facility 3");
    }

    #[test]
    fn association_sets_reject_duplicates_and_keep_order() {
        let mut facility = Facility::new(FacilityId(1), "");
        assert!(facility.link_individual(IndividualId(2)));
        assert!(facility.link_individual(IndividualId(1)));
        assert!(!facility.link_individual(IndividualId(2)));
        assert_eq!(facility.individual_ids, vec![IndividualId(2), IndividualId(1)]);

        assert!(facility.unlink_individual(IndividualId(2)));
        assert!(!facility.unlink_individual(IndividualId(2)));
        assert_eq!(facility.individual_ids, vec![IndividualId(1)]);
    }
}
