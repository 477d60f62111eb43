//! Wire messages returned by the RPC surface.
//!
//! Requests reuse the typed request structs from `carenet_core`; responses
//! carry only id and name, never the association sets.

use carenet_core::{Facility, Individual};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityResponse {
    pub id: i64,
    pub name: String,
}

impl From<Facility> for FacilityResponse {
    fn from(value: Facility) -> Self {
        Self {
            id: value.id.0,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualResponse {
    pub id: i64,
    pub name: String,
}

impl From<Individual> for IndividualResponse {
    fn from(value: Individual) -> Self {
        Self {
            id: value.id.0,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFacilitiesResponse {
    pub facilities: Vec<FacilityResponse>,
}

impl From<Vec<Facility>> for ListFacilitiesResponse {
    fn from(value: Vec<Facility>) -> Self {
        Self {
            facilities: value.into_iter().map(FacilityResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListIndividualsResponse {
    pub individuals: Vec<IndividualResponse>,
}

impl From<Vec<Individual>> for ListIndividualsResponse {
    fn from(value: Vec<Individual>) -> Self {
        Self {
            individuals: value.into_iter().map(IndividualResponse::from).collect(),
        }
    }
}

/// Body of operations that succeed without a payload; serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Failure envelope. The only body a failed call carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// `NOT_FOUND` or `INTERNAL`.
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Method discovery listing served at `GET /rpc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodsResponse {
    pub methods: Vec<String>,
}
