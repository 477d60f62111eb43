//! RPC routes for the registry.
//!
//! # Responsibility
//! - Expose one `POST /rpc/<Method>` route per registry operation.
//! - Run every call on its own blocking worker so SQLite I/O never stalls
//!   the async runtime.
//! - Map registry outcomes to JSON bodies or a single error envelope.
//!
//! # Invariants
//! - A failed call returns only an `ErrorResponse`, never partial data.
//! - `NotFound` maps to 404; every other failure maps to 500.

use crate::messages::{
    Empty, ErrorResponse, FacilityResponse, HealthResponse, IndividualResponse,
    ListFacilitiesResponse, ListIndividualsResponse, MethodsResponse,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use carenet_core::{
    CreateFacilityRequest, CreateIndividualRequest, DeleteFacilityRequest,
    DeleteIndividualRequest, ListFacilitiesOfIndividualRequest, ListIndividualsOfFacilityRequest,
    ModifyFacilityRequest, ModifyIndividualRequest, RegisterRequest, RegistryError,
    RegistryResult, RegistryService, SqliteRecordStore,
};
use log::{debug, error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

/// Registry shared by all request workers.
pub type SharedRegistry = Arc<Mutex<RegistryService<SqliteRecordStore>>>;

/// Every RPC method name, in route order.
pub const METHODS: &[&str] = &[
    "CreateFacility",
    "ModifyFacility",
    "DeleteFacility",
    "CreateIndividual",
    "ModifyIndividual",
    "DeleteIndividual",
    "Register",
    "ListIndividualsOfFacility",
    "ListFacilitiesOfIndividual",
    "ListAllIndividuals",
    "ListAllFacilities",
];

/// Failure of one RPC call.
#[derive(Debug)]
pub enum RpcError {
    Registry(RegistryError),
    /// Blocking worker panicked or was cancelled.
    Worker(String),
}

impl Display for RpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry(err) => write!(f, "{err}"),
            Self::Worker(message) => write!(f, "request worker failed: {message}"),
        }
    }
}

impl Error for RpcError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistryError> for RpcError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl RpcError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Registry(err) if err.is_not_found() => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorResponse {
            code: code.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type RpcResult<T> = Result<Json<T>, RpcError>;

/// Builds the RPC router around an explicitly wired registry.
pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/rpc", get(list_methods))
        .route("/rpc/CreateFacility", post(create_facility))
        .route("/rpc/ModifyFacility", post(modify_facility))
        .route("/rpc/DeleteFacility", post(delete_facility))
        .route("/rpc/CreateIndividual", post(create_individual))
        .route("/rpc/ModifyIndividual", post(modify_individual))
        .route("/rpc/DeleteIndividual", post(delete_individual))
        .route("/rpc/Register", post(register))
        .route(
            "/rpc/ListIndividualsOfFacility",
            post(list_individuals_of_facility),
        )
        .route(
            "/rpc/ListFacilitiesOfIndividual",
            post(list_facilities_of_individual),
        )
        .route("/rpc/ListAllIndividuals", post(list_all_individuals))
        .route("/rpc/ListAllFacilities", post(list_all_facilities))
        .with_state(registry)
}

/// Runs `op` against the registry on a dedicated blocking worker.
async fn dispatch<T, F>(registry: SharedRegistry, method: &'static str, op: F) -> RpcResult<T>
where
    T: Send + 'static,
    F: FnOnce(&RegistryService<SqliteRecordStore>) -> RegistryResult<T> + Send + 'static,
{
    debug!("event=rpc_call module=rpc status=start method={method}");
    let outcome = tokio::task::spawn_blocking(move || {
        let service = lock_registry(&registry, method);
        op(&*service).map_err(RpcError::from)
    })
    .await
    .map_err(|err| RpcError::Worker(err.to_string()))
    .and_then(|result| result);

    match &outcome {
        Ok(_) => debug!("event=rpc_call module=rpc status=ok method={method}"),
        Err(err) => {
            let (status, code) = err.status_and_code();
            if status == StatusCode::NOT_FOUND {
                warn!(
                    "event=rpc_call module=rpc status=error method={method} http_status={} error_code={code}",
                    status.as_u16()
                );
            } else {
                error!(
                    "event=rpc_call module=rpc status=error method={method} http_status={} error_code={code} error={err}",
                    status.as_u16()
                );
            }
        }
    }
    outcome.map(Json)
}

/// Locks the registry, taking over a lock poisoned by a panicked worker.
///
/// A panic inside a unit of work drops its open transaction, so the store
/// is already rolled back when the next caller gets here.
fn lock_registry<'a>(
    registry: &'a SharedRegistry,
    method: &'static str,
) -> MutexGuard<'a, RegistryService<SqliteRecordStore>> {
    registry.lock().unwrap_or_else(|poisoned| {
        warn!("event=registry_lock module=rpc status=recovered method={method}");
        registry.clear_poison();
        poisoned.into_inner()
    })
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: carenet_core::core_version().to_string(),
    })
}

async fn list_methods() -> Json<MethodsResponse> {
    Json(MethodsResponse {
        methods: METHODS.iter().map(|method| (*method).to_string()).collect(),
    })
}

async fn create_facility(
    State(registry): State<SharedRegistry>,
    Json(request): Json<CreateFacilityRequest>,
) -> RpcResult<FacilityResponse> {
    dispatch(registry, "CreateFacility", move |service| {
        service.create_facility(&request).map(FacilityResponse::from)
    })
    .await
}

async fn modify_facility(
    State(registry): State<SharedRegistry>,
    Json(request): Json<ModifyFacilityRequest>,
) -> RpcResult<FacilityResponse> {
    dispatch(registry, "ModifyFacility", move |service| {
        service.modify_facility(&request).map(FacilityResponse::from)
    })
    .await
}

async fn delete_facility(
    State(registry): State<SharedRegistry>,
    Json(request): Json<DeleteFacilityRequest>,
) -> RpcResult<Empty> {
    dispatch(registry, "DeleteFacility", move |service| {
        service.delete_facility(&request).map(|()| Empty {})
    })
    .await
}

async fn create_individual(
    State(registry): State<SharedRegistry>,
    Json(request): Json<CreateIndividualRequest>,
) -> RpcResult<IndividualResponse> {
    dispatch(registry, "CreateIndividual", move |service| {
        service
            .create_individual(&request)
            .map(IndividualResponse::from)
    })
    .await
}

async fn modify_individual(
    State(registry): State<SharedRegistry>,
    Json(request): Json<ModifyIndividualRequest>,
) -> RpcResult<IndividualResponse> {
    dispatch(registry, "ModifyIndividual", move |service| {
        service
            .modify_individual(&request)
            .map(IndividualResponse::from)
    })
    .await
}

async fn delete_individual(
    State(registry): State<SharedRegistry>,
    Json(request): Json<DeleteIndividualRequest>,
) -> RpcResult<Empty> {
    dispatch(registry, "DeleteIndividual", move |service| {
        service.delete_individual(&request).map(|()| Empty {})
    })
    .await
}

async fn register(
    State(registry): State<SharedRegistry>,
    Json(request): Json<RegisterRequest>,
) -> RpcResult<Empty> {
    dispatch(registry, "Register", move |service| {
        service.register(&request).map(|()| Empty {})
    })
    .await
}

async fn list_individuals_of_facility(
    State(registry): State<SharedRegistry>,
    Json(request): Json<ListIndividualsOfFacilityRequest>,
) -> RpcResult<ListIndividualsResponse> {
    dispatch(registry, "ListIndividualsOfFacility", move |service| {
        service
            .list_individuals_of_facility(&request)
            .map(ListIndividualsResponse::from)
    })
    .await
}

async fn list_facilities_of_individual(
    State(registry): State<SharedRegistry>,
    Json(request): Json<ListFacilitiesOfIndividualRequest>,
) -> RpcResult<ListFacilitiesResponse> {
    dispatch(registry, "ListFacilitiesOfIndividual", move |service| {
        service
            .list_facilities_of_individual(&request)
            .map(ListFacilitiesResponse::from)
    })
    .await
}

// The list-all methods take no input; any request body is ignored.
async fn list_all_individuals(
    State(registry): State<SharedRegistry>,
) -> RpcResult<ListIndividualsResponse> {
    dispatch(registry, "ListAllIndividuals", |service| {
        service
            .list_all_individuals()
            .map(ListIndividualsResponse::from)
    })
    .await
}

async fn list_all_facilities(
    State(registry): State<SharedRegistry>,
) -> RpcResult<ListFacilitiesResponse> {
    dispatch(registry, "ListAllFacilities", |service| {
        service
            .list_all_facilities()
            .map(ListFacilitiesResponse::from)
    })
    .await
}
