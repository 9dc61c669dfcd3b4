//! HTTP request handlers.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::Json;

use super::error::ApiError;
use super::models::{HealthResponse, KeysResponse, MessageResponse, ResultResponse, SetRequest};
use super::AppState;
use crate::admission::{Operation, Outcome};

/// Rate-limit identity of the caller, resolved from forwarding headers or
/// the peer address. Never fails; see [`crate::admission::IdentityResolver`].
#[derive(Debug, Clone)]
pub struct ClientIdentity(pub String);

impl FromRequestParts<AppState> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIdentity(state.identity.resolve(&parts.headers, peer)))
    }
}

/// `GET /`
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to LunarDB API".to_string(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        keys: state.gate.store().len(),
        clients: state.gate.registry().len(),
    })
}

/// `POST /api/v1/set`
pub async fn set_key(
    State(state): State<AppState>,
    ClientIdentity(identity): ClientIdentity,
    payload: Result<Json<SetRequest>, JsonRejection>,
) -> Result<Json<ResultResponse>, ApiError> {
    let request = match parse_set_request(payload) {
        Ok(request) => request,
        Err(err) => {
            // Malformed requests still cost a token
            state.gate.check(&identity)?;
            return Err(err);
        }
    };

    let op = Operation::Set {
        key: request.key,
        value: request.value,
    };
    match state.gate.execute(&identity, op)? {
        Outcome::Stored => Ok(Json(ResultResponse::ok())),
        other => Err(unexpected(other)),
    }
}

fn parse_set_request(payload: Result<Json<SetRequest>, JsonRejection>) -> Result<SetRequest, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    if request.key.is_empty() {
        return Err(ApiError::BadRequest("Field 'key' is required".to_string()));
    }
    if request.value.is_empty() {
        return Err(ApiError::BadRequest("Field 'value' is required".to_string()));
    }
    Ok(request)
}

/// `GET /api/v1/get/{key}`
pub async fn get_key(
    State(state): State<AppState>,
    ClientIdentity(identity): ClientIdentity,
    Path(key): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    match state.gate.execute(&identity, Operation::Get { key })? {
        Outcome::Value(Some(value)) => Ok(Json(ResultResponse { result: value })),
        Outcome::Value(None) => Err(ApiError::NotFound("Key not found".to_string())),
        other => Err(unexpected(other)),
    }
}

/// `DELETE /api/v1/del/{key}`
pub async fn delete_key(
    State(state): State<AppState>,
    ClientIdentity(identity): ClientIdentity,
    Path(key): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    match state.gate.execute(&identity, Operation::Delete { key })? {
        Outcome::Deleted(true) => Ok(Json(ResultResponse::ok())),
        Outcome::Deleted(false) => Err(ApiError::NotFound("Key not found".to_string())),
        other => Err(unexpected(other)),
    }
}

/// `GET /api/v1/keys`
pub async fn list_keys(
    State(state): State<AppState>,
    ClientIdentity(identity): ClientIdentity,
) -> Result<Json<KeysResponse>, ApiError> {
    match state.gate.execute(&identity, Operation::List)? {
        Outcome::Keys(keys) => Ok(Json(KeysResponse { keys })),
        other => Err(unexpected(other)),
    }
}

fn unexpected(outcome: Outcome) -> ApiError {
    ApiError::Internal(format!("Unexpected store outcome: {:?}", outcome))
}
