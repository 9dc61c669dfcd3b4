//! HTTP API built on axum.
//!
//! Public routes (`/`, `/health`) need nothing. Routes under `/api/v1`
//! pass authentication first, then each handler spends one token from the
//! caller's bucket through the [`AdmissionGate`] before touching the store.

mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
mod server;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use server::{serve_listener, HttpServer};

use crate::admission::{AdmissionGate, IdentityResolver};
use crate::auth::Authenticator;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    pub authenticator: Arc<dyn Authenticator>,
    pub identity: IdentityResolver,
}

impl AppState {
    pub fn new(
        gate: Arc<AdmissionGate>,
        authenticator: Arc<dyn Authenticator>,
        identity: IdentityResolver,
    ) -> Self {
        Self {
            gate,
            authenticator,
            identity,
        }
    }
}

/// Build the full router.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/set", post(handlers::set_key))
        .route("/get/{key}", get(handlers::get_key))
        .route("/del/{key}", delete(handlers::delete_key))
        .route("/keys", get(handlers::list_keys))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
