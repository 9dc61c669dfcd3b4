//! Request middleware: authentication and request ids.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, trace, Instrument};

use super::error::ApiError;
use super::AppState;

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reject requests the configured authenticator does not accept.
///
/// The resolved [`crate::auth::Principal`] is stored in the request
/// extensions for downstream handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = state.authenticator.authenticate(req.headers()).map_err(|e| {
        debug!(error = %e, path = %req.uri().path(), "Authentication failed");
        ApiError::from(e)
    })?;

    trace!(principal = %principal, "Request authenticated");
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Tag every request with a fresh id, both in the tracing span and the response.
pub async fn request_id(req: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path()
    );

    async move {
        let mut response = next.run(req).await;
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        response
    }
    .instrument(span)
    .await
}
