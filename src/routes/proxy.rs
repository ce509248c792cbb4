//! Raw passthrough to the engine for everything the gateway does not model.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderName};
use axum::response::Response;

use crate::engine::RawResponse;
use crate::error::AppError;
use crate::state::{AppState, SharedState};

/// Transport-level headers that no longer describe the buffered body.
const STRIPPED_RESPONSE_HEADERS: [HeaderName; 4] = [
    header::CONTENT_ENCODING,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

/// ANY /api/{*path}: forward to the engine at `/{path}` with no auth check,
/// provided the path is on the passthrough allow-list.
pub async fn passthrough(
    State(state): State<SharedState>,
    req: Request,
) -> Result<Response, AppError> {
    // Nested under /api, so the URI here already has the prefix stripped.
    let path = req.uri().path().to_string();
    if !state.config.passthrough.allows(&path) {
        tracing::warn!("Passthrough refused for {} {}", req.method(), path);
        return Err(AppError::Forbidden(format!("path not proxied: {path}")));
    }
    tracing::debug!("Passthrough {} {}", req.method(), path);
    forward(&state, &path, req).await
}

/// Send `req` to the engine at `path`, keeping method, headers, query and body.
pub(crate) async fn forward(
    state: &AppState,
    path: &str,
    req: Request,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| AppError::BadRequest(format!("failed to read request body: {e}")))?;

    // content-encoding is dropped on relay, so the engine must answer in identity.
    let mut headers = parts.headers;
    headers.remove(header::ACCEPT_ENCODING);

    let raw = state
        .engine
        .call(parts.method, path, &headers, body, parts.uri.query())
        .await?;
    Ok(relay(raw))
}

/// Turn a buffered engine reply into a response for the caller.
pub fn relay(raw: RawResponse) -> Response {
    let mut headers = raw.headers;
    for name in &STRIPPED_RESPONSE_HEADERS {
        headers.remove(name);
    }

    let mut resp = Response::new(Body::from(raw.body));
    *resp.status_mut() = raw.status;
    *resp.headers_mut() = headers;
    resp
}
