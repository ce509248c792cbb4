use axum::{
    extract::{Path, Query, Request, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::auth_routes::{non_empty, UsernameQuery};
use super::proxy;
use crate::engine::EngineError;
use crate::error::AppError;
use crate::normalize::{self, NormalizedMessage, SessionSummary, UNTITLED};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CreateSession {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct CreatedSession {
    pub id: String,
    pub title: String,
}

#[derive(Deserialize)]
pub struct SendMessage {
    #[serde(default, rename = "providerID")]
    pub provider_id: Option<String>,
    #[serde(default, rename = "modelID")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Engine path for session `id`. The id arrives percent-decoded, so it is
/// encoded again to stay a single path segment. Dot segments would be
/// resolved away by the URL parser and are refused.
fn session_path(id: &str, suffix: &str) -> Result<String, AppError> {
    if id == "." || id == ".." {
        return Err(AppError::BadRequest("无效的会话ID".into()));
    }
    Ok(format!("/session/{}{}", urlencoding::encode(id), suffix))
}

/// GET /sessions?username=: engine sessions the user owns.
pub async fn list_sessions(
    State(state): State<SharedState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    let username =
        non_empty(query.username).ok_or_else(|| AppError::BadRequest("缺少用户名".into()))?;

    let owned = state.store.list_sessions(&username).await;
    let payload = state.engine.get_json("/session").await?;
    Ok(Json(normalize::owned_sessions(payload, &owned)?))
}

/// POST /sessions: mint a session on the engine and link it to the user.
pub async fn create_session(
    State(state): State<SharedState>,
    Json(body): Json<CreateSession>,
) -> Result<Json<CreatedSession>, AppError> {
    let username =
        non_empty(body.username).ok_or_else(|| AppError::BadRequest("缺少用户名".into()))?;

    let mut request = json!({});
    if let Some(ref title) = body.title {
        request["title"] = Value::String(title.clone());
    }
    let created = state.engine.post_json("/session", &request).await?;

    let id = created
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(EngineError::MissingField("id"))?
        .to_string();
    let title = created
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(body.title)
        .unwrap_or_else(|| UNTITLED.to_string());

    // The user may have vanished between the engine call and here.
    state.store.add_session(&username, &id).await?;
    tracing::info!("Session {} created for {}", id, username);

    Ok(Json(CreatedSession { id, title }))
}

/// GET /sessions/{id}/messages
pub async fn list_messages(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<NormalizedMessage>>, AppError> {
    let payload = state
        .engine
        .get_json(&session_path(&id, "/message")?)
        .await?;
    let items = normalize::collection(payload, "messages")?;
    Ok(Json(normalize::simplify_messages(&items)))
}

/// POST /sessions/{id}/messages
pub async fn send_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessage>,
) -> Result<Json<NormalizedMessage>, AppError> {
    let (Some(provider_id), Some(model_id), Some(message)) = (
        non_empty(body.provider_id),
        non_empty(body.model_id),
        non_empty(body.message),
    ) else {
        return Err(AppError::BadRequest("缺少模型或消息内容".into()));
    };

    let payload =
        normalize::outbound_payload(&provider_id, &model_id, body.mode.as_deref(), &message);
    let reply = state
        .engine
        .post_json(&session_path(&id, "/message")?, &payload)
        .await?;

    let normalized = normalize::normalize_reply(&reply, &provider_id, &model_id);
    if normalized.is_error {
        tracing::warn!("Engine reported an error for session {}: {}", id, normalized.text);
    }
    Ok(Json(normalized))
}

/// PATCH /sessions/{id}: verbatim passthrough.
pub async fn patch_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    req: Request,
) -> Result<Response, AppError> {
    proxy::forward(&state, &session_path(&id, "")?, req).await
}

/// DELETE /sessions/{id}?username=: passthrough, then best-effort unlink
/// whatever the engine answered.
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<UsernameQuery>,
    req: Request,
) -> Result<Response, AppError> {
    let resp = proxy::forward(&state, &session_path(&id, "")?, req).await;

    if let Some(username) = non_empty(query.username) {
        if let Err(e) = state.store.remove_session(&username, &id).await {
            tracing::warn!("Failed to unlink session {} from {}: {}", id, username, e);
        }
    }
    resp
}
