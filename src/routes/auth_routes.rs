use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub username: String,
}

#[derive(Deserialize)]
pub struct SessionLink {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    pub username: Option<String>,
}

/// `Some(value)` when the field was sent and is not empty.
pub(crate) fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

/// POST /auth/register
pub async fn register(
    State(state): State<SharedState>,
    Json(body): Json<Credentials>,
) -> Result<Json<AuthResponse>, AppError> {
    let (Some(username), Some(password)) = (non_empty(body.username), non_empty(body.password))
    else {
        return Err(AppError::BadRequest("用户名和密码不能为空".into()));
    };

    state.store.register(&username, &password).await?;

    Ok(Json(AuthResponse {
        success: true,
        username,
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<SharedState>,
    Json(body): Json<Credentials>,
) -> Result<Json<AuthResponse>, AppError> {
    let username = body.username.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    if !state.store.verify(&username, &password).await {
        tracing::info!("Login failed for {:?}", username);
        return Err(AppError::Unauthorized("用户名或密码错误".into()));
    }

    tracing::info!("Login succeeded for {}", username);
    Ok(Json(AuthResponse {
        success: true,
        username,
    }))
}

/// POST /auth/add_session
pub async fn add_session(
    State(state): State<SharedState>,
    Json(body): Json<SessionLink>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (username, session_id) = require_link(body)?;
    state.store.add_session(&username, &session_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /auth/user_sessions?username=
pub async fn user_sessions(
    State(state): State<SharedState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let username =
        non_empty(query.username).ok_or_else(|| AppError::BadRequest("缺少用户名".into()))?;
    Ok(Json(state.store.list_sessions(&username).await))
}

/// POST /auth/remove_session
pub async fn remove_session(
    State(state): State<SharedState>,
    Json(body): Json<SessionLink>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (username, session_id) = require_link(body)?;
    state.store.remove_session(&username, &session_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

fn require_link(body: SessionLink) -> Result<(String, String), AppError> {
    match (non_empty(body.username), non_empty(body.session_id)) {
        (Some(username), Some(session_id)) => Ok((username, session_id)),
        _ => Err(AppError::BadRequest("缺少用户名或会话ID".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_filters_blank_fields() {
        assert_eq!(non_empty(Some("a".into())), Some("a".into()));
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn session_link_reads_camel_case_id() {
        let link: SessionLink =
            serde_json::from_str(r#"{"username": "alice", "sessionId": "ses_1"}"#).unwrap();
        let (u, s) = require_link(link).unwrap();
        assert_eq!((u.as_str(), s.as_str()), ("alice", "ses_1"));

        let link: SessionLink = serde_json::from_str(r#"{"username": "alice"}"#).unwrap();
        assert!(matches!(require_link(link), Err(AppError::BadRequest(_))));
    }
}
