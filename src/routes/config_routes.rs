use axum::{extract::State, Json};
use serde_json::Value;

use crate::error::AppError;
use crate::normalize;
use crate::state::SharedState;

/// GET /config/providers
pub async fn providers(State(state): State<SharedState>) -> Result<Json<Vec<Value>>, AppError> {
    let payload = state.engine.get_json("/config/providers").await?;
    Ok(Json(normalize::providers(payload)?))
}
