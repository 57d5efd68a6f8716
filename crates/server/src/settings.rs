//! Settings endpoints.

use api_types::settings::SettingWrite;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{ServerError, server::ServerState};

/// The typed settings view the frontend consumes.
pub async fn list(
    State(state): State<ServerState>,
) -> Result<Json<engine::ScrapeSettings>, ServerError> {
    let settings = state.engine.scrape_settings().await?;
    Ok(Json(settings))
}

pub async fn get_one(
    State(state): State<ServerState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    match state.engine.get_setting(&key).await? {
        Some(value) => Ok(Json(value)),
        None => Err(ServerError::Engine(engine::EngineError::KeyNotFound(
            format!("setting {key} not set"),
        ))),
    }
}

pub async fn set_one(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(payload): Json<SettingWrite>,
) -> Result<StatusCode, ServerError> {
    state.engine.set_setting(&key, payload.value).await?;
    Ok(StatusCode::NO_CONTENT)
}
