//! Categorization rules and mapping endpoints.

use api_types::rules::{MappingSet, RuleNew, RuleUpdate, RuleView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::{CategorizationRule, CategoryMapping};

fn view(rule: CategorizationRule) -> RuleView {
    RuleView {
        id: rule.id,
        name_pattern: rule.name_pattern,
        target_category: rule.target_category,
        is_active: rule.is_active,
        created_at: rule.created_at,
    }
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<Vec<RuleView>>, ServerError> {
    let rules = state.engine.list_rules().await?;
    Ok(Json(rules.into_iter().map(view).collect()))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<RuleNew>,
) -> Result<(StatusCode, Json<RuleView>), ServerError> {
    let rule = state
        .engine
        .create_rule(&payload.name_pattern, &payload.target_category)
        .await?;
    Ok((StatusCode::CREATED, Json(view(rule))))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RuleUpdate>,
) -> Result<Json<RuleView>, ServerError> {
    let rule = state
        .engine
        .update_rule(
            id,
            payload.name_pattern.as_deref(),
            payload.target_category.as_deref(),
            payload.is_active,
        )
        .await?;
    Ok(Json(view(rule)))
}

pub async fn remove(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_mappings(
    State(state): State<ServerState>,
) -> Result<Json<Vec<MappingSet>>, ServerError> {
    let mappings = state.engine.list_category_mappings().await?;
    Ok(Json(
        mappings
            .into_iter()
            .map(|m| MappingSet {
                source_category: m.source_category,
                target_category: m.target_category,
            })
            .collect(),
    ))
}

pub async fn set_mapping(
    State(state): State<ServerState>,
    Json(payload): Json<MappingSet>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .set_category_mapping(&CategoryMapping {
            source_category: payload.source_category,
            target_category: payload.target_category,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_mapping(
    State(state): State<ServerState>,
    Path(source): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_category_mapping(&source).await?;
    Ok(StatusCode::NO_CONTENT)
}
