//! Card ownership endpoints.

use api_types::ownership::{OwnershipRelink, OwnershipView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::CardOwnership;

fn view(ownership: CardOwnership) -> OwnershipView {
    OwnershipView {
        id: ownership.id,
        vendor: ownership.vendor.as_str().to_string(),
        account_number: ownership.account_number,
        credential_id: ownership.credential_id,
        linked_bank_account_id: ownership.linked_bank_account_id,
        custom_bank_account_number: ownership.custom_bank_account_number,
        custom_bank_account_nickname: ownership.custom_bank_account_nickname,
        created_at: ownership.created_at,
    }
}

pub async fn list(
    State(state): State<ServerState>,
) -> Result<Json<Vec<OwnershipView>>, ServerError> {
    let ownerships = state.engine.list_ownerships().await?;
    Ok(Json(ownerships.into_iter().map(view).collect()))
}

pub async fn relink(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OwnershipRelink>,
) -> Result<Json<OwnershipView>, ServerError> {
    let updated = state
        .engine
        .relink_ownership(
            id,
            payload.linked_bank_account_id,
            payload.custom_bank_account_number,
            payload.custom_bank_account_nickname,
        )
        .await?;
    Ok(Json(view(updated)))
}

pub async fn remove(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_ownership(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
