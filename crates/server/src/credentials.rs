//! Stored credential endpoints. Secrets go in, never come back out.

use api_types::credential::{CredentialNew, CredentialView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::{Vendor, VendorCredential};

fn view(credential: VendorCredential) -> CredentialView {
    CredentialView {
        id: credential.id,
        vendor: credential.vendor.as_str().to_string(),
        nickname: credential.nickname,
        username: credential.username,
        card6_digits: credential.card6_digits,
        bank_account_number: credential.bank_account_number,
        last_synced_at: credential.last_synced_at,
    }
}

pub async fn list(
    State(state): State<ServerState>,
) -> Result<Json<Vec<CredentialView>>, ServerError> {
    let credentials = state.engine.list_credentials().await?;
    Ok(Json(credentials.into_iter().map(view).collect()))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CredentialNew>,
) -> Result<(StatusCode, Json<CredentialView>), ServerError> {
    let vendor = Vendor::try_from(payload.vendor.as_str())
        .map_err(|_| ServerError::Generic(format!("unknown vendor: {}", payload.vendor)))?;

    let mut credential = VendorCredential::new(vendor, payload.nickname);
    credential.username = payload.username;
    credential.set_password(&payload.password);
    credential.id_number = payload.id_number;
    credential.user_code = payload.user_code;
    credential.card6_digits = payload.card6_digits;
    credential.bank_account_number = payload.bank_account_number;

    state.engine.create_credential(&credential).await?;
    Ok((StatusCode::CREATED, Json(view(credential))))
}

pub async fn remove(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_credential(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
