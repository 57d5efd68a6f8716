//! Transactions API endpoints

use api_types::transaction::{
    CategoryRename, CategoryUpdate, RenameResponse, TransactionList, TransactionListResponse,
    TransactionView, WipeRequest, WipeResponse,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{ServerError, server::ServerState};
use engine::{Transaction, TransactionListFilter, Vendor};

fn parse_vendor(raw: &str) -> Result<Vendor, ServerError> {
    Vendor::try_from(raw).map_err(|_| ServerError::Generic(format!("unknown vendor: {raw}")))
}

fn view(tx: Transaction) -> TransactionView {
    TransactionView {
        identifier: tx.identifier,
        vendor: tx.vendor.as_str().to_string(),
        date: tx.date,
        processed_date: tx.processed_date,
        name: tx.name,
        price_minor: tx.price_minor,
        category: tx.category,
        category_source: tx.category_source.map(|s| s.as_str().to_string()),
        account_number: tx.account_number,
        status: tx.status,
        kind: tx.kind,
    }
}

pub async fn list(
    State(state): State<ServerState>,
    Query(payload): Query<TransactionList>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let vendor = payload.vendor.as_deref().map(parse_vendor).transpose()?;
    let filter = TransactionListFilter {
        vendor,
        category: payload.category,
        account_number: payload.account_number,
        from_date: payload.from,
        to_date: payload.to,
        uncategorized_only: payload.uncategorized_only.unwrap_or(false),
        limit: payload.limit,
    };

    let transactions = state.engine.list_transactions(filter).await?;
    Ok(Json(TransactionListResponse {
        transactions: transactions.into_iter().map(view).collect(),
    }))
}

pub async fn set_category(
    State(state): State<ServerState>,
    Path((vendor, identifier)): Path<(String, String)>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<StatusCode, ServerError> {
    let vendor = parse_vendor(&vendor)?;
    state
        .engine
        .set_transaction_category(&identifier, vendor, &payload.category)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(
    State(state): State<ServerState>,
    Path((vendor, identifier)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    let vendor = parse_vendor(&vendor)?;
    state.engine.delete_transaction(&identifier, vendor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn wipe(
    State(state): State<ServerState>,
    Json(payload): Json<WipeRequest>,
) -> Result<Json<WipeResponse>, ServerError> {
    let vendor = payload.vendor.as_deref().map(parse_vendor).transpose()?;
    let removed = state.engine.wipe_transactions(vendor).await?;
    Ok(Json(WipeResponse { removed }))
}

pub async fn rename_category(
    State(state): State<ServerState>,
    Json(payload): Json<CategoryRename>,
) -> Result<Json<RenameResponse>, ServerError> {
    let renamed = state
        .engine
        .rename_category(&payload.from, &payload.to)
        .await?;
    Ok(Json(RenameResponse { renamed }))
}
