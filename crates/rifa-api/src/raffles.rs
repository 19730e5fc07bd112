use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use rifa_types::api::RaffleResponse;

use crate::auth::AppState;
use crate::convert::raffle_response;
use crate::error::ApiError;

/// Public storefront listing: active raffles only.
pub async fn list_raffles(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_active_raffles()).await??;

    let raffles: Vec<RaffleResponse> = rows.into_iter().map(raffle_response).collect();
    Ok(Json(raffles))
}

pub async fn get_raffle(
    State(state): State<AppState>,
    Path(raffle_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let id = raffle_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_raffle(&id))
        .await??
        .ok_or(ApiError::NotFound)?;

    Ok(Json(raffle_response(row)))
}
