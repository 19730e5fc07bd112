use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use rifa_db::StoreError;
use rifa_db::models::RaffleRow;
use rifa_types::api::{
    AdminPurchasesResponse, ApprovePurchaseResponse, Claims, DashboardResponse, RaffleForm,
    RaffleResponse,
};
use rifa_types::models::PurchaseStatus;

use crate::auth::AppState;
use crate::convert::{purchase_response, raffle_response};
use crate::error::ApiError;

// -- Dashboard --

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (total_raffles, total_users, total_purchases, pending_purchases, recent) =
        tokio::task::spawn_blocking(move || {
            Ok::<_, StoreError>((
                db.db.count_raffles()?,
                db.db.count_users()?,
                db.db.count_purchases()?,
                db.db.count_pending_purchases()?,
                db.db.recent_purchases(10)?,
            ))
        })
        .await??;

    Ok(Json(DashboardResponse {
        total_raffles,
        total_users,
        total_purchases,
        pending_purchases,
        recent_purchases: recent.into_iter().map(purchase_response).collect(),
    }))
}

// -- Purchase review --

pub async fn list_purchases(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (pending, approved) = tokio::task::spawn_blocking(move || {
        Ok::<_, StoreError>((db.db.list_pending_purchases()?, db.db.list_approved_purchases()?))
    })
    .await??;

    Ok(Json(AdminPurchasesResponse {
        pending: pending.into_iter().map(purchase_response).collect(),
        approved: approved.into_iter().map(purchase_response).collect(),
    }))
}

/// Approve a pending purchase: the allocator draws the ticket numbers and
/// commits the state change atomically. An explicit POST command — the
/// original served this from a bare link, which crawlers could trip.
pub async fn approve_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let id = purchase_id.to_string();
    let admin_id = claims.sub.to_string();
    let numbers = tokio::task::spawn_blocking(move || db.db.approve_purchase(&id, &admin_id))
        .await??;

    info!(
        "Admin {} approved purchase {}, tickets {:?}",
        claims.username, purchase_id, numbers
    );

    Ok(Json(ApprovePurchaseResponse {
        id: purchase_id,
        status: PurchaseStatus::Approved,
        assigned_tickets: numbers,
    }))
}

pub async fn reject_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let id = purchase_id.to_string();
    let admin_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || db.db.reject_purchase(&id, &admin_id)).await??;

    info!("Admin {} rejected purchase {}", claims.username, purchase_id);

    Ok(Json(serde_json::json!({
        "id": purchase_id,
        "status": PurchaseStatus::Rejected,
    })))
}

// -- Raffle management --

pub async fn list_raffles(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_raffles()).await??;

    let raffles: Vec<RaffleResponse> = rows.into_iter().map(raffle_response).collect();
    Ok(Json(raffles))
}

pub async fn create_raffle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<RaffleForm>,
) -> Result<impl IntoResponse, ApiError> {
    validate_form(&form)?;

    let raffle_id = Uuid::new_v4();
    let row = RaffleRow {
        id: raffle_id.to_string(),
        title: form.title,
        description: form.description,
        price: form.price,
        total_tickets: form.total_tickets,
        available_tickets: form.total_tickets,
        image_url: form.image_url,
        is_active: form.is_active,
        end_date: form.end_date.to_string(),
        created_at: Utc::now().to_rfc3339(),
    };

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        db.db.insert_raffle(&row)?;
        Ok::<_, StoreError>(row)
    })
    .await??;

    info!("Admin {} created raffle {}", claims.username, raffle_id);

    Ok((StatusCode::CREATED, Json(raffle_response(row))))
}

pub async fn update_raffle(
    State(state): State<AppState>,
    Path(raffle_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(form): Json<RaffleForm>,
) -> Result<impl IntoResponse, ApiError> {
    validate_form(&form)?;

    let db = state.clone();
    let id = raffle_id.to_string();
    let row = tokio::task::spawn_blocking(move || {
        db.db.update_raffle(
            &id,
            &form.title,
            &form.description,
            form.price,
            form.total_tickets,
            &form.image_url,
            form.is_active,
            &form.end_date.to_string(),
        )?;
        db.db.get_raffle(&id)?.ok_or(StoreError::NotFound)
    })
    .await??;

    info!("Admin {} updated raffle {}", claims.username, raffle_id);

    Ok(Json(raffle_response(row)))
}

fn validate_form(form: &RaffleForm) -> Result<(), ApiError> {
    if form.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }
    if form.total_tickets == 0 {
        return Err(ApiError::Validation(
            "total_tickets must be at least 1".into(),
        ));
    }
    if !form.price.is_finite() || form.price < 0.0 {
        return Err(ApiError::Validation("price must be non-negative".into()));
    }
    Ok(())
}
