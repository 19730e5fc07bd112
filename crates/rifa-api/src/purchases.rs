use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use rifa_db::models::NewPurchase;
use rifa_types::api::SubmitPurchaseRequest;

use crate::auth::AppState;
use crate::convert::purchase_response;
use crate::error::ApiError;

/// Buyer-facing submission. Records the request as pending for manual
/// payment review; the availability check inside the store is advisory and
/// reserves nothing.
pub async fn submit_purchase(
    State(state): State<AppState>,
    Json(req): Json<SubmitPurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req)?;

    let purchase_id = Uuid::new_v4();
    let new = NewPurchase {
        raffle_id: req.raffle_id.to_string(),
        quantity: req.quantity,
        buyer_name: req.buyer_name,
        buyer_lastname: req.buyer_lastname,
        buyer_cedula: req.buyer_cedula,
        buyer_phone: req.buyer_phone,
        bank_name: req.bank_name,
        reference_number: req.reference_number,
    };

    let db = state.clone();
    let row =
        tokio::task::spawn_blocking(move || db.db.submit_purchase(&purchase_id.to_string(), &new))
            .await??;

    Ok((StatusCode::CREATED, Json(purchase_response(row))))
}

fn validate(req: &SubmitPurchaseRequest) -> Result<(), ApiError> {
    if req.quantity == 0 {
        return Err(ApiError::Validation("quantity must be at least 1".into()));
    }

    let required = [
        ("buyer_name", &req.buyer_name),
        ("buyer_lastname", &req.buyer_lastname),
        ("buyer_cedula", &req.buyer_cedula),
        ("buyer_phone", &req.buyer_phone),
        ("bank_name", &req.bank_name),
        ("reference_number", &req.reference_number),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!(
                "missing required field: {name}"
            )));
        }
    }

    Ok(())
}
