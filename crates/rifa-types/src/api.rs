use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PurchaseStatus;

// -- JWT Claims --

/// JWT claims shared between token issuance (login) and the auth middleware.
/// Canonical definition lives here in rifa-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub admin: bool,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Raffles --

#[derive(Debug, Serialize)]
pub struct RaffleResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub total_tickets: u32,
    pub available_tickets: u32,
    pub image_url: String,
    pub is_active: bool,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Admin create/edit payload. `available_tickets` is never accepted here:
/// it is derived from approvals (and recomputed on a total change).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RaffleForm {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub total_tickets: u32,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub end_date: NaiveDate,
}

fn default_active() -> bool {
    true
}

// -- Purchases --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitPurchaseRequest {
    pub raffle_id: Uuid,
    pub quantity: u32,
    pub buyer_name: String,
    pub buyer_lastname: String,
    pub buyer_cedula: String,
    pub buyer_phone: String,
    pub bank_name: String,
    pub reference_number: String,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub raffle_title: String,
    pub quantity: u32,
    pub total_amount: f64,
    pub buyer_name: String,
    pub buyer_lastname: String,
    pub buyer_cedula: String,
    pub buyer_phone: String,
    pub bank_name: String,
    pub reference_number: String,
    pub status: PurchaseStatus,
    /// Present iff the purchase was approved; sorted ascending.
    pub assigned_tickets: Option<Vec<u32>>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ApprovePurchaseResponse {
    pub id: Uuid,
    pub status: PurchaseStatus,
    pub assigned_tickets: Vec<u32>,
}

// -- Admin dashboard --

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_raffles: u64,
    pub total_users: u64,
    pub total_purchases: u64,
    pub pending_purchases: u64,
    pub recent_purchases: Vec<PurchaseResponse>,
}

#[derive(Debug, Serialize)]
pub struct AdminPurchasesResponse {
    pub pending: Vec<PurchaseResponse>,
    pub approved: Vec<PurchaseResponse>,
}
