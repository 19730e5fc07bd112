/// Database row types — these map directly to SQLite rows.
/// Distinct from the rifa-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub created_at: String,
}

pub struct RaffleRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub total_tickets: u32,
    pub available_tickets: u32,
    pub image_url: String,
    pub is_active: bool,
    pub end_date: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct PurchaseRow {
    pub id: String,
    pub raffle_id: String,
    /// Joined in on every read so listings carry the raffle name.
    pub raffle_title: String,
    pub quantity: u32,
    pub total_amount: f64,
    pub buyer_name: String,
    pub buyer_lastname: String,
    pub buyer_cedula: String,
    pub buyer_phone: String,
    pub bank_name: String,
    pub reference_number: String,
    pub status: String,
    /// JSON array of drawn numbers; NULL until the purchase is approved.
    pub assigned_tickets: Option<String>,
    pub created_at: String,
    pub approved_at: Option<String>,
    pub approved_by: Option<String>,
}

/// Submission payload for a new pending purchase. The total amount is
/// computed from the raffle price at insert time, not supplied by the caller.
pub struct NewPurchase {
    pub raffle_id: String,
    pub quantity: u32,
    pub buyer_name: String,
    pub buyer_lastname: String,
    pub buyer_cedula: String,
    pub buyer_phone: String,
    pub bank_name: String,
    pub reference_number: String,
}
