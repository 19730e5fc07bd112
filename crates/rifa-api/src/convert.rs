//! Row → response conversions. SQLite hands back TEXT ids and timestamps;
//! corrupt values are logged and defaulted rather than failing the request.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use rifa_db::models::{PurchaseRow, RaffleRow};
use rifa_db::tickets::parse_assigned;
use rifa_types::api::{PurchaseResponse, RaffleResponse};
use rifa_types::models::PurchaseStatus;

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", field, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite column defaults are "YYYY-MM-DD HH:MM:SS" without
            // timezone; parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}': {}", field, raw, e);
            DateTime::default()
        })
}

pub(crate) fn parse_date(field: &str, raw: &str) -> NaiveDate {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", field, raw, e);
        NaiveDate::default()
    })
}

pub(crate) fn raffle_response(row: RaffleRow) -> RaffleResponse {
    RaffleResponse {
        id: parse_uuid("raffle id", &row.id),
        title: row.title,
        description: row.description,
        price: row.price,
        total_tickets: row.total_tickets,
        available_tickets: row.available_tickets,
        image_url: row.image_url,
        is_active: row.is_active,
        end_date: parse_date("end_date", &row.end_date),
        created_at: parse_timestamp("created_at", &row.created_at),
    }
}

pub(crate) fn purchase_response(row: PurchaseRow) -> PurchaseResponse {
    let status = PurchaseStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Corrupt status '{}' on purchase '{}'", row.status, row.id);
        PurchaseStatus::Pending
    });

    let assigned_tickets = match row.assigned_tickets.as_deref() {
        None => None,
        Some(raw) => match parse_assigned(Some(raw)) {
            Ok(numbers) => Some(numbers),
            Err(e) => {
                warn!("Corrupt assigned_tickets on purchase '{}': {}", row.id, e);
                None
            }
        },
    };

    PurchaseResponse {
        id: parse_uuid("purchase id", &row.id),
        raffle_id: parse_uuid("raffle_id", &row.raffle_id),
        raffle_title: row.raffle_title,
        quantity: row.quantity,
        total_amount: row.total_amount,
        buyer_name: row.buyer_name,
        buyer_lastname: row.buyer_lastname,
        buyer_cedula: row.buyer_cedula,
        buyer_phone: row.buyer_phone,
        bank_name: row.bank_name,
        reference_number: row.reference_number,
        status,
        assigned_tickets,
        created_at: parse_timestamp("created_at", &row.created_at),
        approved_at: row
            .approved_at
            .as_deref()
            .map(|t| parse_timestamp("approved_at", t)),
    }
}
