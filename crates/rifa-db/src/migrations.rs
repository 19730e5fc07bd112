use rusqlite::Connection;
use tracing::info;

use crate::error::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            is_admin    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS raffles (
            id                  TEXT PRIMARY KEY,
            title               TEXT NOT NULL,
            description         TEXT NOT NULL,
            price               REAL NOT NULL,
            total_tickets       INTEGER NOT NULL,
            available_tickets   INTEGER NOT NULL,
            image_url           TEXT NOT NULL DEFAULT '',
            is_active           INTEGER NOT NULL DEFAULT 1,
            end_date            TEXT NOT NULL,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS purchases (
            id                  TEXT PRIMARY KEY,
            raffle_id           TEXT NOT NULL REFERENCES raffles(id),
            quantity            INTEGER NOT NULL,
            total_amount        REAL NOT NULL,
            buyer_name          TEXT NOT NULL,
            buyer_lastname      TEXT NOT NULL,
            buyer_cedula        TEXT NOT NULL,
            buyer_phone         TEXT NOT NULL,
            bank_name           TEXT NOT NULL,
            reference_number    TEXT NOT NULL,
            status              TEXT NOT NULL DEFAULT 'pending',
            -- JSON array of the drawn numbers, set on approval
            assigned_tickets    TEXT,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            approved_at         TEXT,
            approved_by         TEXT REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_purchases_raffle
            ON purchases(raffle_id, status);

        CREATE INDEX IF NOT EXISTS idx_purchases_created
            ON purchases(created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
