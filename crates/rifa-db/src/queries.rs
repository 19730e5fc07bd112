use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use rifa_types::models::PurchaseStatus;

use crate::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{NewPurchase, PurchaseRow, RaffleRow, UserRow};

const RAFFLE_SELECT: &str = "
    SELECT id, title, description, price, total_tickets, available_tickets,
           image_url, is_active, end_date, created_at
    FROM raffles";

/// Purchase columns with the raffle title joined in. Every purchase read
/// goes through this list so row mapping stays in one place.
const PURCHASE_SELECT: &str = "
    SELECT p.id, p.raffle_id, COALESCE(r.title, 'unknown'), p.quantity,
           p.total_amount, p.buyer_name, p.buyer_lastname, p.buyer_cedula,
           p.buyer_phone, p.bank_name, p.reference_number, p.status,
           p.assigned_tickets, p.created_at, p.approved_at, p.approved_by
    FROM purchases p
    LEFT JOIN raffles r ON p.raffle_id = r.id";

impl Database {
    // -- Users --

    /// Idempotent admin bootstrap. The username UNIQUE constraint is the
    /// guard: a concurrent insert loses the race and the call still
    /// succeeds. Returns true if the row was created by this call.
    pub fn ensure_admin_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (id, username, email, password, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                rusqlite::params![id, username, email, password_hash, Utc::now().to_rfc3339()],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn count_users(&self) -> StoreResult<u64> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM users"))
    }

    // -- Raffles --

    pub fn insert_raffle(&self, raffle: &RaffleRow) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO raffles (id, title, description, price, total_tickets,
                                      available_tickets, image_url, is_active, end_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    raffle.id,
                    raffle.title,
                    raffle.description,
                    raffle.price,
                    raffle.total_tickets,
                    raffle.available_tickets,
                    raffle.image_url,
                    raffle.is_active,
                    raffle.end_date,
                    raffle.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_raffle(&self, id: &str) -> StoreResult<Option<RaffleRow>> {
        self.with_conn(|conn| query_raffle(conn, id))
    }

    pub fn list_active_raffles(&self) -> StoreResult<Vec<RaffleRow>> {
        self.with_conn(|conn| {
            let sql = format!("{RAFFLE_SELECT} WHERE is_active = 1 ORDER BY created_at DESC");
            query_raffles(conn, &sql)
        })
    }

    pub fn list_raffles(&self) -> StoreResult<Vec<RaffleRow>> {
        self.with_conn(|conn| {
            let sql = format!("{RAFFLE_SELECT} ORDER BY created_at DESC");
            query_raffles(conn, &sql)
        })
    }

    /// Admin edit. `available_tickets` is never set directly: a change to
    /// the total recomputes it so that total − available keeps matching the
    /// count of assigned numbers. Shrinking the total below that count is
    /// refused — it would orphan already-drawn tickets.
    #[allow(clippy::too_many_arguments)]
    pub fn update_raffle(
        &self,
        id: &str,
        title: &str,
        description: &str,
        price: f64,
        total_tickets: u32,
        image_url: &str,
        is_active: bool,
        end_date: &str,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let (old_total, old_available): (u32, u32) = tx
                .query_row(
                    "SELECT total_tickets, available_tickets FROM raffles WHERE id = ?1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
                .ok_or(StoreError::NotFound)?;

            let assigned = old_total - old_available;
            if total_tickets < assigned {
                return Err(StoreError::TotalBelowAssigned { assigned });
            }

            tx.execute(
                "UPDATE raffles
                 SET title = ?2, description = ?3, price = ?4, total_tickets = ?5,
                     available_tickets = ?6, image_url = ?7, is_active = ?8, end_date = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    title,
                    description,
                    price,
                    total_tickets,
                    total_tickets - assigned,
                    image_url,
                    is_active,
                    end_date,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn count_raffles(&self) -> StoreResult<u64> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM raffles"))
    }

    // -- Purchases --

    /// Record a purchase request as pending. The availability check here is
    /// soft: it reserves nothing, and concurrent submissions may both pass.
    /// Capacity is truly enforced at approval time against the real pool.
    pub fn submit_purchase(&self, id: &str, new: &NewPurchase) -> StoreResult<PurchaseRow> {
        self.with_conn_mut(|conn| {
            let raffle = query_raffle(conn, &new.raffle_id)?.ok_or(StoreError::NotFound)?;
            if !raffle.is_active {
                return Err(StoreError::RaffleInactive);
            }
            if new.quantity > raffle.available_tickets {
                return Err(StoreError::InsufficientAvailability);
            }

            let total_amount = f64::from(new.quantity) * raffle.price;
            let created_at = Utc::now().to_rfc3339();

            conn.execute(
                "INSERT INTO purchases (id, raffle_id, quantity, total_amount,
                                        buyer_name, buyer_lastname, buyer_cedula, buyer_phone,
                                        bank_name, reference_number, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    id,
                    new.raffle_id,
                    new.quantity,
                    total_amount,
                    new.buyer_name,
                    new.buyer_lastname,
                    new.buyer_cedula,
                    new.buyer_phone,
                    new.bank_name,
                    new.reference_number,
                    PurchaseStatus::Pending.as_str(),
                    created_at,
                ],
            )?;

            info!("Purchase {} submitted for raffle {}", id, new.raffle_id);

            Ok(PurchaseRow {
                id: id.to_string(),
                raffle_id: new.raffle_id.clone(),
                raffle_title: raffle.title,
                quantity: new.quantity,
                total_amount,
                buyer_name: new.buyer_name.clone(),
                buyer_lastname: new.buyer_lastname.clone(),
                buyer_cedula: new.buyer_cedula.clone(),
                buyer_phone: new.buyer_phone.clone(),
                bank_name: new.bank_name.clone(),
                reference_number: new.reference_number.clone(),
                status: PurchaseStatus::Pending.as_str().to_string(),
                assigned_tickets: None,
                created_at,
                approved_at: None,
                approved_by: None,
            })
        })
    }

    pub fn get_purchase(&self, id: &str) -> StoreResult<Option<PurchaseRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PURCHASE_SELECT} WHERE p.id = ?1");
            let row = conn
                .query_row(&sql, [id], map_purchase_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_pending_purchases(&self) -> StoreResult<Vec<PurchaseRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{PURCHASE_SELECT} WHERE p.status = 'pending' ORDER BY p.created_at DESC"
            );
            query_purchases(conn, &sql)
        })
    }

    pub fn list_approved_purchases(&self) -> StoreResult<Vec<PurchaseRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{PURCHASE_SELECT} WHERE p.status = 'approved' ORDER BY p.approved_at DESC"
            );
            query_purchases(conn, &sql)
        })
    }

    pub fn recent_purchases(&self, limit: u32) -> StoreResult<Vec<PurchaseRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PURCHASE_SELECT} ORDER BY p.created_at DESC LIMIT {limit}");
            query_purchases(conn, &sql)
        })
    }

    pub fn count_purchases(&self) -> StoreResult<u64> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM purchases"))
    }

    pub fn count_pending_purchases(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            count(conn, "SELECT COUNT(*) FROM purchases WHERE status = 'pending'")
        })
    }
}

fn count(conn: &Connection, sql: &str) -> StoreResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

fn query_user_by_username(conn: &Connection, username: &str) -> StoreResult<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, email, password, is_admin, created_at
         FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                is_admin: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_raffle(conn: &Connection, id: &str) -> StoreResult<Option<RaffleRow>> {
    let sql = format!("{RAFFLE_SELECT} WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt.query_row([id], map_raffle_row).optional()?;

    Ok(row)
}

fn query_raffles(conn: &Connection, sql: &str) -> StoreResult<Vec<RaffleRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map([], map_raffle_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_purchases(conn: &Connection, sql: &str) -> StoreResult<Vec<PurchaseRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map([], map_purchase_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_raffle_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RaffleRow> {
    Ok(RaffleRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        total_tickets: row.get(4)?,
        available_tickets: row.get(5)?,
        image_url: row.get(6)?,
        is_active: row.get(7)?,
        end_date: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_purchase_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PurchaseRow> {
    Ok(PurchaseRow {
        id: row.get(0)?,
        raffle_id: row.get(1)?,
        raffle_title: row.get(2)?,
        quantity: row.get(3)?,
        total_amount: row.get(4)?,
        buyer_name: row.get(5)?,
        buyer_lastname: row.get(6)?,
        buyer_cedula: row.get(7)?,
        buyer_phone: row.get(8)?,
        bank_name: row.get(9)?,
        reference_number: row.get(10)?,
        status: row.get(11)?,
        assigned_tickets: row.get(12)?,
        created_at: row.get(13)?,
        approved_at: row.get(14)?,
        approved_by: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    /// Approvals and rejections stamp approved_by, which references users.
    fn seed_admin(db: &Database) {
        db.ensure_admin_user("admin", "Admin", "admin@rifas.local", "hash")
            .unwrap();
    }

    fn raffle_row(total: u32, is_active: bool) -> RaffleRow {
        RaffleRow {
            id: Uuid::new_v4().to_string(),
            title: "Moto 2026".into(),
            description: "Una moto nueva".into(),
            price: 5.0,
            total_tickets: total,
            available_tickets: total,
            image_url: String::new(),
            is_active,
            end_date: "2026-12-31".into(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    fn new_purchase(raffle_id: &str, quantity: u32) -> NewPurchase {
        NewPurchase {
            raffle_id: raffle_id.to_string(),
            quantity,
            buyer_name: "Ana".into(),
            buyer_lastname: "Pérez".into(),
            buyer_cedula: "V-12345678".into(),
            buyer_phone: "0414-5551234".into(),
            bank_name: "Banco Nacional".into(),
            reference_number: "00012345".into(),
        }
    }

    #[test]
    fn test_admin_bootstrap_is_idempotent() {
        let db = test_db();

        let first = db
            .ensure_admin_user("u1", "Admin", "admin@rifas.local", "hash-a")
            .unwrap();
        let second = db
            .ensure_admin_user("u2", "Admin", "other@rifas.local", "hash-b")
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(db.count_users().unwrap(), 1);

        // The original row wins the race
        let user = db.get_user_by_username("Admin").unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.is_admin);
    }

    #[test]
    fn test_active_listing_excludes_inactive() {
        let db = test_db();
        let active = raffle_row(10, true);
        let inactive = raffle_row(10, false);
        db.insert_raffle(&active).unwrap();
        db.insert_raffle(&inactive).unwrap();

        let listed = db.list_active_raffles().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active.id);

        assert_eq!(db.list_raffles().unwrap().len(), 2);
    }

    #[test]
    fn test_submission_does_not_reserve() {
        let db = test_db();
        let raffle = raffle_row(10, true);
        db.insert_raffle(&raffle).unwrap();

        let purchase = db
            .submit_purchase(&Uuid::new_v4().to_string(), &new_purchase(&raffle.id, 3))
            .unwrap();

        assert_eq!(purchase.status, "pending");
        assert_eq!(purchase.total_amount, 15.0);
        assert!(purchase.assigned_tickets.is_none());

        // available untouched by submission
        let raffle = db.get_raffle(&raffle.id).unwrap().unwrap();
        assert_eq!(raffle.available_tickets, 10);
    }

    #[test]
    fn test_submission_rejects_inactive_and_oversize() {
        let db = test_db();
        let inactive = raffle_row(10, false);
        let small = raffle_row(2, true);
        db.insert_raffle(&inactive).unwrap();
        db.insert_raffle(&small).unwrap();

        let err = db
            .submit_purchase(&Uuid::new_v4().to_string(), &new_purchase(&inactive.id, 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::RaffleInactive));

        let err = db
            .submit_purchase(&Uuid::new_v4().to_string(), &new_purchase(&small.id, 3))
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientAvailability));

        let err = db
            .submit_purchase(&Uuid::new_v4().to_string(), &new_purchase("missing", 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        assert_eq!(db.count_purchases().unwrap(), 0);
    }

    #[test]
    fn test_edit_cannot_shrink_below_assigned() {
        let db = test_db();
        seed_admin(&db);
        let raffle = raffle_row(10, true);
        db.insert_raffle(&raffle).unwrap();

        let pid = Uuid::new_v4().to_string();
        db.submit_purchase(&pid, &new_purchase(&raffle.id, 4)).unwrap();
        db.approve_purchase(&pid, "admin").unwrap();

        let err = db
            .update_raffle(&raffle.id, "Moto", "desc", 5.0, 3, "", true, "2026-12-31")
            .unwrap_err();
        assert!(matches!(err, StoreError::TotalBelowAssigned { assigned: 4 }));

        // Growing the total recomputes availability around the 4 assigned
        db.update_raffle(&raffle.id, "Moto", "desc", 5.0, 20, "", true, "2026-12-31")
            .unwrap();
        let raffle = db.get_raffle(&raffle.id).unwrap().unwrap();
        assert_eq!(raffle.total_tickets, 20);
        assert_eq!(raffle.available_tickets, 16);
    }

    #[test]
    fn test_purchase_listings_split_by_status() {
        let db = test_db();
        seed_admin(&db);
        let raffle = raffle_row(10, true);
        db.insert_raffle(&raffle).unwrap();

        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();
        let c = Uuid::new_v4().to_string();
        db.submit_purchase(&a, &new_purchase(&raffle.id, 1)).unwrap();
        db.submit_purchase(&b, &new_purchase(&raffle.id, 2)).unwrap();
        db.submit_purchase(&c, &new_purchase(&raffle.id, 3)).unwrap();

        db.approve_purchase(&b, "admin").unwrap();
        db.reject_purchase(&c, "admin").unwrap();

        let pending = db.list_pending_purchases().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a);
        assert_eq!(pending[0].raffle_title, "Moto 2026");

        let approved = db.list_approved_purchases().unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, b);

        assert_eq!(db.count_purchases().unwrap(), 3);
        assert_eq!(db.count_pending_purchases().unwrap(), 1);
        assert_eq!(db.recent_purchases(2).unwrap().len(), 2);
    }
}
