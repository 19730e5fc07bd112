//! Ticket allocation. Approval is the only path that binds concrete ticket
//! numbers to a purchase, and the only place the per-raffle invariant is at
//! stake: across a raffle's approved purchases no number appears twice, and
//! the count of bound numbers equals total − available.

use std::collections::HashSet;

use chrono::Utc;
use rand::seq::IndexedRandom;
use rusqlite::OptionalExtension;
use tracing::info;

use rifa_types::models::PurchaseStatus;

use crate::Database;
use crate::error::{StoreError, StoreResult};

/// Decode the JSON array stored in `assigned_tickets`. NULL means none.
pub fn parse_assigned(raw: Option<&str>) -> StoreResult<Vec<u32>> {
    match raw {
        Some(s) => Ok(serde_json::from_str(s)?),
        None => Ok(Vec::new()),
    }
}

/// Numbers in [1, total] not yet bound to an approved purchase.
fn free_numbers(total: u32, taken: &HashSet<u32>) -> Vec<u32> {
    (1..=total).filter(|n| !taken.contains(n)).collect()
}

/// Uniform draw without replacement. The result is sorted ascending purely
/// as a display/storage convention; any permutation of the set is
/// equivalent.
fn draw(pool: &[u32], quantity: usize) -> Vec<u32> {
    let mut rng = rand::rng();
    let mut drawn: Vec<u32> = pool.choose_multiple(&mut rng, quantity).copied().collect();
    drawn.sort_unstable();
    drawn
}

impl Database {
    /// Approve a pending purchase: draw `quantity` unused numbers for its
    /// raffle and commit the status change, the drawn set, the approval
    /// stamps, and the availability decrement as one transaction. A failure
    /// at any step leaves the purchase pending and the raffle untouched.
    ///
    /// Serialization of concurrent approvals comes from the writer mutex in
    /// `with_conn_mut`; the transaction makes the multi-table write
    /// all-or-nothing.
    pub fn approve_purchase(&self, purchase_id: &str, admin_id: &str) -> StoreResult<Vec<u32>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let (raffle_id, quantity, status): (String, u32, String) = tx
                .query_row(
                    "SELECT raffle_id, quantity, status FROM purchases WHERE id = ?1",
                    [purchase_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?
                .ok_or(StoreError::NotFound)?;

            if PurchaseStatus::parse(&status) != Some(PurchaseStatus::Pending) {
                return Err(StoreError::NotPending);
            }

            let total_tickets: u32 = tx
                .query_row(
                    "SELECT total_tickets FROM raffles WHERE id = ?1",
                    [&raffle_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound)?;

            // Union of numbers already bound to this raffle's approved
            // purchases. The purchase being approved is still pending, so
            // it cannot contribute to the set.
            let mut taken: HashSet<u32> = HashSet::new();
            {
                let mut stmt = tx.prepare(
                    "SELECT assigned_tickets FROM purchases
                     WHERE raffle_id = ?1 AND status = 'approved'",
                )?;
                let rows = stmt.query_map([&raffle_id], |row| row.get::<_, Option<String>>(0))?;
                for raw in rows {
                    taken.extend(parse_assigned(raw?.as_deref())?);
                }
            }

            let pool = free_numbers(total_tickets, &taken);
            if pool.len() < quantity as usize {
                return Err(StoreError::InsufficientTickets);
            }

            let numbers = draw(&pool, quantity as usize);

            tx.execute(
                "UPDATE purchases
                 SET status = ?2, assigned_tickets = ?3, approved_at = ?4, approved_by = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    purchase_id,
                    PurchaseStatus::Approved.as_str(),
                    serde_json::to_string(&numbers)?,
                    Utc::now().to_rfc3339(),
                    admin_id,
                ],
            )?;
            tx.execute(
                "UPDATE raffles SET available_tickets = available_tickets - ?2 WHERE id = ?1",
                rusqlite::params![raffle_id, quantity],
            )?;

            tx.commit()?;

            info!(
                "Purchase {} approved, drew {} tickets for raffle {}",
                purchase_id, quantity, raffle_id
            );
            Ok(numbers)
        })
    }

    /// Reject a pending purchase. Only the status and the approval stamps
    /// change; no tickets were ever reserved for a pending purchase.
    pub fn reject_purchase(&self, purchase_id: &str, admin_id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let status: String = conn
                .query_row(
                    "SELECT status FROM purchases WHERE id = ?1",
                    [purchase_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound)?;

            if PurchaseStatus::parse(&status) != Some(PurchaseStatus::Pending) {
                return Err(StoreError::NotPending);
            }

            conn.execute(
                "UPDATE purchases SET status = ?2, approved_at = ?3, approved_by = ?4
                 WHERE id = ?1",
                rusqlite::params![
                    purchase_id,
                    PurchaseStatus::Rejected.as_str(),
                    Utc::now().to_rfc3339(),
                    admin_id,
                ],
            )?;

            info!("Purchase {} rejected", purchase_id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPurchase, RaffleRow};
    use uuid::Uuid;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        // The approver referenced by approved_by
        db.ensure_admin_user("admin", "Admin", "admin@rifas.local", "hash")
            .unwrap();
        db
    }

    fn seed_raffle(db: &Database, total: u32) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_raffle(&RaffleRow {
            id: id.clone(),
            title: "Rifa de prueba".into(),
            description: "Premio".into(),
            price: 2.5,
            total_tickets: total,
            available_tickets: total,
            image_url: String::new(),
            is_active: true,
            end_date: "2026-12-31".into(),
            created_at: Utc::now().to_rfc3339(),
        })
        .unwrap();
        id
    }

    fn seed_pending(db: &Database, raffle_id: &str, quantity: u32) -> String {
        let id = Uuid::new_v4().to_string();
        db.submit_purchase(
            &id,
            &NewPurchase {
                raffle_id: raffle_id.to_string(),
                quantity,
                buyer_name: "Ana".into(),
                buyer_lastname: "Pérez".into(),
                buyer_cedula: "V-12345678".into(),
                buyer_phone: "0414-5551234".into(),
                bank_name: "Banco Nacional".into(),
                reference_number: "00012345".into(),
            },
        )
        .unwrap();
        id
    }

    /// Union of assigned numbers across the raffle's approved purchases.
    fn assigned_union(db: &Database, raffle_id: &str) -> Vec<u32> {
        let mut all = Vec::new();
        for p in db.list_approved_purchases().unwrap() {
            if p.raffle_id == raffle_id {
                all.extend(parse_assigned(p.assigned_tickets.as_deref()).unwrap());
            }
        }
        all
    }

    fn assert_invariant(db: &Database, raffle_id: &str) {
        let raffle = db.get_raffle(raffle_id).unwrap().unwrap();
        let union = assigned_union(db, raffle_id);
        let distinct: HashSet<u32> = union.iter().copied().collect();

        assert_eq!(union.len(), distinct.len(), "duplicate ticket numbers");
        assert_eq!(
            distinct.len() as u32,
            raffle.total_tickets - raffle.available_tickets,
            "assigned count must equal total - available"
        );
        assert!(distinct.iter().all(|&n| n >= 1 && n <= raffle.total_tickets));
    }

    #[test]
    fn test_draw_is_distinct_in_range_and_sorted() {
        let pool: Vec<u32> = (1..=50).collect();
        let drawn = draw(&pool, 20);

        assert_eq!(drawn.len(), 20);
        let distinct: HashSet<u32> = drawn.iter().copied().collect();
        assert_eq!(distinct.len(), 20);
        assert!(drawn.windows(2).all(|w| w[0] < w[1]));
        assert!(drawn.iter().all(|n| pool.contains(n)));
    }

    #[test]
    fn test_free_numbers_excludes_taken() {
        let taken: HashSet<u32> = [1, 3, 5].into_iter().collect();
        assert_eq!(free_numbers(6, &taken), vec![2, 4, 6]);
        assert_eq!(free_numbers(0, &HashSet::new()), Vec::<u32>::new());
    }

    #[test]
    fn test_approval_assigns_exactly_quantity() {
        let db = test_db();
        let raffle_id = seed_raffle(&db, 10);
        let pid = seed_pending(&db, &raffle_id, 3);

        let numbers = db.approve_purchase(&pid, "admin").unwrap();
        assert_eq!(numbers.len(), 3);

        let purchase = db.get_purchase(&pid).unwrap().unwrap();
        assert_eq!(purchase.status, "approved");
        assert!(purchase.approved_at.is_some());
        assert_eq!(purchase.approved_by.as_deref(), Some("admin"));
        assert_eq!(
            parse_assigned(purchase.assigned_tickets.as_deref()).unwrap(),
            numbers
        );

        assert_invariant(&db, &raffle_id);
    }

    #[test]
    fn test_invariant_holds_across_many_approvals() {
        let db = test_db();
        let raffle_id = seed_raffle(&db, 30);

        for quantity in [5, 1, 7, 3, 8] {
            let pid = seed_pending(&db, &raffle_id, quantity);
            db.approve_purchase(&pid, "admin").unwrap();
            assert_invariant(&db, &raffle_id);
        }

        let raffle = db.get_raffle(&raffle_id).unwrap().unwrap();
        assert_eq!(raffle.available_tickets, 30 - 24);
    }

    #[test]
    fn test_exact_fit_exhausts_the_pool() {
        let db = test_db();
        let raffle_id = seed_raffle(&db, 5);
        let pid = seed_pending(&db, &raffle_id, 5);

        let numbers = db.approve_purchase(&pid, "admin").unwrap();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        let raffle = db.get_raffle(&raffle_id).unwrap().unwrap();
        assert_eq!(raffle.available_tickets, 0);
        assert_invariant(&db, &raffle_id);
    }

    #[test]
    fn test_insufficient_pool_is_a_no_op() {
        let db = test_db();
        let raffle_id = seed_raffle(&db, 5);

        // Both submissions pass the soft check, only one can be approved
        let first = seed_pending(&db, &raffle_id, 5);
        let second = seed_pending(&db, &raffle_id, 1);

        db.approve_purchase(&first, "admin").unwrap();

        let err = db.approve_purchase(&second, "admin").unwrap_err();
        assert!(matches!(err, StoreError::InsufficientTickets));

        let purchase = db.get_purchase(&second).unwrap().unwrap();
        assert_eq!(purchase.status, "pending");
        assert!(purchase.assigned_tickets.is_none());
        assert!(purchase.approved_at.is_none());

        let raffle = db.get_raffle(&raffle_id).unwrap().unwrap();
        assert_eq!(raffle.available_tickets, 0);
        assert_invariant(&db, &raffle_id);
    }

    #[test]
    fn test_rejection_changes_nothing_but_the_status() {
        let db = test_db();
        let raffle_id = seed_raffle(&db, 10);
        let approved = seed_pending(&db, &raffle_id, 4);
        let rejected = seed_pending(&db, &raffle_id, 2);

        let numbers = db.approve_purchase(&approved, "admin").unwrap();
        db.reject_purchase(&rejected, "admin").unwrap();

        let purchase = db.get_purchase(&rejected).unwrap().unwrap();
        assert_eq!(purchase.status, "rejected");
        assert!(purchase.assigned_tickets.is_none());
        assert!(purchase.approved_at.is_some());

        // The approved purchase's numbers are untouched
        let other = db.get_purchase(&approved).unwrap().unwrap();
        assert_eq!(
            parse_assigned(other.assigned_tickets.as_deref()).unwrap(),
            numbers
        );

        let raffle = db.get_raffle(&raffle_id).unwrap().unwrap();
        assert_eq!(raffle.available_tickets, 6);
        assert_invariant(&db, &raffle_id);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let db = test_db();
        let raffle_id = seed_raffle(&db, 10);

        let approved = seed_pending(&db, &raffle_id, 2);
        let numbers = db.approve_purchase(&approved, "admin").unwrap();

        // Re-approving must not re-draw
        let err = db.approve_purchase(&approved, "admin").unwrap_err();
        assert!(matches!(err, StoreError::NotPending));
        let purchase = db.get_purchase(&approved).unwrap().unwrap();
        assert_eq!(
            parse_assigned(purchase.assigned_tickets.as_deref()).unwrap(),
            numbers
        );

        let err = db.reject_purchase(&approved, "admin").unwrap_err();
        assert!(matches!(err, StoreError::NotPending));

        let rejected = seed_pending(&db, &raffle_id, 2);
        db.reject_purchase(&rejected, "admin").unwrap();
        assert!(matches!(
            db.approve_purchase(&rejected, "admin").unwrap_err(),
            StoreError::NotPending
        ));
        assert!(matches!(
            db.reject_purchase(&rejected, "admin").unwrap_err(),
            StoreError::NotPending
        ));

        let raffle = db.get_raffle(&raffle_id).unwrap().unwrap();
        assert_eq!(raffle.available_tickets, 8);
        assert_invariant(&db, &raffle_id);
    }

    #[test]
    fn test_unknown_purchase_is_not_found() {
        let db = test_db();
        assert!(matches!(
            db.approve_purchase("missing", "admin").unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            db.reject_purchase("missing", "admin").unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[test]
    fn test_scenario_soft_check_after_approval() {
        // total=10: A requests 3, submit leaves available at 10; approval
        // drops it to 7; B's request for 8 then fails the soft check.
        let db = test_db();
        let raffle_id = seed_raffle(&db, 10);

        let a = seed_pending(&db, &raffle_id, 3);
        let raffle = db.get_raffle(&raffle_id).unwrap().unwrap();
        assert_eq!(raffle.available_tickets, 10);

        let numbers = db.approve_purchase(&a, "admin").unwrap();
        assert_eq!(numbers.len(), 3);
        assert!(numbers.iter().all(|&n| (1..=10).contains(&n)));

        let raffle = db.get_raffle(&raffle_id).unwrap().unwrap();
        assert_eq!(raffle.available_tickets, 7);

        let err = db
            .submit_purchase(
                &Uuid::new_v4().to_string(),
                &NewPurchase {
                    raffle_id: raffle_id.clone(),
                    quantity: 8,
                    buyer_name: "Luis".into(),
                    buyer_lastname: "Gómez".into(),
                    buyer_cedula: "V-87654321".into(),
                    buyer_phone: "0424-5559876".into(),
                    bank_name: "Banco Nacional".into(),
                    reference_number: "00054321".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientAvailability));
    }
}
