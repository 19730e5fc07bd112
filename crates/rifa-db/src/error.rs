use thiserror::Error;

/// Errors surfaced by the store and the ticket allocator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("raffle is not active")]
    RaffleInactive,

    /// Submission-time soft check: the requested quantity exceeds the
    /// raffle's available count right now. Nothing is reserved.
    #[error("not enough tickets available")]
    InsufficientAvailability,

    /// Approval-time hard check against the real pool of unassigned numbers.
    #[error("not enough ticket numbers left to draw")]
    InsufficientTickets,

    #[error("purchase is not pending")]
    NotPending,

    #[error("total tickets cannot shrink below the {assigned} already-assigned numbers")]
    TotalBelowAssigned { assigned: u32 },

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
