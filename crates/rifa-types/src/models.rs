use serde::{Deserialize, Serialize};

/// Lifecycle of a purchase request. Transitions are one-way:
/// pending → approved and pending → rejected; the terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Approved,
    Rejected,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Approved => "approved",
            PurchaseStatus::Rejected => "rejected",
        }
    }

    /// Parse the TEXT column value. Unknown values map to None so a corrupt
    /// row surfaces as an error at the call site instead of a panic.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PurchaseStatus::Pending),
            "approved" => Some(PurchaseStatus::Approved),
            "rejected" => Some(PurchaseStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PurchaseStatus::Pending)
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
