//! Domain records shared across the ledger, the mirror, and the API surface.

use async_graphql::{Enum, InputObject, SimpleObject};
use serde::{Deserialize, Serialize};

/// Payment method value meaning "voucher"; deducted in statement totals.
pub const VOUCHER_PAYMENT: &str = "Gutschein";

/// Lifecycle state of a transfer. Transitions are monotonic, see
/// `ledger::transfers` for the guard table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Pending,
    Confirmed,
    Complete,
    Canceled,
    Terminated,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Pending => "pending",
            TransferState::Confirmed => "confirmed",
            TransferState::Complete => "complete",
            TransferState::Canceled => "canceled",
            TransferState::Terminated => "terminated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferState::Pending),
            "confirmed" => Some(TransferState::Confirmed),
            "complete" => Some(TransferState::Complete),
            "canceled" => Some(TransferState::Canceled),
            "terminated" => Some(TransferState::Terminated),
            _ => None,
        }
    }
}

/// A ride-transfer booking. One row in the master ledger sheet; mirrored
/// opportunistically into the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub transfer_id: String,
    pub customer_id: String,
    /// Snapshot of the identity-provider display name at creation; may go stale.
    pub customer_name: Option<String>,
    pub ride_date_iso: String,
    pub ride_time: String,
    pub pickup: String,
    pub dropoff: String,
    pub room_or_name: Option<String>,
    pub vehicle: Option<String>,
    pub amount_eur: Option<f64>,
    pub payment: Option<String>,
    pub driver_id: Option<String>,
    /// Snapshot at assignment, like `customer_name`.
    pub driver_name: Option<String>,
    pub state: TransferState,
    pub requested_at_iso: String,
}

impl Transfer {
    pub fn is_voucher(&self) -> bool {
        self.payment.as_deref() == Some(VOUCHER_PAYMENT)
    }

    /// `YYYY-MM` of the ride date, the statement-sheet key. The date cell is
    /// hand-editable, so slicing must tolerate arbitrary content.
    pub fn ride_month(&self) -> &str {
        self.ride_date_iso
            .get(..7)
            .unwrap_or(&self.ride_date_iso)
    }
}

/// Arguments for `createTransfer`.
#[derive(Debug, Clone, InputObject)]
pub struct CreateTransferInput {
    pub customer_id: String,
    pub ride_date_iso: String,
    pub ride_time: String,
    pub pickup: String,
    pub dropoff: String,
    pub room_or_name: Option<String>,
    pub vehicle: Option<String>,
    pub amount_eur: Option<f64>,
    pub payment: Option<String>,
}

/// Mirror read-path filter; all fields conjunctive.
#[derive(Debug, Clone, Default, InputObject)]
pub struct TransferFilter {
    pub state: Option<TransferState>,
    pub customer_id: Option<String>,
    pub driver_id: Option<String>,
    /// Inclusive lower bound on `ride_date_iso`.
    pub date_from: Option<String>,
    /// Inclusive upper bound on `ride_date_iso`.
    pub date_to: Option<String>,
}

// ===== Identity-provider read shapes (fetched, never persisted here) =====

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    pub id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRole {
    pub key: String,
    pub display_name: Option<String>,
}

/// A grant flattened to one user and the role keys it holds in a project.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct UserGrant {
    pub user_id: String,
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_str() {
        for state in [
            TransferState::Pending,
            TransferState::Confirmed,
            TransferState::Complete,
            TransferState::Canceled,
            TransferState::Terminated,
        ] {
            assert_eq!(TransferState::parse(state.as_str()), Some(state));
        }
        assert_eq!(TransferState::parse("archived"), None);
    }

    #[test]
    fn ride_month_truncates_date() {
        assert_eq!(sample().ride_month(), "2025-03");
    }

    #[test]
    fn ride_month_tolerates_hand_edited_cells() {
        let mut t = sample();
        t.ride_date_iso = "2025".into();
        assert_eq!(t.ride_month(), "2025");
        // Multibyte character spanning the truncation boundary.
        t.ride_date_iso = "2025-0ä".into();
        assert_eq!(t.ride_month(), "2025-0ä");
    }

    #[test]
    fn voucher_detection() {
        let mut t = sample();
        assert!(!t.is_voucher());
        t.payment = Some(VOUCHER_PAYMENT.to_string());
        assert!(t.is_voucher());
    }

    fn sample() -> Transfer {
        Transfer {
            transfer_id: "t1".into(),
            customer_id: "u1".into(),
            customer_name: None,
            ride_date_iso: "2025-03-10".into(),
            ride_time: "14:30".into(),
            pickup: "Hotel X".into(),
            dropoff: "Airport".into(),
            room_or_name: None,
            vehicle: None,
            amount_eur: Some(42.0),
            payment: None,
            driver_id: None,
            driver_name: None,
            state: TransferState::Pending,
            requested_at_iso: "2025-03-01T08:00:00Z".into(),
        }
    }
}
