//! Reservation data model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a reservation as reported by the sequence store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    /// The number is claimed but not yet consumed.
    Reserved,
    /// The number is permanently consumed.
    Confirmed,
    /// The claim was abandoned; the number is eligible for reuse.
    Released,
}

impl ReservationState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReservationState::Confirmed | ReservationState::Released
        )
    }
}

/// A provisional, revocable claim on a sequence number.
///
/// Created by the store's `reserve` operation and mutated only by
/// `confirm` or `release`. While a reservation is `Reserved` or
/// `Confirmed` its number is visible to every other device as in use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Opaque identifier issued by the sequence store.
    pub reservation_id: String,
    /// The document number assigned to this reservation.
    pub sequence_number: u64,
    /// Current lifecycle state.
    pub state: ReservationState,
    /// Requesting device or actor. Diagnostics only, never used for locking.
    pub reserved_by: Option<String>,
    /// Opaque payload attached at reservation time, immutable after creation.
    pub metadata: Value,
}
