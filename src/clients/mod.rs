//! Typed clients for the sequence store.
//!
//! The store exposes exactly three atomic operations; everything in this
//! crate coordinates around them. `http` wraps a remote store over
//! HTTP/JSON, `mock` is an in-memory store for tests and local runs.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;

use crate::reservation::Reservation;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by sequence store clients.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network unreachable, timeout, or connection failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success response from the store.
    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },

    /// Response could not be normalized into a reservation.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The store rejected a confirm or release as out of order.
    #[error("invalid reservation state: {0}")]
    InvalidState(String),
}

impl StoreError {
    /// Returns true if the store reported an out-of-order transition.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, StoreError::InvalidState(_))
    }
}

/// The sequence store contract.
///
/// `reserve` atomically assigns the next free number; two concurrent
/// calls never receive the same one. `confirm` and `release` settle a
/// reservation exactly once; repeating either on an already-terminal
/// reservation may be rejected but must not corrupt stored state.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Claim the next free sequence number.
    async fn reserve(&self, reserved_by: Option<&str>, metadata: Value) -> Result<Reservation>;

    /// Irrevocably consume a reserved number.
    ///
    /// Fails with [`StoreError::InvalidState`] if the reservation was not
    /// in `RESERVED` state.
    async fn confirm(&self, reservation_id: &str) -> Result<Reservation>;

    /// Abandon a reservation, freeing its number for reuse.
    ///
    /// Release is a best-effort cleanup call: releasing an already
    /// terminal reservation is observed as a no-op success.
    async fn release(&self, reservation_id: &str) -> Result<()>;
}
