//! Mock sequence store for testing.
//!
//! In-memory implementation of the store contract with the same
//! atomicity guarantees: concurrent reserves never share a number, and
//! released numbers become eligible for reuse. Failure knobs let tests
//! drive each operation into its error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::reservation::{Reservation, ReservationState};

use super::{Result, SequenceStore, StoreError};

struct Inner {
    next_number: u64,
    /// Released numbers, reused lowest-first before the counter advances.
    freed: Vec<u64>,
    reservations: HashMap<String, Reservation>,
}

/// Mock sequence store for testing.
pub struct MockStore {
    inner: RwLock<Inner>,
    last_issued: RwLock<Option<Reservation>>,
    fail_reserve: RwLock<bool>,
    fail_confirm: RwLock<bool>,
    fail_release: RwLock<bool>,
    reserve_calls: AtomicU32,
    confirm_calls: AtomicU32,
    release_calls: AtomicU32,
}

impl MockStore {
    /// Create a store whose first assigned number is `first_number`.
    pub fn new(first_number: u64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_number: first_number,
                freed: Vec::new(),
                reservations: HashMap::new(),
            }),
            last_issued: RwLock::new(None),
            fail_reserve: RwLock::new(false),
            fail_confirm: RwLock::new(false),
            fail_release: RwLock::new(false),
            reserve_calls: AtomicU32::new(0),
            confirm_calls: AtomicU32::new(0),
            release_calls: AtomicU32::new(0),
        }
    }

    pub async fn set_fail_reserve(&self, fail: bool) {
        *self.fail_reserve.write().await = fail;
    }

    pub async fn set_fail_confirm(&self, fail: bool) {
        *self.fail_confirm.write().await = fail;
    }

    pub async fn set_fail_release(&self, fail: bool) {
        *self.fail_release.write().await = fail;
    }

    pub fn reserve_calls(&self) -> u32 {
        self.reserve_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> u32 {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> u32 {
        self.release_calls.load(Ordering::SeqCst)
    }

    /// Current state of a reservation, if it exists.
    pub async fn reservation(&self, reservation_id: &str) -> Option<Reservation> {
        self.inner
            .read()
            .await
            .reservations
            .get(reservation_id)
            .cloned()
    }

    /// The most recently issued reservation.
    pub async fn last_issued(&self) -> Option<Reservation> {
        self.last_issued.read().await.clone()
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl SequenceStore for MockStore {
    async fn reserve(&self, reserved_by: Option<&str>, metadata: Value) -> Result<Reservation> {
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_reserve.read().await {
            return Err(StoreError::Server {
                status: 500,
                body: "mock reserve failure".to_string(),
            });
        }

        let mut inner = self.inner.write().await;
        let sequence_number = if inner.freed.is_empty() {
            let n = inner.next_number;
            inner.next_number += 1;
            n
        } else {
            inner.freed.sort_unstable();
            inner.freed.remove(0)
        };

        let reservation = Reservation {
            reservation_id: Uuid::new_v4().to_string(),
            sequence_number,
            state: ReservationState::Reserved,
            reserved_by: reserved_by.map(str::to_string),
            metadata,
        };
        inner
            .reservations
            .insert(reservation.reservation_id.clone(), reservation.clone());
        drop(inner);
        *self.last_issued.write().await = Some(reservation.clone());
        Ok(reservation)
    }

    async fn confirm(&self, reservation_id: &str) -> Result<Reservation> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_confirm.read().await {
            return Err(StoreError::Server {
                status: 500,
                body: "mock confirm failure".to_string(),
            });
        }

        let mut inner = self.inner.write().await;
        let reservation = inner
            .reservations
            .get_mut(reservation_id)
            .ok_or_else(|| StoreError::Protocol(format!("unknown reservation {reservation_id}")))?;

        if reservation.state != ReservationState::Reserved {
            return Err(StoreError::InvalidState(format!(
                "reservation {reservation_id} is {:?}",
                reservation.state
            )));
        }

        reservation.state = ReservationState::Confirmed;
        Ok(reservation.clone())
    }

    async fn release(&self, reservation_id: &str) -> Result<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_release.read().await {
            return Err(StoreError::Server {
                status: 500,
                body: "mock release failure".to_string(),
            });
        }

        let mut inner = self.inner.write().await;
        let Some(reservation) = inner.reservations.get_mut(reservation_id) else {
            // Unknown id: nothing to clean up.
            return Ok(());
        };

        if reservation.state == ReservationState::Reserved {
            reservation.state = ReservationState::Released;
            let number = reservation.sequence_number;
            inner.freed.push(number);
        }
        // Terminal reservations are left untouched; release is idempotent.
        Ok(())
    }
}
