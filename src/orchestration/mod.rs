//! Reservation orchestration.
//!
//! Drives a single document's number through its lifecycle: decides when
//! to reserve, when to confirm, when to release, and how to react to
//! failures at each step. Confirmation is reserved exclusively for a
//! verified consuming action from the delivery sink; every other exit
//! from a held reservation routes through a best-effort release.


use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::cache::FallbackCache;
use crate::clients::{SequenceStore, StoreError};
use crate::config::FlowConfig;
use crate::reservation::Reservation;
use crate::sink::{DeliveryOutcome, DeliverySink};

/// Lifecycle states of one document-production flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No active reservation.
    Idle,
    /// A reserve call is in flight.
    Reserving,
    /// A `RESERVED` reservation is held.
    Holding,
    /// The delivery sink is running the consuming action.
    Delivering,
    /// A confirm call is in flight.
    Confirming,
    /// A release call is in flight.
    Releasing,
    /// The number was delivered and confirmed.
    Done,
    /// The flow failed; any held number was released or abandoned.
    Failed,
    /// The user cancelled before a consuming action.
    Aborted,
}

impl FlowState {
    /// Advance to `next`, panicking on a transition the protocol forbids.
    ///
    /// A forbidden pair can only arise from a bug in the flow driver, so
    /// it is a fatal programming error rather than a recoverable one.
    fn advance(self, next: FlowState) -> FlowState {
        use FlowState::*;
        match (self, next) {
            (Idle, Reserving)
            | (Idle, Holding)
            | (Reserving, Holding)
            | (Reserving, Failed)
            | (Reserving, Releasing)
            | (Holding, Delivering)
            | (Holding, Releasing)
            | (Delivering, Confirming)
            | (Delivering, Releasing)
            | (Confirming, Done)
            | (Confirming, Failed)
            | (Confirming, Releasing)
            | (Releasing, Failed)
            | (Releasing, Aborted) => {
                debug!(from = ?self, to = ?next, "flow transition");
                next
            }
            (from, to) => panic!("forbidden flow transition: {from:?} -> {to:?}"),
        }
    }
}

/// Cancellation intent for an in-flight flow.
///
/// Cloneable and sticky. The orchestrator re-checks it at every
/// suspension boundary, so intent signaled while a reserve call is in
/// flight still results in the landed reservation being released.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Irreversible for this flow.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Terminal outcome of a production flow, suitable for user notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The document was handed off and its number confirmed as consumed.
    Delivered { sequence_number: u64 },
    /// The user cancelled; no number was consumed.
    Cancelled,
}

/// Errors terminating a production flow.
///
/// Variants carrying `release_error` report a failed best-effort cleanup
/// as a secondary diagnostic on the same channel as the primary failure.
/// The reservation a release failed to free stays held, so a caller-level
/// retry reuses its number instead of leaking it.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A flow for this document is already in flight.
    #[error("document production already in flight")]
    InFlight,

    /// The reservation itself could not be obtained.
    #[error("reservation failed: {0}")]
    Reserve(#[source] StoreError),

    /// The delivery sink reported a hard failure.
    #[error("delivery failed: {reason}")]
    Delivery {
        reason: String,
        /// Failure of the best-effort release that followed, if any.
        release_error: Option<StoreError>,
    },

    /// Confirming the consumed number failed.
    #[error("confirm failed: {source}")]
    Confirm {
        #[source]
        source: StoreError,
        /// Failure of the best-effort release that followed, if any.
        release_error: Option<StoreError>,
    },
}

/// Per-document flow slot.
///
/// Holds the open reservation, if any, between attempts. Locking the
/// slot for the duration of a flow is what enforces "at most one open
/// reservation per document".
#[derive(Default)]
struct Slot {
    held: Option<Reservation>,
}

/// Coordinates document-number reservations for documents produced on
/// this device.
///
/// Each document runs its own single-threaded cooperative flow; multiple
/// documents proceed concurrently, coordinated only through the store's
/// atomic reserve.
pub struct Orchestrator {
    store: Arc<dyn SequenceStore>,
    sink: Arc<dyn DeliverySink>,
    cache: Arc<dyn FallbackCache>,
    config: FlowConfig,
    slots: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SequenceStore>,
        sink: Arc<dyn DeliverySink>,
        cache: Arc<dyn FallbackCache>,
        config: FlowConfig,
    ) -> Self {
        Self {
            store,
            sink,
            cache,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Advisory number for pre-populating a document before any
    /// reservation exists. Never authoritative.
    pub fn seed_number(&self) -> Option<u64> {
        self.cache.get()
    }

    /// Produce one document: reserve a number (or reuse a held one),
    /// deliver, then confirm or release.
    ///
    /// Returns [`FlowError::InFlight`] if a flow for the same document is
    /// already running. A request for a different document proceeds
    /// independently.
    pub async fn produce(
        &self,
        document_id: &str,
        metadata: Value,
        cancel: CancelToken,
    ) -> Result<FlowOutcome, FlowError> {
        let slot = self.slot(document_id).await;
        let mut guard = slot.try_lock().map_err(|_| FlowError::InFlight)?;
        self.run(document_id, metadata, cancel, &mut guard).await
    }

    async fn slot(&self, document_id: &str) -> Arc<Mutex<Slot>> {
        let mut slots = self.slots.lock().await;
        slots.entry(document_id.to_string()).or_default().clone()
    }

    async fn run(
        &self,
        document_id: &str,
        metadata: Value,
        cancel: CancelToken,
        slot: &mut Slot,
    ) -> Result<FlowOutcome, FlowError> {
        let mut state = FlowState::Idle;

        let reservation = match slot.held.clone() {
            // A prior attempt left a still-reserved number behind; reuse
            // it rather than reserving a second one for the same document.
            Some(held) => {
                debug!(
                    document_id,
                    sequence_number = held.sequence_number,
                    "reusing held reservation"
                );
                state = state.advance(FlowState::Holding);
                held
            }
            None => {
                state = state.advance(FlowState::Reserving);
                let reserved = match self
                    .store
                    .reserve(self.config.reserved_by.as_deref(), metadata)
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        // Nothing reserved, nothing to release.
                        state.advance(FlowState::Failed);
                        return Err(FlowError::Reserve(e));
                    }
                };
                debug!(
                    document_id,
                    sequence_number = reserved.sequence_number,
                    reservation_id = %reserved.reservation_id,
                    "number reserved"
                );
                slot.held = Some(reserved.clone());

                // Cancellation may have arrived while the reserve was in
                // flight; the landed reservation must still be released.
                if cancel.is_cancelled() {
                    state = state.advance(FlowState::Releasing);
                    self.release_held(slot).await;
                    state.advance(FlowState::Aborted);
                    return Ok(FlowOutcome::Cancelled);
                }

                state = state.advance(FlowState::Holding);
                reserved
            }
        };

        // Let the rendered document reflect the assigned number before
        // the consuming action runs.
        tokio::time::sleep(self.config.settle_delay).await;

        if cancel.is_cancelled() {
            state = state.advance(FlowState::Releasing);
            self.release_held(slot).await;
            state.advance(FlowState::Aborted);
            return Ok(FlowOutcome::Cancelled);
        }

        state = state.advance(FlowState::Delivering);
        match self.sink.deliver(reservation.sequence_number).await {
            DeliveryOutcome::Delivered => {
                state = state.advance(FlowState::Confirming);
                self.confirm(document_id, &reservation, slot, state).await
            }
            DeliveryOutcome::Aborted => {
                debug!(document_id, "delivery aborted by user");
                state = state.advance(FlowState::Releasing);
                self.release_held(slot).await;
                state.advance(FlowState::Aborted);
                Ok(FlowOutcome::Cancelled)
            }
            DeliveryOutcome::Failed(reason) => {
                error!(
                    document_id,
                    sequence_number = reservation.sequence_number,
                    reason = %reason,
                    "delivery failed"
                );
                state = state.advance(FlowState::Releasing);
                let release_error = self.release_held(slot).await;
                state.advance(FlowState::Failed);
                Err(FlowError::Delivery {
                    reason,
                    release_error,
                })
            }
        }
    }

    async fn confirm(
        &self,
        document_id: &str,
        reservation: &Reservation,
        slot: &mut Slot,
        state: FlowState,
    ) -> Result<FlowOutcome, FlowError> {
        match self.store.confirm(&reservation.reservation_id).await {
            Ok(confirmed) => {
                if let Err(e) = self.cache.set(confirmed.sequence_number) {
                    // Advisory cache only; the confirm already settled.
                    warn!(error = %e, "fallback cache write failed");
                }
                slot.held = None;
                state.advance(FlowState::Done);
                Ok(FlowOutcome::Delivered {
                    sequence_number: confirmed.sequence_number,
                })
            }
            Err(StoreError::InvalidState(reason)) => {
                // Benign race: the store already moved this reservation to
                // a terminal state, so there is nothing left to release.
                warn!(
                    document_id,
                    reservation_id = %reservation.reservation_id,
                    reason = %reason,
                    "confirm rejected as out of order"
                );
                slot.held = None;
                state.advance(FlowState::Failed);
                Err(FlowError::Confirm {
                    source: StoreError::InvalidState(reason),
                    release_error: None,
                })
            }
            Err(e) => {
                let state = state.advance(FlowState::Releasing);
                let release_error = self.release_held(slot).await;
                state.advance(FlowState::Failed);
                Err(FlowError::Confirm {
                    source: e,
                    release_error,
                })
            }
        }
    }

    /// Best-effort release of the held reservation.
    ///
    /// On success the slot is cleared. On failure the reservation stays
    /// held — still `RESERVED` on the store side — so a later attempt for
    /// the same document reuses its number, and the error is returned for
    /// the caller to attach as a secondary diagnostic.
    async fn release_held(&self, slot: &mut Slot) -> Option<StoreError> {
        let held = slot.held.as_ref()?;
        match self.store.release(&held.reservation_id).await {
            Ok(()) => {
                debug!(
                    reservation_id = %held.reservation_id,
                    sequence_number = held.sequence_number,
                    "reservation released"
                );
                slot.held = None;
                None
            }
            Err(e) => {
                warn!(
                    reservation_id = %held.reservation_id,
                    error = %e,
                    "release failed, keeping reservation for reuse"
                );
                Some(e)
            }
        }
    }
}
