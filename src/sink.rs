//! Delivery sink boundary.
//!
//! The sink performs the consuming action for a rendered document — a
//! native share sheet, a forced save, anything that irreversibly hands
//! the artifact to the user. Its outcome is the only signal that decides
//! confirm versus release, so the three cases are kept distinct: a user
//! backing out of a share sheet is not a failure.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

/// Outcome of attempting to hand a rendered document off the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The consuming action completed; the number is spent.
    Delivered,
    /// The user backed out before the document left the device.
    Aborted,
    /// The action failed outright.
    Failed(String),
}

/// A destination that consumes a rendered document.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Attempt the consuming action for the given document number.
    async fn deliver(&self, sequence_number: u64) -> DeliveryOutcome;

    /// Capability probe: whether this sink can run on the current device.
    fn available(&self) -> bool {
        true
    }

    /// Sink name for logging.
    fn name(&self) -> &str;
}

/// Prefers one sink, falling back to another when the device cannot
/// perform the preferred hand-off.
///
/// Typical pairing: native share as preferred, forced save as fallback.
/// Both report through the same [`DeliveryOutcome`], so the orchestrator
/// never branches on which one ran.
pub struct FallbackSink {
    preferred: Arc<dyn DeliverySink>,
    fallback: Arc<dyn DeliverySink>,
}

impl FallbackSink {
    pub fn new(preferred: Arc<dyn DeliverySink>, fallback: Arc<dyn DeliverySink>) -> Self {
        Self {
            preferred,
            fallback,
        }
    }
}

#[async_trait]
impl DeliverySink for FallbackSink {
    async fn deliver(&self, sequence_number: u64) -> DeliveryOutcome {
        let sink = if self.preferred.available() {
            &self.preferred
        } else {
            debug!(
                preferred = self.preferred.name(),
                fallback = self.fallback.name(),
                "preferred sink unavailable, using fallback"
            );
            &self.fallback
        };
        sink.deliver(sequence_number).await
    }

    fn available(&self) -> bool {
        self.preferred.available() || self.fallback.available()
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSink {
        name: &'static str,
        available: bool,
        deliveries: AtomicU32,
    }

    impl CountingSink {
        fn new(name: &'static str, available: bool) -> Self {
            Self {
                name,
                available,
                deliveries: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DeliverySink for CountingSink {
        async fn deliver(&self, _sequence_number: u64) -> DeliveryOutcome {
            self.deliveries.fetch_add(1, Ordering::SeqCst);
            DeliveryOutcome::Delivered
        }

        fn available(&self) -> bool {
            self.available
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    #[tokio::test]
    async fn uses_preferred_sink_when_available() {
        let preferred = Arc::new(CountingSink::new("share", true));
        let fallback = Arc::new(CountingSink::new("save", true));
        let sink = FallbackSink::new(preferred.clone(), fallback.clone());

        assert_eq!(sink.deliver(1).await, DeliveryOutcome::Delivered);
        assert_eq!(preferred.deliveries.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.deliveries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_when_preferred_unavailable() {
        let preferred = Arc::new(CountingSink::new("share", false));
        let fallback = Arc::new(CountingSink::new("save", true));
        let sink = FallbackSink::new(preferred.clone(), fallback.clone());

        assert_eq!(sink.deliver(1).await, DeliveryOutcome::Delivered);
        assert_eq!(preferred.deliveries.load(Ordering::SeqCst), 0);
        assert_eq!(fallback.deliveries.load(Ordering::SeqCst), 1);
    }
}
