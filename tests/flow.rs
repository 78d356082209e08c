//! End-to-end flow tests through the public API: mock store, capability
//! fallback sink, and a file-backed cache.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use docnum::clients::mock::MockStore;
use docnum::config::FlowConfig;
use docnum::{
    CancelToken, DeliveryOutcome, DeliverySink, FallbackCache, FallbackSink, FlowError,
    FlowOutcome, JsonFileCache, Orchestrator,
};

/// Stand-in for a native share sheet that this device cannot perform.
struct UnavailableShare;

#[async_trait]
impl DeliverySink for UnavailableShare {
    async fn deliver(&self, _sequence_number: u64) -> DeliveryOutcome {
        DeliveryOutcome::Failed("share invoked on incapable device".to_string())
    }

    fn available(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "share"
    }
}

/// Stand-in for the forced-save path.
struct ForcedSave {
    outcome: DeliveryOutcome,
    saves: AtomicU32,
}

#[async_trait]
impl DeliverySink for ForcedSave {
    async fn deliver(&self, _sequence_number: u64) -> DeliveryOutcome {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn name(&self) -> &str {
        "save"
    }
}

fn config() -> FlowConfig {
    FlowConfig::default()
        .with_reserved_by("device-A")
        .with_settle_delay(Duration::from_millis(0))
}

#[tokio::test]
async fn forced_save_counts_as_delivery_and_persists_the_number() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(JsonFileCache::new(dir.path().join("last_number.json")));
    let store = Arc::new(MockStore::new(33801));
    let save = Arc::new(ForcedSave {
        outcome: DeliveryOutcome::Delivered,
        saves: AtomicU32::new(0),
    });
    let sink = Arc::new(FallbackSink::new(Arc::new(UnavailableShare), save.clone()));

    let orchestrator = Orchestrator::new(store.clone(), sink, cache.clone(), config());

    assert_eq!(orchestrator.seed_number(), None);

    let outcome = orchestrator
        .produce("doc-1", json!({ "orderNo": "123" }), CancelToken::new())
        .await
        .unwrap();

    // The forced-save fallback consumes the number exactly like a share.
    assert_eq!(
        outcome,
        FlowOutcome::Delivered {
            sequence_number: 33801
        }
    );
    assert_eq!(save.saves.load(Ordering::SeqCst), 1);
    assert_eq!(store.confirm_calls(), 1);
    assert_eq!(store.release_calls(), 0);

    // A fresh orchestrator on the same device picks up the cached hint.
    let seeded = Orchestrator::new(
        store,
        Arc::new(ForcedSave {
            outcome: DeliveryOutcome::Delivered,
            saves: AtomicU32::new(0),
        }),
        cache,
        config(),
    );
    assert_eq!(seeded.seed_number(), Some(33801));
}

#[tokio::test]
async fn failure_then_retry_consumes_a_single_number() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(JsonFileCache::new(dir.path().join("last_number.json")));
    let store = Arc::new(MockStore::new(33802));

    let failing = Orchestrator::new(
        store.clone(),
        Arc::new(ForcedSave {
            outcome: DeliveryOutcome::Failed("render error".to_string()),
            saves: AtomicU32::new(0),
        }),
        cache.clone(),
        config(),
    );

    let err = failing
        .produce("doc-2", json!({}), CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Delivery { .. }));
    assert_eq!(store.release_calls(), 1);
    assert_eq!(cache.get(), None);

    // The released number is reusable by the next attempt.
    let retrying = Orchestrator::new(
        store.clone(),
        Arc::new(ForcedSave {
            outcome: DeliveryOutcome::Delivered,
            saves: AtomicU32::new(0),
        }),
        cache.clone(),
        config(),
    );

    let outcome = retrying
        .produce("doc-2", json!({}), CancelToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        FlowOutcome::Delivered {
            sequence_number: 33802
        }
    );
    assert_eq!(cache.get(), Some(33802));
}
