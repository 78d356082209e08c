//! HTTP sequence store client.
//!
//! One POST per operation against a remote store. Response shapes are
//! normalized before use: some store RPC layers return a single record,
//! others a one-element array, and field names drift between snake_case
//! and camelCase depending on the deployment.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::reservation::{Reservation, ReservationState};

use super::{Result, SequenceStore, StoreError};

/// Accepted spellings of the sequence number field.
const NUMBER_FIELDS: &[&str] = &["sequence_number", "sequenceNumber", "pod_number", "podNumber"];

/// HTTP client for a remote sequence store.
#[derive(Debug)]
pub struct HttpStore {
    client: Client,
    config: StoreConfig,
}

impl HttpStore {
    /// Create a client with the given configuration.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(StoreError::Protocol(
                "store base URL not configured".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Issue one RPC and hand back the raw JSON body.
    ///
    /// Non-2xx maps to `Server`, except 409 which the store uses to
    /// signal an out-of-order confirm/release.
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = self.url(path);
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            debug!(url = %url, status = %status, "store call succeeded");
            serde_json::from_str(&text)
                .map_err(|e| StoreError::Protocol(format!("unparseable response body: {e}")))
        } else if status == StatusCode::CONFLICT {
            Err(StoreError::InvalidState(truncate(&text)))
        } else {
            Err(StoreError::Server {
                status: status.as_u16(),
                body: truncate(&text),
            })
        }
    }
}

#[async_trait]
impl SequenceStore for HttpStore {
    async fn reserve(&self, reserved_by: Option<&str>, metadata: Value) -> Result<Reservation> {
        let body = json!({ "reserved_by": reserved_by, "metadata": metadata });
        let raw = self.post(&self.config.reserve_path, body).await?;
        normalize(raw)
    }

    async fn confirm(&self, reservation_id: &str) -> Result<Reservation> {
        let body = json!({ "reservation_id": reservation_id });
        let raw = self.post(&self.config.confirm_path, body).await?;
        normalize(raw)
    }

    async fn release(&self, reservation_id: &str) -> Result<()> {
        let body = json!({ "reservation_id": reservation_id });
        match self.post(&self.config.release_path, body).await {
            Ok(_) => Ok(()),
            // Already terminal on the store side. Release is cleanup, so
            // observe it idempotently.
            Err(StoreError::InvalidState(reason)) => {
                debug!(
                    reservation_id,
                    reason = %reason,
                    "release of terminal reservation, treated as no-op"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Normalize a store response into a [`Reservation`].
///
/// Accepts a single object or a one-element array, and either naming
/// convention for the number field.
fn normalize(value: Value) -> Result<Reservation> {
    let record = match value {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Err(StoreError::Protocol("empty response array".to_string()));
            }
            items.remove(0)
        }
        other => other,
    };

    let obj = record
        .as_object()
        .ok_or_else(|| StoreError::Protocol("response is not a record".to_string()))?;

    let reservation_id = obj
        .get("reservation_id")
        .or_else(|| obj.get("reservationId"))
        .and_then(field_as_string)
        .ok_or_else(|| StoreError::Protocol("response missing reservation_id".to_string()))?;

    let sequence_number = NUMBER_FIELDS
        .iter()
        .find_map(|name| obj.get(*name))
        .and_then(field_as_u64)
        .ok_or_else(|| StoreError::Protocol("response missing sequence_number".to_string()))?;

    let state = obj
        .get("state")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(ReservationState::Reserved);

    let reserved_by = obj
        .get("reserved_by")
        .or_else(|| obj.get("reservedBy"))
        .and_then(field_as_string);

    let metadata = obj.get("metadata").cloned().unwrap_or(Value::Null);

    Ok(Reservation {
        reservation_id,
        sequence_number,
        state,
        reserved_by,
        metadata,
    })
}

/// Opaque ids arrive as strings or bare integers depending on the store.
fn field_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers arrive as integers or numeric strings.
fn field_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Cap diagnostic bodies so a misbehaving store cannot flood logs.
fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_single_record() {
        let raw = json!({
            "reservation_id": "r1",
            "sequence_number": 33801,
            "state": "RESERVED",
            "reserved_by": "device-A",
            "metadata": { "orderNo": "123" }
        });

        let reservation = normalize(raw).unwrap();
        assert_eq!(reservation.reservation_id, "r1");
        assert_eq!(reservation.sequence_number, 33801);
        assert_eq!(reservation.state, ReservationState::Reserved);
        assert_eq!(reservation.reserved_by.as_deref(), Some("device-A"));
        assert_eq!(reservation.metadata["orderNo"], "123");
    }

    #[test]
    fn normalizes_one_element_array() {
        let raw = json!([{ "reservation_id": "r2", "sequence_number": 7 }]);
        let reservation = normalize(raw).unwrap();
        assert_eq!(reservation.reservation_id, "r2");
        assert_eq!(reservation.sequence_number, 7);
        // Absent state defaults to the only state a fresh row can hold.
        assert_eq!(reservation.state, ReservationState::Reserved);
    }

    #[test]
    fn accepts_camel_case_and_legacy_field_names() {
        let raw = json!({ "reservationId": 42, "podNumber": "33802" });
        let reservation = normalize(raw).unwrap();
        assert_eq!(reservation.reservation_id, "42");
        assert_eq!(reservation.sequence_number, 33802);
    }

    #[test]
    fn parses_confirmed_state() {
        let raw = json!({ "reservation_id": "r1", "sequence_number": 1, "state": "CONFIRMED" });
        let reservation = normalize(raw).unwrap();
        assert_eq!(reservation.state, ReservationState::Confirmed);
    }

    #[test]
    fn missing_reservation_id_is_protocol_error() {
        let raw = json!({ "sequence_number": 33801 });
        let err = normalize(raw).unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)), "{err}");
    }

    #[test]
    fn missing_number_is_protocol_error() {
        let raw = json!({ "reservation_id": "r1" });
        let err = normalize(raw).unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)), "{err}");
    }

    #[test]
    fn empty_array_is_protocol_error() {
        let err = normalize(json!([])).unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)), "{err}");
    }

    #[test]
    fn empty_base_url_rejected() {
        let err = HttpStore::new(StoreConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)), "{err}");
    }
}
