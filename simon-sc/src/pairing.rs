//! Pairing request publisher and ack correlation
//!
//! Translates a user-submitted pairing request into a single message on
//! the pairing topic. Fire-and-forget: the device's ack arrives
//! asynchronously on the ack topic and is matched back to the originating
//! request only in the logs. The wire payload carries no request id, so
//! correlation is by `(ssid, username)`.

use crate::Result;
use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};
use simon_common::time::epoch_now;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;
use uuid::Uuid;

/// Topic on which pairing requests are published
pub const PAIR_TOPIC: &str = "simon/pair";

/// Acks are only useful for a short while; the table never grows past this.
const MAX_PENDING: usize = 64;

/// Outbound pairing request payload
///
/// Exactly these three fields; the device rejects nothing, but the wire
/// contract is fixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairRequest {
    pub ssid: String,
    pub password: String,
    pub username: String,
}

/// Inbound pairing acknowledgement payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PairAck {
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One outstanding pairing request awaiting its ack
#[derive(Debug, Clone)]
pub struct PendingPair {
    pub request_id: Uuid,
    pub ssid: String,
    pub username: String,
    pub requested_ts: i64,
}

/// Outstanding pairing requests, for log-side ack correlation
#[derive(Debug, Default)]
pub struct PairingRegistry {
    pending: Mutex<Vec<PendingPair>>,
}

impl PairingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outbound request and return its generated request id.
    ///
    /// The oldest entry is evicted once the cap is reached, so a device
    /// that never acks cannot grow the table without bound.
    pub fn register(&self, ssid: &str, username: &str) -> Uuid {
        let request_id = Uuid::new_v4();
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if pending.len() >= MAX_PENDING {
            pending.remove(0);
        }
        pending.push(PendingPair {
            request_id,
            ssid: ssid.to_string(),
            username: username.to_string(),
            requested_ts: epoch_now(),
        });
        request_id
    }

    /// Remove and return the oldest outstanding request matching an ack
    pub fn complete(&self, ssid: &str, username: &str) -> Option<PendingPair> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let idx = pending
            .iter()
            .position(|p| p.ssid == ssid && p.username == username)?;
        Some(pending.remove(idx))
    }

    /// Number of requests still awaiting an ack
    pub fn outstanding(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Publishes pairing requests on behalf of the web layer
///
/// Shares the broker client's connection; holds no other state.
#[derive(Clone)]
pub struct PairingPublisher {
    client: AsyncClient,
    registry: Arc<PairingRegistry>,
}

impl PairingPublisher {
    pub fn new(client: AsyncClient, registry: Arc<PairingRegistry>) -> Self {
        Self { client, registry }
    }

    /// Publish one pairing request.
    ///
    /// Fire-and-forget: returns once the message is handed to the
    /// transport, without waiting for the device's ack. The password goes
    /// on the wire but never into the logs.
    pub async fn request_pairing(&self, ssid: &str, password: &str, username: &str) -> Result<()> {
        let request_id = self.registry.register(ssid, username);

        let payload = serde_json::to_vec(&PairRequest {
            ssid: ssid.to_string(),
            password: password.to_string(),
            username: username.to_string(),
        })?;
        self.client
            .publish(PAIR_TOPIC, QoS::AtMostOnce, false, payload)
            .await?;

        info!(
            "Pairing request {} published for ssid '{}' user '{}'",
            request_id, ssid, username
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_register_then_complete() {
        let registry = PairingRegistry::new();
        let id = registry.register("simon-net", "alice");

        assert_eq!(registry.outstanding(), 1);

        let pending = registry.complete("simon-net", "alice").expect("Should match");
        assert_eq!(pending.request_id, id);
        assert_eq!(registry.outstanding(), 0);
    }

    #[test]
    fn test_registry_unmatched_ack_returns_none() {
        let registry = PairingRegistry::new();
        registry.register("simon-net", "alice");

        assert!(registry.complete("simon-net", "bob").is_none());
        assert_eq!(registry.outstanding(), 1);
    }

    #[test]
    fn test_registry_completes_oldest_match_first() {
        let registry = PairingRegistry::new();
        let first = registry.register("simon-net", "alice");
        let second = registry.register("simon-net", "alice");

        assert_eq!(registry.complete("simon-net", "alice").unwrap().request_id, first);
        assert_eq!(registry.complete("simon-net", "alice").unwrap().request_id, second);
    }

    #[test]
    fn test_registry_eviction_cap() {
        let registry = PairingRegistry::new();
        for i in 0..(MAX_PENDING + 10) {
            registry.register("simon-net", &format!("user-{}", i));
        }

        assert_eq!(registry.outstanding(), MAX_PENDING);
        // The oldest entries were evicted
        assert!(registry.complete("simon-net", "user-0").is_none());
        assert!(registry.complete("simon-net", "user-10").is_some());
    }

    #[test]
    fn test_pair_request_wire_shape() {
        let request = PairRequest {
            ssid: "myssid".to_string(),
            password: "mypwd".to_string(),
            username: "bob".to_string(),
        };

        let value = serde_json::to_value(&request).expect("Should serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "ssid": "myssid",
                "password": "mypwd",
                "username": "bob",
            })
        );
    }

    #[test]
    fn test_pair_ack_tolerates_missing_fields() {
        let ack: PairAck = serde_json::from_str("{\"status\":\"paired\"}").expect("Should parse");
        assert_eq!(ack.ssid, None);
        assert_eq!(ack.username, None);
        assert_eq!(ack.status.as_deref(), Some("paired"));
    }
}
