//! Integration tests for score ingestion and pairing
//!
//! Tests cover:
//! - Score message dispatch into the append-only log
//! - Silent handling of malformed payloads
//! - Arrival-order and read semantics of the score log
//! - Pairing ack correlation
//! - Pairing request payload contract

use simon_common::time::{epoch_now, format_local_date};
use simon_common::ScoreLog;
use simon_sc::ingest::{Dispatcher, PAIR_ACK_TOPIC, SCORES_TOPIC};
use simon_sc::pairing::{PairingPublisher, PairingRegistry};
use std::sync::Arc;
use tempfile::TempDir;

/// Test helper: score log backed by a temp directory
fn setup_store() -> (TempDir, Arc<ScoreLog>) {
    let dir = TempDir::new().expect("Should create temp dir");
    let log = Arc::new(ScoreLog::new(dir.path().join("scores.jsonl")));
    (dir, log)
}

/// Test helper: dispatcher plus the registry it correlates acks against
fn setup_dispatcher(log: &Arc<ScoreLog>) -> (Dispatcher, Arc<PairingRegistry>) {
    let registry = Arc::new(PairingRegistry::new());
    let dispatcher = Dispatcher::new(Arc::clone(log), Arc::clone(&registry));
    (dispatcher, registry)
}

// =============================================================================
// Score ingestion
// =============================================================================

#[test]
fn test_valid_score_message_is_recorded() {
    let (_dir, log) = setup_store();
    let (dispatcher, _registry) = setup_dispatcher(&log);

    let before = epoch_now();
    dispatcher.handle(
        SCORES_TOPIC,
        br#"{"ssid":"esp32-1","username":"alice","score":42}"#,
    );
    let after = epoch_now();

    let recent = log.read_recent(1);
    assert_eq!(recent.len(), 1);

    let record = &recent[0];
    assert_eq!(record.ssid.as_deref(), Some("esp32-1"));
    assert_eq!(record.username.as_deref(), Some("alice"));
    assert_eq!(record.score, Some(serde_json::Number::from(42)));
    assert!(record.ts >= before && record.ts <= after);
    assert_eq!(record.date, format_local_date(record.ts));
}

#[test]
fn test_malformed_score_payload_leaves_store_unchanged() {
    let (_dir, log) = setup_store();
    let (dispatcher, _registry) = setup_dispatcher(&log);

    dispatcher.handle(
        SCORES_TOPIC,
        br#"{"ssid":"esp32-1","username":"alice","score":1}"#,
    );
    assert_eq!(log.load().len(), 1);

    // None of these should append or panic
    dispatcher.handle(SCORES_TOPIC, b"not json at all");
    dispatcher.handle(SCORES_TOPIC, b"{\"truncated\":");
    dispatcher.handle(SCORES_TOPIC, &[0xff, 0xfe, 0x00]);
    dispatcher.handle(SCORES_TOPIC, b"[1,2,3]");

    assert_eq!(log.load().len(), 1);
}

#[test]
fn test_score_fields_are_all_optional() {
    let (_dir, log) = setup_store();
    let (dispatcher, _registry) = setup_dispatcher(&log);

    dispatcher.handle(SCORES_TOPIC, b"{}");
    dispatcher.handle(SCORES_TOPIC, br#"{"score":7}"#);

    let all = log.load();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].ssid, None);
    assert_eq!(all[0].username, None);
    assert_eq!(all[0].score, None);
    assert_eq!(all[1].score, Some(serde_json::Number::from(7)));
}

#[test]
fn test_scores_are_stored_in_arrival_order() {
    let (_dir, log) = setup_store();
    let (dispatcher, _registry) = setup_dispatcher(&log);

    dispatcher.handle(SCORES_TOPIC, br#"{"username":"first","score":1}"#);
    dispatcher.handle(SCORES_TOPIC, br#"{"username":"second","score":2}"#);

    let all = log.load();
    assert_eq!(all[0].username.as_deref(), Some("first"));
    assert_eq!(all[1].username.as_deref(), Some("second"));

    // read_recent reverses to newest first
    let recent = log.read_recent(2);
    assert_eq!(recent[0].username.as_deref(), Some("second"));
    assert_eq!(recent[1].username.as_deref(), Some("first"));
}

#[test]
fn test_read_recent_is_idempotent_without_appends() {
    let (_dir, log) = setup_store();
    let (dispatcher, _registry) = setup_dispatcher(&log);

    dispatcher.handle(SCORES_TOPIC, br#"{"username":"alice","score":3}"#);

    assert_eq!(log.read_recent(10), log.read_recent(10));
}

#[test]
fn test_unexpected_topic_is_a_noop() {
    let (_dir, log) = setup_store();
    let (dispatcher, registry) = setup_dispatcher(&log);

    dispatcher.handle("simon/unknown", br#"{"username":"alice","score":3}"#);

    assert!(log.load().is_empty());
    assert_eq!(registry.outstanding(), 0);
}

// =============================================================================
// Pairing acks
// =============================================================================

#[test]
fn test_pair_ack_completes_registered_request() {
    let (_dir, log) = setup_store();
    let (dispatcher, registry) = setup_dispatcher(&log);

    registry.register("simon-net", "bob");
    assert_eq!(registry.outstanding(), 1);

    dispatcher.handle(
        PAIR_ACK_TOPIC,
        br#"{"ssid":"simon-net","username":"bob","status":"paired"}"#,
    );

    assert_eq!(registry.outstanding(), 0);
    // Acks never create score records
    assert!(log.load().is_empty());
}

#[test]
fn test_pair_ack_without_registration_is_logged_only() {
    let (_dir, log) = setup_store();
    let (dispatcher, registry) = setup_dispatcher(&log);

    dispatcher.handle(
        PAIR_ACK_TOPIC,
        br#"{"ssid":"simon-net","username":"bob","status":"failed"}"#,
    );

    assert_eq!(registry.outstanding(), 0);
    assert!(log.load().is_empty());
}

#[test]
fn test_malformed_pair_ack_is_dropped() {
    let (_dir, log) = setup_store();
    let (dispatcher, registry) = setup_dispatcher(&log);

    registry.register("simon-net", "bob");
    dispatcher.handle(PAIR_ACK_TOPIC, b"garbage");

    // The outstanding request is untouched
    assert_eq!(registry.outstanding(), 1);
    assert!(log.load().is_empty());
}

// =============================================================================
// Pairing requests
// =============================================================================

#[tokio::test]
async fn test_request_pairing_registers_and_leaves_store_alone() {
    let (_dir, log) = setup_store();
    let registry = Arc::new(PairingRegistry::new());

    // The client is never polled; the publish only has to be queued.
    let options = rumqttc::MqttOptions::new("test-pair", "127.0.0.1", 1883);
    let (client, _event_loop) = rumqttc::AsyncClient::new(options, 4);

    let publisher = PairingPublisher::new(client, Arc::clone(&registry));
    publisher
        .request_pairing("myssid", "mypwd", "bob")
        .await
        .expect("Should queue pairing request");

    assert_eq!(registry.outstanding(), 1);
    assert!(log.load().is_empty(), "Pairing must not append score records");
}
