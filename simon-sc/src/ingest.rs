//! Inbound message dispatch
//!
//! One dispatcher instance serves the broker receive loop. Messages are
//! handled synchronously in arrival order. A malformed payload is dropped
//! without surfacing an error, so device misbehavior can never take down
//! ingestion; the drop leaves a debug-level breadcrumb only.

use crate::pairing::{PairAck, PairingRegistry};
use simon_common::{ScoreLog, ScoreRecord, ScoreReport};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Topic carrying score reports from devices
pub const SCORES_TOPIC: &str = "simon/scores";
/// Topic carrying pairing acknowledgements from devices
pub const PAIR_ACK_TOPIC: &str = "simon/pair/ack";

/// Routes inbound bus messages to the score log and the pairing registry
#[derive(Clone)]
pub struct Dispatcher {
    log: Arc<ScoreLog>,
    pairing: Arc<PairingRegistry>,
}

impl Dispatcher {
    pub fn new(log: Arc<ScoreLog>, pairing: Arc<PairingRegistry>) -> Self {
        Self { log, pairing }
    }

    /// Handle one inbound message.
    ///
    /// Never returns an error: ingestion failures are logged and dropped.
    pub fn handle(&self, topic: &str, payload: &[u8]) {
        match topic {
            SCORES_TOPIC => self.handle_score(payload),
            PAIR_ACK_TOPIC => self.handle_pair_ack(payload),
            // Only the two subscribed topics are expected.
            other => debug!("Ignoring message on unexpected topic '{}'", other),
        }
    }

    fn handle_score(&self, payload: &[u8]) {
        let report: ScoreReport = match serde_json::from_slice(payload) {
            Ok(report) => report,
            Err(e) => {
                debug!("Dropping unparsable score payload: {}", e);
                return;
            }
        };

        // Receipt time is stamped here, not supplied by the producer.
        let record = ScoreRecord::from_report(report);
        if let Err(e) = self.log.append(&record) {
            error!("Failed to append score record: {}", e);
            return;
        }

        info!(
            "Recorded score {:?} for user {:?} (ssid {:?})",
            record.score, record.username, record.ssid
        );
    }

    fn handle_pair_ack(&self, payload: &[u8]) {
        let ack: PairAck = match serde_json::from_slice(payload) {
            Ok(ack) => ack,
            Err(e) => {
                debug!("Dropping unparsable pairing ack: {}", e);
                return;
            }
        };

        let ssid = ack.ssid.as_deref().unwrap_or("");
        let username = ack.username.as_deref().unwrap_or("");
        let status = ack.status.as_deref().unwrap_or("unknown");

        match self.pairing.complete(ssid, username) {
            Some(pending) => info!(
                "{} paired with {} - status: {} (request {})",
                ssid, username, status, pending.request_id
            ),
            None => info!("{} paired with {} - status: {}", ssid, username, status),
        }
    }
}
