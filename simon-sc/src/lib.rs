//! simon-sc library - Score Collector service
//!
//! Receives Simon game score events from the MQTT bus, merges them into
//! the append-only score log, and relays pairing requests from the web
//! layer to the device. The web layer consumes this crate through
//! [`simon_common::ScoreLog::read_recent`] and
//! [`pairing::PairingPublisher::request_pairing`].

pub mod broker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pairing;

pub use broker::BrokerClient;
pub use error::{Error, Result};
pub use ingest::Dispatcher;
pub use pairing::{PairingPublisher, PairingRegistry};
