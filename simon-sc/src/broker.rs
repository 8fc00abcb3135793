//! MQTT broker client
//!
//! Owns the single connection to the message bus for the process
//! lifetime. The receive loop runs on its own tokio task, dispatching
//! each inbound message synchronously in arrival order, and reconnects
//! with bounded exponential backoff when the transport drops.

use crate::ingest::{Dispatcher, PAIR_ACK_TOPIC, SCORES_TOPIC};
use crate::Result;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use simon_common::config::BrokerConfig;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to the running broker connection
///
/// Dropping the handle does not stop the receive loop; call
/// [`BrokerClient::stop`] for an orderly disconnect.
pub struct BrokerClient {
    client: AsyncClient,
    receive_task: JoinHandle<()>,
}

impl BrokerClient {
    /// Connect to the broker and start the receive loop.
    ///
    /// An unreachable broker is not fatal: the receive loop keeps
    /// retrying with bounded backoff until the broker appears.
    /// Subscriptions are (re)established on every successful connection,
    /// so they survive transport drops.
    pub fn start(config: &BrokerConfig, client_id: &str, dispatcher: Dispatcher) -> Self {
        let mut options = MqttOptions::new(client_id, config.host.as_str(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs));

        let (client, event_loop) = AsyncClient::new(options, 16);

        let initial_backoff = Duration::from_secs(config.reconnect_initial_secs.max(1));
        let max_backoff = Duration::from_secs(
            config.reconnect_max_secs.max(config.reconnect_initial_secs.max(1)),
        );

        let task_client = client.clone();
        let receive_task = tokio::spawn(async move {
            receive_loop(task_client, event_loop, dispatcher, initial_backoff, max_backoff).await;
        });

        info!("Broker client started for {}:{}", config.host, config.port);
        Self {
            client,
            receive_task,
        }
    }

    /// Client handle for publishing on the shared connection
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Publish a payload on `topic`.
    ///
    /// Side effect only; does not wait for any acknowledgement.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }

    /// Disconnect and stop the receive loop
    pub async fn stop(self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("Disconnect on stop failed: {}", e);
        }
        self.receive_task.abort();
        info!("Broker client stopped");
    }
}

/// Poll the transport forever: dispatch publishes one at a time in
/// arrival order, back off on transport errors.
async fn receive_loop(
    client: AsyncClient,
    mut event_loop: EventLoop,
    dispatcher: Dispatcher,
    initial_backoff: Duration,
    max_backoff: Duration,
) {
    let mut backoff = initial_backoff;
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to broker");
                backoff = initial_backoff;
                subscribe(&client).await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                dispatcher.handle(&publish.topic, &publish.payload);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Broker connection error: {} (retrying in {:?})", e, backoff);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
            }
        }
    }
}

async fn subscribe(client: &AsyncClient) {
    for topic in [SCORES_TOPIC, PAIR_ACK_TOPIC] {
        if let Err(e) = client.subscribe(topic, QoS::AtMostOnce).await {
            warn!("Failed to subscribe to {}: {}", topic, e);
        }
    }
}
