// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT push-channel transport.
//!
//! The lamp service pushes its state as `lampStateUpdate` events and accepts
//! `setLampState` events. Over MQTT these are the topics:
//!
//! - `{thing}/lampStateUpdate` (subscribed; the retained message is the
//!   current state)
//! - `{thing}/setLampState` (published, `{"powerState":"on"}`)
//!
//! Only the latest update is kept. A read returns it, and an observation
//! waits for the next one; updates that arrive while nobody observes are
//! superseded, never replayed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::observer::MqttConfig;
use crate::payload::RawPayload;
use crate::protocol::Transport;
use crate::types::PowerState;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Event carrying state updates from the service.
pub(crate) const UPDATE_EVENT: &str = "lampStateUpdate";
/// Event carrying write requests to the service.
pub(crate) const SET_EVENT: &str = "setLampState";

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

const EVENT_LOOP_STOPPED: &str = "MQTT event loop stopped";

/// Broker link as last seen by the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Link {
    Up,
    Down(String),
}

impl Link {
    fn reason(&self) -> Option<&str> {
        match self {
            Self::Up => None,
            Self::Down(reason) => Some(reason),
        }
    }

    fn is_down(&self) -> bool {
        self.reason().is_some()
    }
}

/// MQTT transport for a single thing.
///
/// A background task drives the MQTT event loop. It overwrites the latest
/// update and the link state; neither is queued. The task stops when the
/// transport is dropped.
#[derive(Debug)]
pub struct MqttTransport {
    client: AsyncClient,
    update_topic: String,
    command_topic: String,
    /// Cursor over the latest update; marks what was already returned.
    latest: Mutex<watch::Receiver<Option<RawPayload>>>,
    link: watch::Receiver<Link>,
    read_timeout: Duration,
    event_task: JoinHandle<()>,
}

impl MqttTransport {
    /// Connects to the broker described by `config` and subscribes to the
    /// update topic of `thing`.
    ///
    /// # Errors
    ///
    /// Returns error if the broker URL is invalid or the subscription cannot
    /// be queued.
    pub async fn connect(config: &MqttConfig, thing: &str) -> Result<Self, TransportError> {
        if thing.is_empty() {
            return Err(TransportError::InvalidAddress(
                "thing identifier is required".to_string(),
            ));
        }

        let (host, port) = parse_mqtt_url(config.broker_url())?;

        let client_id = config.client_id().map_or_else(
            || {
                let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
                format!("wot_lamp_{}_{}", std::process::id(), counter)
            },
            str::to_owned,
        );

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(options, 10);

        let update_topic = format!("{thing}/{UPDATE_EVENT}");
        let command_topic = format!("{thing}/{SET_EVENT}");

        client.subscribe(&update_topic, QoS::AtLeastOnce).await?;

        let (latest_tx, latest_rx) = watch::channel(None);
        let (link_tx, link_rx) = watch::channel(Link::Up);
        let event_task = tokio::spawn(handle_mqtt_events(
            event_loop,
            update_topic.clone(),
            latest_tx,
            link_tx,
        ));

        tracing::debug!(topic = %update_topic, "Subscribed to lamp state updates");

        Ok(Self {
            client,
            update_topic,
            command_topic,
            latest: Mutex::new(latest_rx),
            link: link_rx,
            read_timeout: config.read_timeout(),
            event_task,
        })
    }

    /// Returns the topic updates arrive on.
    #[must_use]
    pub fn update_topic(&self) -> &str {
        &self.update_topic
    }

    /// Returns the topic write requests are published to.
    #[must_use]
    pub fn command_topic(&self) -> &str {
        &self.command_topic
    }

    /// Waits for an update newer than the last one returned.
    ///
    /// Fails as soon as the broker link is down, including when it already
    /// is on entry.
    async fn next_update(
        &self,
        latest: &mut watch::Receiver<Option<RawPayload>>,
    ) -> Result<RawPayload, TransportError> {
        let mut link = self.link.clone();
        loop {
            tokio::select! {
                biased;
                reason = wait_link_down(&mut link) => {
                    return Err(TransportError::ConnectionFailed(reason));
                }
                changed = latest.changed() => {
                    changed.map_err(|_| TransportError::ChannelClosed(EVENT_LOOP_STOPPED.to_string()))?;
                    let update = latest.borrow_and_update().clone();
                    if let Some(payload) = update {
                        return Ok(payload);
                    }
                }
            }
        }
    }
}

async fn wait_link_down(link: &mut watch::Receiver<Link>) -> String {
    match link.wait_for(Link::is_down).await {
        Ok(state) => state.reason().unwrap_or_default().to_string(),
        Err(_) => EVENT_LOOP_STOPPED.to_string(),
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

impl Transport for MqttTransport {
    async fn read(&self) -> Result<RawPayload, TransportError> {
        // Safe: read timeouts are seconds, far below u64::MAX milliseconds
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = self.read_timeout.as_millis() as u64;

        let mut latest = self.latest.lock().await;

        let down = self.link.borrow().reason().map(str::to_owned);
        if let Some(reason) = down {
            return Err(TransportError::ConnectionFailed(reason));
        }

        let current = latest.borrow_and_update().clone();
        if let Some(payload) = current {
            return Ok(payload);
        }

        tokio::time::timeout(self.read_timeout, self.next_update(&mut latest))
            .await
            .map_err(|_| TransportError::Timeout(timeout_ms))?
    }

    async fn observe(&self) -> Result<RawPayload, TransportError> {
        let mut latest = self.latest.lock().await;
        self.next_update(&mut latest).await
    }

    async fn write(&self, state: PowerState) -> Result<(), TransportError> {
        let payload = serde_json::json!({ "powerState": state.as_str() }).to_string();

        tracing::debug!(topic = %self.command_topic, payload = %payload, "Publishing lamp state request");

        self.client
            .publish(&self.command_topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(TransportError::Mqtt)
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), TransportError> {
    let address = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    if address.is_empty() {
        return Err(TransportError::InvalidAddress(format!(
            "missing broker host: {url}"
        )));
    }

    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| TransportError::InvalidAddress(format!("invalid port: {port}")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((address.to_string(), 1883)),
    }
}

/// Drives the MQTT event loop, recording the latest update and link state.
async fn handle_mqtt_events(
    mut event_loop: EventLoop,
    update_topic: String,
    latest: watch::Sender<Option<RawPayload>>,
    link: watch::Sender<Link>,
) {
    use rumqttc::{Event, Packet};

    while !latest.is_closed() {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT connected");
                link.send_if_modified(|state| {
                    let changed = state.is_down();
                    *state = Link::Up;
                    changed
                });
            }
            Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == update_topic => {
                tracing::debug!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "Received lamp state update"
                );
                latest.send_replace(Some(RawPayload::from_json_bytes(&publish.payload)));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT event loop error");
                link.send_replace(Link::Down(e.to_string()));
                // The next poll reconnects; give the broker a moment first.
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mqtt_url_with_port() {
        let (host, port) = parse_mqtt_url("mqtt://192.168.1.50:1883").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_default_port() {
        let (host, port) = parse_mqtt_url("broker.local").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_tcp_scheme() {
        let (host, port) = parse_mqtt_url("tcp://broker.local:8883").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 8883);
    }

    #[test]
    fn link_reason() {
        assert!(!Link::Up.is_down());
        let down = Link::Down("connection refused".to_string());
        assert!(down.is_down());
        assert_eq!(down.reason(), Some("connection refused"));
    }

    #[tokio::test]
    async fn waiting_for_link_down_reports_reason() {
        let (tx, mut rx) = watch::channel(Link::Up);
        tx.send_replace(Link::Down("broker unreachable".to_string()));
        assert_eq!(wait_link_down(&mut rx).await, "broker unreachable");

        drop(tx);
        let (_, mut closed) = watch::channel(Link::Up);
        assert_eq!(wait_link_down(&mut closed).await, EVENT_LOOP_STOPPED);
    }

    #[test]
    fn parse_mqtt_url_invalid() {
        assert!(parse_mqtt_url("mqtt://broker:port").is_err());
        assert!(parse_mqtt_url("mqtt://").is_err());
    }
}
