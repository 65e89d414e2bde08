// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transports that carry the lamp's power state.
//!
//! The observer is transport-agnostic: it only needs to read the property
//! once, wait for the next change, and request a write.
//!
//! # Transports
//!
//! - [`HttpTransport`]: WoT HTTP property protocol, observation by long-poll
//! - [`MqttTransport`]: push channel carrying `lampStateUpdate` and
//!   `setLampState` events
//! - [`AnyTransport`]: one of the above, selected by configuration
//!
//! # Cancellation
//!
//! Every future returned by a transport must be safe to drop at any await
//! point. The observer cancels an in-flight request by dropping its future.

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "http")]
pub use http::HttpTransport;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

use std::future::Future;

use crate::error::TransportError;
use crate::payload::RawPayload;
use crate::types::PowerState;

/// Name of the observed property.
pub const POWER_STATE_PROPERTY: &str = "powerState";

/// Trait for transports that can read, observe and write the power state.
pub trait Transport: Send + Sync + 'static {
    /// Reads the current value once.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails or is rejected.
    fn read(&self) -> impl Future<Output = Result<RawPayload, TransportError>> + Send;

    /// Waits for the next value.
    ///
    /// For long-poll transports this is one held request; for push channels
    /// it is the next delivered message. There is no client-side deadline.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails or the channel closes.
    fn observe(&self) -> impl Future<Output = Result<RawPayload, TransportError>> + Send;

    /// Requests the remote to switch to `state`.
    ///
    /// Callers only pass `On` or `Off`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails or is rejected.
    fn write(&self, state: PowerState) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// A transport chosen at runtime from configuration.
#[cfg(any(feature = "http", feature = "mqtt"))]
#[derive(Debug)]
pub enum AnyTransport {
    /// HTTP long-poll transport.
    #[cfg(feature = "http")]
    Http(HttpTransport),
    /// MQTT push-channel transport.
    #[cfg(feature = "mqtt")]
    Mqtt(MqttTransport),
}

#[cfg(any(feature = "http", feature = "mqtt"))]
impl AnyTransport {
    /// Creates the transport described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configured transport is not compiled in,
    /// or `Error::Read` if the transport cannot be set up.
    pub async fn connect(config: &crate::ObserverConfig) -> crate::Result<Self> {
        use crate::TransportConfig;
        use crate::error::{ConfigError, Error};

        match config.transport() {
            #[cfg(feature = "http")]
            TransportConfig::Http(http) => HttpTransport::new(http, config.thing())
                .map(Self::Http)
                .map_err(Error::Read),
            #[cfg(feature = "mqtt")]
            TransportConfig::Mqtt(mqtt) => MqttTransport::connect(mqtt, config.thing())
                .await
                .map(Self::Mqtt)
                .map_err(Error::Read),
            #[allow(unreachable_patterns)]
            other => Err(ConfigError::UnknownTransport(other.kind().to_string()).into()),
        }
    }
}

#[cfg(any(feature = "http", feature = "mqtt"))]
impl Transport for AnyTransport {
    async fn read(&self) -> Result<RawPayload, TransportError> {
        match self {
            #[cfg(feature = "http")]
            Self::Http(transport) => transport.read().await,
            #[cfg(feature = "mqtt")]
            Self::Mqtt(transport) => transport.read().await,
        }
    }

    async fn observe(&self) -> Result<RawPayload, TransportError> {
        match self {
            #[cfg(feature = "http")]
            Self::Http(transport) => transport.observe().await,
            #[cfg(feature = "mqtt")]
            Self::Mqtt(transport) => transport.observe().await,
        }
    }

    async fn write(&self, state: PowerState) -> Result<(), TransportError> {
        match self {
            #[cfg(feature = "http")]
            Self::Http(transport) => transport.write(state).await,
            #[cfg(feature = "mqtt")]
            Self::Mqtt(transport) => transport.write(state).await,
        }
    }
}
