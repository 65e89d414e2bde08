// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable for the WoT host base URL.
pub const ENV_BASE_URL: &str = "WOT_BASE_URL";
/// Environment variable for the thing identifier.
pub const ENV_THING: &str = "WOT_THING";
/// Environment variable for the backoff interval in milliseconds.
pub const ENV_BACKOFF_MS: &str = "WOT_BACKOFF_MS";
/// Environment variable selecting the transport (`http` or `mqtt`).
pub const ENV_TRANSPORT: &str = "WOT_TRANSPORT";
/// Environment variable for the MQTT broker URL.
pub const ENV_MQTT_BROKER: &str = "WOT_MQTT_BROKER";

/// What the observation loop does with a successful response that does not
/// normalize to a power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidPayloadPolicy {
    /// Leave state and status untouched and poll again immediately.
    #[default]
    Ignore,
    /// Record the error and back off, as for a transport failure.
    Report,
}

/// Configuration for the HTTP long-poll transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    base_url: String,
    timeout: Duration,
}

impl HttpConfig {
    /// Default base URL of the WoT host.
    pub const DEFAULT_BASE_URL: &str = "http://localhost:5555";
    /// Default timeout for reads and writes.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the timeout for reads and writes.
    ///
    /// Long-poll requests are not affected.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the read/write timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_URL)
    }
}

/// Configuration for the MQTT push-channel transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    broker_url: String,
    client_id: Option<String>,
    keep_alive: Duration,
    read_timeout: Duration,
}

impl MqttConfig {
    /// Default broker URL.
    pub const DEFAULT_BROKER_URL: &str = "mqtt://localhost:1883";
    /// Default keep-alive interval.
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
    /// Default time to wait for the retained state on the initial read.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for the given broker URL.
    #[must_use]
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            client_id: None,
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }

    /// Sets a custom client ID.
    #[must_use]
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets how long the initial read waits for the retained state.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Returns the broker URL.
    #[must_use]
    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    /// Returns the custom client ID, if set.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the initial read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BROKER_URL)
    }
}

/// Transport selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// WoT HTTP property protocol with long-poll observation.
    Http(HttpConfig),
    /// Push channel over MQTT.
    Mqtt(MqttConfig),
}

impl TransportConfig {
    /// Returns the short name of the transport.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Mqtt(_) => "mqtt",
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Http(HttpConfig::default())
    }
}

/// Configuration for a [`PropertyObserver`](crate::PropertyObserver).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wot_lamp::{InvalidPayloadPolicy, ObserverConfig};
///
/// // Defaults: http://localhost:5555, thing "lamp", 800 ms backoff
/// let config = ObserverConfig::default();
/// assert_eq!(config.thing(), "lamp");
///
/// let config = ObserverConfig::http("http://192.168.1.20:5555")
///     .with_thing("desk-lamp")
///     .with_backoff(Duration::from_secs(2))
///     .with_invalid_payload_policy(InvalidPayloadPolicy::Report);
/// assert_eq!(config.backoff(), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverConfig {
    thing: String,
    backoff: Duration,
    invalid_payload_policy: InvalidPayloadPolicy,
    transport: TransportConfig,
}

impl ObserverConfig {
    /// Default thing identifier.
    pub const DEFAULT_THING: &str = "lamp";
    /// Default delay between a failed observation and the next attempt.
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(800);

    /// Creates a configuration using the HTTP transport.
    #[must_use]
    pub fn http(base_url: impl Into<String>) -> Self {
        Self::with_transport_config(TransportConfig::Http(HttpConfig::new(base_url)))
    }

    /// Creates a configuration using the MQTT transport.
    #[must_use]
    pub fn mqtt(broker_url: impl Into<String>) -> Self {
        Self::with_transport_config(TransportConfig::Mqtt(MqttConfig::new(broker_url)))
    }

    fn with_transport_config(transport: TransportConfig) -> Self {
        Self {
            thing: Self::DEFAULT_THING.to_string(),
            backoff: Self::DEFAULT_BACKOFF,
            invalid_payload_policy: InvalidPayloadPolicy::default(),
            transport,
        }
    }

    /// Loads the configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    ///
    /// Recognizes [`ENV_BASE_URL`], [`ENV_THING`], [`ENV_BACKOFF_MS`],
    /// [`ENV_TRANSPORT`] and [`ENV_MQTT_BROKER`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport = match lookup(ENV_TRANSPORT).as_deref().map(str::trim) {
            None | Some("" | "http") => TransportConfig::Http(HttpConfig::new(
                lookup(ENV_BASE_URL).unwrap_or_else(|| HttpConfig::DEFAULT_BASE_URL.to_string()),
            )),
            Some("mqtt") => TransportConfig::Mqtt(MqttConfig::new(
                lookup(ENV_MQTT_BROKER)
                    .unwrap_or_else(|| MqttConfig::DEFAULT_BROKER_URL.to_string()),
            )),
            Some(other) => return Err(ConfigError::UnknownTransport(other.to_string())),
        };

        let mut config = Self::with_transport_config(transport);

        if let Some(thing) = lookup(ENV_THING) {
            if thing.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_THING.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            config.thing = thing.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_BACKOFF_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: ENV_BACKOFF_MS.to_string(),
                    message: e.to_string(),
                })?;
            config.backoff = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Sets the thing identifier.
    #[must_use]
    pub fn with_thing(mut self, thing: impl Into<String>) -> Self {
        self.thing = thing.into();
        self
    }

    /// Sets the fixed backoff interval.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the policy for non-normalizable successful responses.
    #[must_use]
    pub fn with_invalid_payload_policy(mut self, policy: InvalidPayloadPolicy) -> Self {
        self.invalid_payload_policy = policy;
        self
    }

    /// Replaces the transport configuration.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Returns the thing identifier.
    #[must_use]
    pub fn thing(&self) -> &str {
        &self.thing
    }

    /// Returns the backoff interval.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Returns the invalid payload policy.
    #[must_use]
    pub fn invalid_payload_policy(&self) -> InvalidPayloadPolicy {
        self.invalid_payload_policy
    }

    /// Returns the transport configuration.
    #[must_use]
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self::with_transport_config(TransportConfig::default())
    }
}
