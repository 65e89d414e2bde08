// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `wot_lamp` library.
//!
//! None of these errors is fatal to the observer: the initial read and the
//! observation loop record them as a human-readable message on the published
//! state and keep going. Only the caller-driven operations
//! ([`read_initial`](crate::PropertyObserver::read_initial) and
//! [`request_write`](crate::PropertyObserver::request_write)) return them.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading the property failed at the transport layer.
    #[error("read failed: {0}")]
    Read(TransportError),

    /// The remote answered with a body that does not normalize to a power state.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    /// Observing the property failed at the transport layer.
    #[error("observation failed: {0}")]
    Observe(TransportError),

    /// Writing the property failed or was rejected by the remote.
    #[error("write failed: {0}")]
    Write(TransportError),

    /// A value was rejected before anything was sent.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to the transport (HTTP or MQTT).
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT connection or communication failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The remote answered with a non-success status.
    #[error("HTTP {code} - {reason}")]
    Status {
        /// The HTTP status code.
        code: u16,
        /// The canonical reason phrase.
        reason: String,
    },

    /// Connection to the remote failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Reasons a payload could not be normalized to `on` or `off`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Nothing usable was received.
    #[error("payload is empty")]
    Empty,

    /// A string was received but is neither `on` nor `off`.
    #[error("unrecognized power state token: {0:?}")]
    UnrecognizedToken(String),

    /// An object was received without a `powerState` or `value` field.
    #[error("object has neither a powerState nor a value field")]
    MissingField,

    /// The `powerState`/`value` field is present but is not a string.
    #[error("power state field is not a string")]
    NotAString,

    /// The payload has a shape normalization does not accept.
    #[error("unsupported payload shape: {0}")]
    UnsupportedShape(&'static str),
}

/// Errors related to value validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// An invalid power state string was provided.
    #[error("invalid power state: {0}")]
    InvalidPowerState(String),

    /// `unknown` cannot be written to the remote property.
    #[error("only on or off can be written")]
    NotWritable,
}

/// Errors related to loading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The configuration key.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// The requested transport is unknown or not compiled in.
    #[error("unknown transport: {0}")]
    UnknownTransport(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = TransportError::Status {
            code: 503,
            reason: "Service Unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 - Service Unavailable");
    }

    #[test]
    fn read_error_includes_cause() {
        let err = Error::Read(TransportError::ConnectionFailed("refused".to_string()));
        assert_eq!(err.to_string(), "read failed: connection failed: refused");
    }

    #[test]
    fn error_from_payload_error() {
        let err: Error = PayloadError::Empty.into();
        assert!(matches!(err, Error::InvalidPayload(PayloadError::Empty)));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "WOT_BACKOFF_MS".to_string(),
            message: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for WOT_BACKOFF_MS: not a number"
        );
    }
}
