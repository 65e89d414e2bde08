// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw payloads and their normalization to a [`PowerState`].
//!
//! The remote resource has produced several encodings of the same value
//! across protocol revisions:
//!
//! - a bare token: `on`
//! - a JSON-quoted string: `"on"`
//! - an envelope keyed `powerState`: `{"powerState":"on"}`
//! - an envelope keyed `value`: `{"value":"on"}`
//!
//! [`normalize`] maps all of these to [`PowerState::On`] or
//! [`PowerState::Off`] and rejects everything else.
//!
//! # Examples
//!
//! ```
//! use wot_lamp::payload::{RawPayload, normalize};
//! use wot_lamp::types::PowerState;
//!
//! assert_eq!(normalize(&RawPayload::text(" \"OFF\" ")), Ok(PowerState::Off));
//! assert_eq!(
//!     normalize(&RawPayload::Json(serde_json::json!({"powerState": "on"}))),
//!     Ok(PowerState::On)
//! );
//! assert!(normalize(&RawPayload::text("bogus")).is_err());
//! ```

use serde_json::Value;

use crate::error::PayloadError;
use crate::types::PowerState;

/// Field names that may carry the value inside an object, in priority order.
const VALUE_FIELDS: [&str; 2] = ["powerState", "value"];

/// Untyped data delivered by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// Nothing was delivered.
    Absent,
    /// A text body.
    Text(String),
    /// A parsed JSON document.
    Json(Value),
}

impl RawPayload {
    /// Creates a text payload.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }

    /// Builds a payload from a response body and its content type.
    ///
    /// `application/json` bodies (including `+json` suffixes) are parsed as
    /// JSON. A JSON body that fails to parse is kept as text so that a bare
    /// token served with the wrong content type still normalizes.
    #[must_use]
    pub fn from_body(content_type: Option<&str>, body: String) -> Self {
        if body.is_empty() {
            return Self::Absent;
        }

        if content_type.is_some_and(is_json_content_type) {
            match serde_json::from_str::<Value>(&body) {
                Ok(value) => return Self::Json(value),
                Err(e) => {
                    tracing::debug!(error = %e, "JSON body did not parse, keeping as text");
                }
            }
        }

        Self::Text(body)
    }

    /// Builds a payload from bytes that are expected to be JSON.
    ///
    /// Used for push channels, which carry no content type. Non-JSON UTF-8
    /// falls back to text; invalid UTF-8 is treated as absent.
    #[must_use]
    pub fn from_json_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::Absent;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::Json(value),
            Err(_) => match std::str::from_utf8(bytes) {
                Ok(text) => Self::Text(text.to_string()),
                Err(_) => Self::Absent,
            },
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

/// Normalizes a raw payload to `On` or `Off`.
///
/// Never returns `Ok(PowerState::Unknown)`.
///
/// # Errors
///
/// Returns a [`PayloadError`] describing why the payload is invalid.
pub fn normalize(raw: &RawPayload) -> Result<PowerState, PayloadError> {
    match raw {
        RawPayload::Absent => Err(PayloadError::Empty),
        RawPayload::Text(text) => normalize_token(text),
        RawPayload::Json(value) => normalize_value(value),
    }
}

fn normalize_value(value: &Value) -> Result<PowerState, PayloadError> {
    match value {
        Value::Null => Err(PayloadError::Empty),
        Value::String(text) => normalize_token(text),
        Value::Object(map) => {
            let candidate = VALUE_FIELDS
                .iter()
                .find_map(|field| map.get(*field))
                .ok_or(PayloadError::MissingField)?;
            match candidate {
                Value::String(text) => normalize_token(text),
                _ => Err(PayloadError::NotAString),
            }
        }
        Value::Bool(_) => Err(PayloadError::UnsupportedShape("boolean")),
        Value::Number(_) => Err(PayloadError::UnsupportedShape("number")),
        Value::Array(_) => Err(PayloadError::UnsupportedShape("array")),
    }
}

fn normalize_token(text: &str) -> Result<PowerState, PayloadError> {
    let token = text.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());
    if token.is_empty() {
        return Err(PayloadError::Empty);
    }

    match token.to_lowercase().as_str() {
        "on" => Ok(PowerState::On),
        "off" => Ok(PowerState::Off),
        _ => Err(PayloadError::UnrecognizedToken(token.to_string())),
    }
}
