// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for the WoT property protocol.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};

use crate::error::TransportError;
use crate::observer::HttpConfig;
use crate::payload::RawPayload;
use crate::protocol::{POWER_STATE_PROPERTY, Transport};
use crate::types::PowerState;

/// HTTP transport for a single WoT thing.
///
/// Uses these endpoints, relative to `{base_url}/{thing}`:
///
/// - `GET /properties/powerState` to read
/// - `GET /properties/powerState/observable` to long-poll for changes
/// - `PUT /properties/powerState` to write
///
/// The request timeout applies to reads and writes only. Long-poll requests
/// are held open by the server and end only on response or cancellation.
///
/// # Examples
///
/// ```
/// use wot_lamp::HttpConfig;
/// use wot_lamp::protocol::HttpTransport;
///
/// let transport = HttpTransport::new(&HttpConfig::default(), "lamp").unwrap();
/// assert_eq!(
///     transport.property_url(),
///     "http://localhost:5555/lamp/properties/powerState"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    property_url: String,
    observe_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport for `thing` on the host described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is not an `http(s)://` URL or the HTTP
    /// client cannot be created.
    pub fn new(config: &HttpConfig, thing: &str) -> Result<Self, TransportError> {
        let base_url = config.base_url().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TransportError::InvalidAddress(format!(
                "base URL must start with http:// or https://: {base_url}"
            )));
        }
        if thing.is_empty() {
            return Err(TransportError::InvalidAddress(
                "thing identifier is required".to_string(),
            ));
        }

        let property_url = format!(
            "{base_url}/{}/properties/{POWER_STATE_PROPERTY}",
            urlencoding::encode(thing)
        );
        let observe_url = format!("{property_url}/observable");

        // No client-wide timeout: it would cut long-poll requests short.
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            property_url,
            observe_url,
            timeout: config.timeout(),
        })
    }

    /// Returns the URL used for reads and writes.
    #[must_use]
    pub fn property_url(&self) -> &str {
        &self.property_url
    }

    /// Returns the long-poll URL.
    #[must_use]
    pub fn observe_url(&self) -> &str {
        &self.observe_url
    }

    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<RawPayload, TransportError> {
        tracing::debug!(url = %url, "Sending HTTP GET");

        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let response = check_status(response)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        tracing::debug!(body = %body, content_type = ?content_type, "Received HTTP response");

        Ok(RawPayload::from_body(content_type.as_deref(), body))
    }

    fn map_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            // Safe: configured timeouts are seconds, far below u64::MAX milliseconds
            #[allow(clippy::cast_possible_truncation)]
            let timeout_ms = self.timeout.as_millis() as u64;
            TransportError::Timeout(timeout_ms)
        } else {
            TransportError::Http(error)
        }
    }
}

fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        })
    }
}

impl Transport for HttpTransport {
    async fn read(&self) -> Result<RawPayload, TransportError> {
        self.get(&self.property_url, Some(self.timeout)).await
    }

    async fn observe(&self) -> Result<RawPayload, TransportError> {
        self.get(&self.observe_url, None).await
    }

    async fn write(&self, state: PowerState) -> Result<(), TransportError> {
        tracing::debug!(url = %self.property_url, state = %state, "Sending HTTP PUT");

        // `json` sets `Content-Type: application/json` and encodes the token
        // as a JSON string, e.g. `"on"`.
        let response = self
            .client
            .put(&self.property_url)
            .timeout(self.timeout)
            .json(state.as_str())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        check_status(response).map(|_| ())
    }
}
