// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `wot_lamp` - Keep a lamp's power state in sync with a Web of Things thing.
//!
//! This library observes a single WoT property, `powerState`, on a single
//! thing and publishes it as a reactive value for a user interface.
//!
//! # Features
//!
//! - **Initial read** followed by **continuous observation** (HTTP long-poll
//!   or an MQTT push channel)
//! - **Payload normalization**: bare tokens, JSON strings and
//!   `{"powerState": ..}` / `{"value": ..}` envelopes all map to `on`/`off`
//! - **Connection status and last error** published alongside the value
//! - **Fixed-interval retry** that never gives up until disconnected
//! - **Cooperative cancellation**: `disconnect()` aborts the in-flight request
//!   and discards any late result
//!
//! # Quick Start
//!
//! ```no_run
//! use wot_lamp::{ObserverConfig, PowerState, PropertyObserver};
//!
//! #[tokio::main]
//! async fn main() -> wot_lamp::Result<()> {
//!     // http://localhost:5555/lamp by default
//!     let observer = PropertyObserver::from_config(ObserverConfig::from_env()?).await?;
//!     let mut state = observer.subscribe();
//!
//!     observer.connect();
//!
//!     // Writes are not applied locally; wait for the lamp to report back.
//!     observer.request_write(PowerState::On).await?;
//!     while state.changed().await.is_ok() {
//!         let current = state.borrow_and_update().clone();
//!         println!("{} ({})", current.power(), current.status());
//!         if current.is_on() {
//!             break;
//!         }
//!     }
//!
//!     observer.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Custom Transports
//!
//! Anything implementing [`Transport`](protocol::Transport) can be observed:
//!
//! ```ignore
//! let observer = PropertyObserver::new(MyTransport::new())
//!     .with_backoff(std::time::Duration::from_secs(1));
//! ```

pub mod error;
pub mod observer;
pub mod payload;
pub mod protocol;
pub mod state;
pub mod types;

pub use error::{ConfigError, Error, PayloadError, Result, TransportError, ValueError};
pub use observer::{
    HttpConfig, InvalidPayloadPolicy, MqttConfig, ObserverConfig, ObserverPhase, PropertyObserver,
    TransportConfig,
};
pub use payload::{RawPayload, normalize};
#[cfg(any(feature = "http", feature = "mqtt"))]
pub use protocol::AnyTransport;
pub use protocol::Transport;
pub use state::{ConnectionStatus, ObserverState, StateChange};
pub use types::PowerState;
