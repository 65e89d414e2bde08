// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property observation.
//!
//! A [`PropertyObserver`] runs at most one observation session at a time.
//! Each session walks through these phases:
//!
//! ```text
//! Idle ──connect──▶ Connecting ──▶ Polling ◀──▶ Backoff
//!  ▲                    │             │            │
//!  └────────────────────┴─disconnect──┴────────────┘
//! ```
//!
//! - **Connecting**: one read; its failure is recorded but does not stop the
//!   session.
//! - **Polling**: one observe request; a normalized value is published and
//!   the next request starts immediately.
//! - **Backoff**: after a failure, a fixed wait before polling again.
//!
//! Both waits are raced against the session's cancellation token, so
//! [`disconnect`](PropertyObserver::disconnect) never blocks on network I/O.

mod observer_config;
mod property_observer;
mod session;

pub use observer_config::{
    ENV_BACKOFF_MS, ENV_BASE_URL, ENV_MQTT_BROKER, ENV_THING, ENV_TRANSPORT, HttpConfig,
    InvalidPayloadPolicy, MqttConfig, ObserverConfig, TransportConfig,
};
pub use property_observer::PropertyObserver;
pub use session::ObserverPhase;
