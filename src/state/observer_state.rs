// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer state snapshot.

use serde::Serialize;

use crate::types::PowerState;

use super::StateChange;

/// Connection status derived from the last operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Initial or transitional: nothing has succeeded or failed yet.
    Connecting,
    /// The last operation succeeded.
    Connected,
    /// The last operation failed and an error message is recorded.
    Error,
}

impl ConnectionStatus {
    /// Returns the lowercase name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State published by a [`PropertyObserver`](crate::PropertyObserver).
///
/// A recorded error always implies the observer is not connected, and the
/// power state only leaves `Unknown` through a successfully normalized
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserverState {
    power: PowerState,
    connected: bool,
    last_error: Option<String>,
}

impl ObserverState {
    /// Creates the initial state: power unknown, connecting, no error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last published power state.
    #[must_use]
    pub fn power(&self) -> PowerState {
        self.power
    }

    /// Returns `true` if the published power state is `On`.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.power.is_on()
    }

    /// Returns `true` if the last operation succeeded.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns the last recorded error message.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Derives the connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        if self.connected {
            ConnectionStatus::Connected
        } else if self.last_error.is_some() {
            ConnectionStatus::Error
        } else {
            ConnectionStatus::Connecting
        }
    }

    /// Applies a state change.
    ///
    /// Returns `true` if anything observable changed.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        let before = self.clone();

        match change {
            StateChange::Received(power) => {
                // Unknown is never published after construction.
                if power.is_known() {
                    self.power = *power;
                    self.connected = true;
                    self.last_error = None;
                }
            }
            StateChange::Failed(message) => {
                self.connected = false;
                self.last_error = Some(message.clone());
            }
            StateChange::Restarted => {
                self.connected = false;
                self.last_error = None;
            }
        }

        *self != before
    }
}
