// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! Every mutation of the published [`ObserverState`](super::ObserverState)
//! goes through one of these variants, applied by the session that currently
//! owns the observer.

use crate::types::PowerState;

/// Represents a change in observer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// A value was received and normalized.
    ///
    /// Sets the power state, marks the observer connected and clears any
    /// recorded error. `Unknown` is ignored.
    Received(PowerState),

    /// An operation failed with the given message.
    Failed(String),

    /// A new session started; connection flags return to connecting.
    Restarted,
}

impl StateChange {
    /// Creates a failure change from anything displayable.
    #[must_use]
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}
