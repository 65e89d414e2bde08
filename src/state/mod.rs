// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Published observer state.
//!
//! [`ObserverState`] is the snapshot the UI reads. It is only ever modified by
//! applying a [`StateChange`], which keeps the power state and the connection
//! flags consistent with each other.
//!
//! # Examples
//!
//! ```
//! use wot_lamp::state::{ConnectionStatus, ObserverState, StateChange};
//! use wot_lamp::types::PowerState;
//!
//! let mut state = ObserverState::new();
//! assert_eq!(state.status(), ConnectionStatus::Connecting);
//!
//! state.apply(&StateChange::Received(PowerState::On));
//! assert!(state.is_on());
//! assert_eq!(state.status(), ConnectionStatus::Connected);
//! ```

mod observer_state;
mod state_change;

pub use observer_state::{ConnectionStatus, ObserverState};
pub use state_change::StateChange;
