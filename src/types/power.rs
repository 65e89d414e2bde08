// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power state of the observed lamp.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ValueError;

/// Represents the power state of the lamp.
///
/// `Unknown` is the value before any successful read. Only `On` and `Off`
/// ever come out of payload normalization or go over the wire.
///
/// # Examples
///
/// ```
/// use wot_lamp::types::PowerState;
///
/// assert_eq!(PowerState::On.as_str(), "on");
/// assert_eq!(PowerState::Off.as_str(), "off");
/// assert_eq!(PowerState::default(), PowerState::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    /// Power is on.
    On,
    /// Power is off.
    Off,
    /// No value has been read yet.
    #[default]
    Unknown,
}

impl PowerState {
    /// Returns the canonical lowercase token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `true` if the state is `On`.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Returns `true` for `On` and `Off`.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns the state a toggle should request.
    ///
    /// `Unknown` is treated as not-on and toggles to `On`.
    #[must_use]
    pub const fn toggled(&self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off | Self::Unknown => Self::On,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses an exact canonical token (case-insensitive).
///
/// This is stricter than [`normalize`](crate::payload::normalize): quotes and
/// surrounding whitespace are not stripped, and `unknown` is rejected.
impl FromStr for PowerState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("on") {
            Ok(Self::On)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(Self::Off)
        } else {
            Err(ValueError::InvalidPowerState(s.to_string()))
        }
    }
}
