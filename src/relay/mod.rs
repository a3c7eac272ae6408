//! Relay addressing and output control
//!
//! - [`map`] - static relay number → GPIO line bijection
//! - [`controller`] - safe, idempotent on/off control over a [`crate::gpio::Gpio`] driver

pub mod controller;
pub mod map;

pub use controller::{OutputController, RelayError};
pub use map::{PinId, RelayId, RelayMap, RelayMapError};

use crate::gpio::OutputLevel;
use std::fmt;

/// Desired state of a relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    /// Parse `on`/`off`, ignoring ASCII case
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("on") {
            Some(RelayState::On)
        } else if raw.eq_ignore_ascii_case("off") {
            Some(RelayState::Off)
        } else {
            None
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, RelayState::On)
    }

    pub fn level(self) -> OutputLevel {
        OutputLevel::from_on(self.is_on())
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::On => write!(f, "on"),
            RelayState::Off => write!(f, "off"),
        }
    }
}
