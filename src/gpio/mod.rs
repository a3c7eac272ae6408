//! GPIO collaborator abstraction
//!
//! The output controller only ever configures lines as outputs, writes a
//! level, and releases everything at shutdown. This trait is the seam that
//! lets the controller run against real hardware, a dry-run logger, or a
//! recording mock in tests.

use crate::relay::PinId;
use std::fmt;

pub mod raspberry_pi;
pub mod simulated;

pub use raspberry_pi::RppalGpio;
pub use simulated::SimulatedGpio;

/// Electrical level written to an output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLevel {
    Low,
    High,
}

impl OutputLevel {
    /// Relays are wired active-high: on drives the line high
    pub fn from_on(on: bool) -> Self {
        if on {
            OutputLevel::High
        } else {
            OutputLevel::Low
        }
    }
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLevel::Low => write!(f, "LOW"),
            OutputLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Digital output driver
///
/// Writes must be idempotent: writing the same level twice is not an error.
pub trait Gpio: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Configure a line as a digital output
    fn configure_output(&mut self, pin: PinId) -> Result<(), Self::Error>;

    /// Drive a configured line to the given level
    fn write(&mut self, pin: PinId, level: OutputLevel) -> Result<(), Self::Error>;

    /// Release every line acquired by this driver. Called once at shutdown.
    fn release(&mut self);
}
