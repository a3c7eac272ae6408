//! Output controller: the only component that touches GPIO
//!
//! Every configured line is always in a known state: `initialize()` drives
//! all of them low, `set()` issues exactly one write per call, and
//! `reset_all()` forces everything off without ever failing. The relay state
//! is never cached; each `set` writes the requested level so a hardware reset
//! cannot desynchronise us.
//!
//! The controller owns the GPIO driver for the lifetime of the process.
//! [`OutputController::shutdown`] resets and releases it, and `Drop` runs the
//! same path if shutdown was skipped (e.g. while unwinding from a panic).

use super::map::{PinId, RelayId, RelayMap};
use super::RelayState;
use crate::gpio::{Gpio, OutputLevel};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Unknown relay: {0}")]
    UnknownRelay(RelayId),
    #[error("GPIO operation failed on pin {pin}")]
    Gpio {
        pin: PinId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("GPIO has already been released")]
    Released,
}

impl RelayError {
    fn gpio<E>(pin: PinId, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Gpio {
            pin,
            source: Box::new(source),
        }
    }
}

pub struct OutputController<G: Gpio> {
    relays: RelayMap,
    gpio: G,
    released: bool,
}

impl<G: Gpio> OutputController<G> {
    pub fn new(relays: RelayMap, gpio: G) -> Self {
        Self {
            relays,
            gpio,
            released: false,
        }
    }

    pub fn relay_map(&self) -> &RelayMap {
        &self.relays
    }

    /// Configure every mapped line as an output and drive it low
    ///
    /// Safe to call again; an already-low line simply stays low.
    pub fn initialize(&mut self) -> Result<(), RelayError> {
        if self.released {
            return Err(RelayError::Released);
        }

        for pin in self.relays.pins().collect::<Vec<_>>() {
            self.gpio
                .configure_output(pin)
                .map_err(|e| RelayError::gpio(pin, e))?;
            self.gpio
                .write(pin, OutputLevel::Low)
                .map_err(|e| RelayError::gpio(pin, e))?;
        }

        info!(
            relays = self.relays.len(),
            "GPIO setup complete, all pins initialized to LOW"
        );
        Ok(())
    }

    /// Drive one relay to the desired state
    ///
    /// Unknown relays are reported and leave the hardware untouched.
    pub fn set(&mut self, relay: RelayId, state: RelayState) -> Result<(), RelayError> {
        if self.released {
            return Err(RelayError::Released);
        }

        let Some(pin) = self.relays.physical_output_for(relay) else {
            warn!(relay = %relay, "Unknown relay, no output changed");
            return Err(RelayError::UnknownRelay(relay));
        };

        let level = state.level();
        self.gpio
            .write(pin, level)
            .map_err(|e| RelayError::gpio(pin, e))?;

        info!(relay = %relay, pin = %pin, level = %level, "Pin {} set to {}", pin, level);
        Ok(())
    }

    /// Force every mapped line low
    ///
    /// Never fails: lines that cannot be written are logged and skipped so
    /// the remaining ones still reach the safe state. Returns the number of
    /// lines confirmed low.
    pub fn reset_all(&mut self) -> usize {
        if self.released {
            warn!("reset_all called after GPIO release, nothing to do");
            return 0;
        }

        let mut confirmed = 0;
        for (relay, pin) in self.relays.iter().collect::<Vec<_>>() {
            // Configuring first covers an initialize() that failed part-way
            if let Err(e) = self.gpio.configure_output(pin) {
                error!(relay = %relay, pin = %pin, "Failed to configure pin during reset: {}", e);
                continue;
            }
            match self.gpio.write(pin, OutputLevel::Low) {
                Ok(()) => confirmed += 1,
                Err(e) => {
                    error!(relay = %relay, pin = %pin, "Failed to reset pin: {}", e);
                }
            }
        }

        info!(
            confirmed,
            total = self.relays.len(),
            "All relays reset to off"
        );
        confirmed
    }

    /// Reset all outputs and release the driver. Idempotent.
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.reset_all();
        self.gpio.release();
        self.released = true;
    }
}

impl<G: Gpio> Drop for OutputController<G> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Output controller dropped without explicit shutdown, resetting relays");
            self.shutdown();
        }
    }
}
