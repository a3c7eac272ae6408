//! Dry-run GPIO backend that only tracks and logs levels

use super::{Gpio, OutputLevel};
use crate::relay::PinId;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SimulatedGpioError {
    #[error("Pin {0} was written before being configured as an output")]
    NotConfigured(PinId),
}

/// GPIO stand-in for development machines without a relay board
#[derive(Debug, Default)]
pub struct SimulatedGpio {
    levels: BTreeMap<PinId, OutputLevel>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated level of a line, if configured
    pub fn level(&self, pin: PinId) -> Option<OutputLevel> {
        self.levels.get(&pin).copied()
    }
}

impl Gpio for SimulatedGpio {
    type Error = SimulatedGpioError;

    fn configure_output(&mut self, pin: PinId) -> Result<(), Self::Error> {
        self.levels.entry(pin).or_insert(OutputLevel::Low);
        Ok(())
    }

    fn write(&mut self, pin: PinId, level: OutputLevel) -> Result<(), Self::Error> {
        let slot = self
            .levels
            .get_mut(&pin)
            .ok_or(SimulatedGpioError::NotConfigured(pin))?;
        *slot = level;
        info!(pin = %pin, level = %level, "[dry-run] GPIO write");
        Ok(())
    }

    fn release(&mut self) {
        self.levels.clear();
        info!("[dry-run] GPIO released");
    }
}
