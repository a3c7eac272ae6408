//! Raspberry Pi GPIO backend built on rppal

use super::{Gpio, OutputLevel};
use crate::relay::PinId;
use rppal::gpio::{Gpio as RpiGpio, OutputPin};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RppalGpioError {
    #[error("GPIO peripheral unavailable")]
    Unavailable(#[source] rppal::gpio::Error),
    #[error("Failed to acquire pin {pin}")]
    PinUnavailable {
        pin: PinId,
        #[source]
        source: rppal::gpio::Error,
    },
    #[error("Pin {0} was written before being configured as an output")]
    NotConfigured(PinId),
}

/// Output pins held through `/dev/gpiomem`
pub struct RppalGpio {
    gpio: RpiGpio,
    outputs: HashMap<PinId, OutputPin>,
}

impl RppalGpio {
    /// Open the GPIO peripheral. Fails off-target or without permissions.
    pub fn new() -> Result<Self, RppalGpioError> {
        let gpio = RpiGpio::new().map_err(RppalGpioError::Unavailable)?;
        info!("Opened Raspberry Pi GPIO peripheral");
        Ok(Self {
            gpio,
            outputs: HashMap::new(),
        })
    }
}

impl Gpio for RppalGpio {
    type Error = RppalGpioError;

    fn configure_output(&mut self, pin: PinId) -> Result<(), Self::Error> {
        if self.outputs.contains_key(&pin) {
            return Ok(());
        }

        let output = self
            .gpio
            .get(pin.get())
            .map_err(|source| RppalGpioError::PinUnavailable { pin, source })?
            .into_output_low();

        debug!(pin = %pin, "Configured pin as output");
        self.outputs.insert(pin, output);
        Ok(())
    }

    fn write(&mut self, pin: PinId, level: OutputLevel) -> Result<(), Self::Error> {
        let output = self
            .outputs
            .get_mut(&pin)
            .ok_or(RppalGpioError::NotConfigured(pin))?;

        match level {
            OutputLevel::High => output.set_high(),
            OutputLevel::Low => output.set_low(),
        }
        Ok(())
    }

    fn release(&mut self) {
        // OutputPin restores the line's original mode when dropped
        let released = self.outputs.len();
        self.outputs.clear();
        info!(released, "GPIO cleanup complete");
    }
}
