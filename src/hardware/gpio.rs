//! Raspberry Pi GPIO backed by `rppal`

use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use tracing::info;

use super::{DigitalInput, DigitalOutput, HardwareError};
use crate::config::GpioConfig;

pub struct GpioOutput {
    pin: OutputPin,
}

impl DigitalOutput for GpioOutput {
    fn set_level(&mut self, level: Level) {
        self.pin.write(level);
    }

    fn level(&self) -> Level {
        if self.pin.is_set_high() {
            Level::High
        } else {
            Level::Low
        }
    }
}

pub struct GpioInput {
    pin: InputPin,
}

impl DigitalInput for GpioInput {
    fn level(&self) -> Level {
        self.pin.read()
    }
}

/// The three lines of the switch
pub struct Board {
    pub relay: GpioOutput,
    pub led: GpioOutput,
    pub button: GpioInput,
}

impl Board {
    /// Claims the configured pins. Relay starts low (open), the inverted LED starts high (dark)
    /// and the button gets its pull-up.
    pub fn open(config: &GpioConfig) -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;

        let mut relay = gpio.get(config.relay_pin)?.into_output_low();
        // keep the relay where it is when the process exits or re-executes
        relay.set_reset_on_drop(false);
        let led = gpio.get(config.led_pin)?.into_output_high();
        let button = gpio.get(config.button_pin)?.into_input_pullup();

        info!(
            "GPIO ready: relay=BCM{} led=BCM{} button=BCM{}",
            config.relay_pin, config.led_pin, config.button_pin
        );

        Ok(Self {
            relay: GpioOutput { pin: relay },
            led: GpioOutput { pin: led },
            button: GpioInput { pin: button },
        })
    }
}
