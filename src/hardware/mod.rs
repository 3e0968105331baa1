//! Hardware seams
//!
//! The core only talks to the outside world through the traits in this module. Real
//! implementations live in [`gpio`] (Raspberry Pi pins via `rppal`) and [`system`]
//! (monotonic clock and process restart); tests substitute in-memory fakes.
//!
//! ```text
//! Actuator ──► DigitalOutput (relay, LED)
//! Debouncer ──► DigitalInput (button)
//! everything ──► Clock
//! ```

pub mod gpio;
pub mod system;

pub use rppal::gpio::Level;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// Milliseconds on a monotonic clock starting at boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Millis(pub u64);

impl Millis {
    /// Time elapsed since `earlier`, zero if `earlier` lies in the future
    pub fn since(self, earlier: Millis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn after(self, ms: u64) -> Millis {
        Millis(self.0.saturating_add(ms))
    }
}

pub trait Clock {
    fn now(&self) -> Millis;

    /// Blocks the loop for `ms` milliseconds
    fn delay(&self, ms: u64);
}

pub trait DigitalOutput {
    fn set_level(&mut self, level: Level);

    /// Level currently driven on the line, read back from the pin
    fn level(&self) -> Level;
}

pub trait DigitalInput {
    fn level(&self) -> Level;
}
