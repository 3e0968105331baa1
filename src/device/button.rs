//! Button debouncing and press classification
//!
//! The raw input is sampled once per tick. A raw change only restarts the debounce timer;
//! the stable reading follows once the raw level has held for the debounce window.
//!
//! ```text
//!            raw held >= window               raw held >= window
//! Released ─────────────────────► Pressed ──────────────────────► Released
//!                               (press start)                   (gesture emitted)
//! ```
//!
//! Actions only fire on release, classified by how long the button was held.

use chrono::Local;
use tracing::{debug, info};

use crate::hardware::{DigitalInput, Level, Millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

impl ButtonState {
    /// The input has a pull-up, so a pressed button pulls the line low
    fn from_level(level: Level) -> Self {
        match level {
            Level::Low => ButtonState::Pressed,
            Level::High => ButtonState::Released,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressThresholds {
    pub short_ms: u64,
    pub medium_ms: u64,
    pub long_ms: u64,
}

impl Default for PressThresholds {
    fn default() -> Self {
        Self {
            short_ms: 1000,
            medium_ms: 5000,
            long_ms: 60000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressKind {
    Short,
    Medium,
    Long,
    VeryLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    ToggleRelay,
    Restart(PressKind),
}

impl PressKind {
    /// Every hold longer than a short press restarts the device. The tiers stay apart so
    /// they can get their own behaviour later.
    pub fn action(self) -> GestureAction {
        match self {
            PressKind::Short => GestureAction::ToggleRelay,
            other => GestureAction::Restart(other),
        }
    }
}

/// A completed press-release cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressGesture {
    pub duration_ms: u64,
}

impl PressGesture {
    pub fn classify(&self, thresholds: &PressThresholds) -> PressKind {
        match self.duration_ms {
            d if d < thresholds.short_ms => PressKind::Short,
            d if d < thresholds.medium_ms => PressKind::Medium,
            d if d < thresholds.long_ms => PressKind::Long,
            _ => PressKind::VeryLong,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ButtonDebounceState {
    raw_last: ButtonState,
    stable: ButtonState,
    last_change: Millis,
    press_start: Millis,
}

pub struct ButtonDebouncer {
    input: Box<dyn DigitalInput>,
    debounce_ms: u64,
    state: ButtonDebounceState,
}

impl ButtonDebouncer {
    /// The button is assumed released at boot; a button held during boot is reported as a
    /// press once it has been stable for the window.
    pub fn new(input: Box<dyn DigitalInput>, debounce_ms: u64, now: Millis) -> Self {
        Self {
            input,
            debounce_ms,
            state: ButtonDebounceState {
                raw_last: ButtonState::Released,
                stable: ButtonState::Released,
                last_change: now,
                press_start: now,
            },
        }
    }

    #[cfg(test)]
    pub fn stable_state(&self) -> ButtonState {
        self.state.stable
    }

    /// Takes one sample; returns the gesture when this sample completes a release
    pub fn sample(&mut self, now: Millis) -> Option<PressGesture> {
        let raw = ButtonState::from_level(self.input.level());
        let state = &mut self.state;

        if raw != state.raw_last {
            state.raw_last = raw;
            state.last_change = now;
        }

        if now.since(state.last_change) < self.debounce_ms || raw == state.stable {
            return None;
        }

        state.stable = raw;
        match raw {
            ButtonState::Pressed => {
                state.press_start = now;
                debug!("Button pressed at {}", Local::now().format("%H:%M:%S.%3f"));
                None
            }
            ButtonState::Released => {
                let gesture = PressGesture {
                    duration_ms: now.since(state.press_start),
                };
                info!(
                    "Button released at {} after {}ms",
                    Local::now().format("%H:%M:%S.%3f"),
                    gesture.duration_ms
                );
                Some(gesture)
            }
        }
    }
}
