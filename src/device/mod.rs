//! Physical side of the switch: the relay with its status LED, and the push button.

pub mod actuator;
pub mod button;
