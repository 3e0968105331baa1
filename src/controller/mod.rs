//! Switch lifecycle
//!
//! ```text
//! controller/
//! ├── lifecycle.rs  - Booting ─► Running typestate and the cooperative tick loop
//! ├── scheduler.rs  - fixed-interval ticker for periodic tasks
//! └── update.rs     - firmware-update lifecycle hooks
//! ```
//!
//! The loop owns every component and calls each of them once per tick. The only way out,
//! apart from a shutdown signal, is a [`RestartReason`].

pub mod lifecycle;
pub mod scheduler;
pub mod update;

use std::fmt;

use crate::device::button::PressKind;

pub use lifecycle::{
    Booting, ControllerSettings, LifecycleState, Running, SwitchController, SwitchParts,
};

/// Why the device decided to cold-start itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    NetworkUnreachable,
    BrokerUnreachable,
    ButtonHeld(PressKind),
    UpdateInstalled,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RestartReason::NetworkUnreachable => write!(f, "network unreachable"),
            RestartReason::BrokerUnreachable => write!(f, "broker unreachable"),
            RestartReason::ButtonHeld(kind) => write!(f, "button held ({:?})", kind),
            RestartReason::UpdateInstalled => write!(f, "firmware update installed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Restart(RestartReason),
    Shutdown,
}
