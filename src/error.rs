use thiserror::Error;

use crate::config::ConfigError;
use crate::hardware::HardwareError;

/// Failures that keep the switch from starting its control loop
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("control loop task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
