//! Host clock and process restart

use std::os::unix::process::CommandExt;
use std::process::Command;
use std::time::{Duration, Instant};

use tracing::warn;

use super::{Clock, Millis};

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        Millis(self.boot.elapsed().as_millis() as u64)
    }

    fn delay(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Cold-starts the process by replacing the current image with a fresh copy of itself.
///
/// Only returns when `exec` failed.
pub fn restart_process() -> std::io::Error {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => return e,
    };
    warn!("Re-executing {}", exe.display());
    Command::new(exe)
        .args(std::env::args_os().skip(1))
        .exec()
}
