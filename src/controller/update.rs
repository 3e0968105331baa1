//! Firmware-update hooks
//!
//! Update delivery itself lives outside the switch. The delivery channel only reports its
//! lifecycle; the monitor logs it and asks for a restart once a new image is in place.

use std::fmt;

use tracing::{error, info};

use super::RestartReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFailure {
    Auth,
    Begin,
    Connect,
    Receive,
    End,
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            UpdateFailure::Auth => "authentication failed",
            UpdateFailure::Begin => "begin failed",
            UpdateFailure::Connect => "connect failed",
            UpdateFailure::Receive => "receive failed",
            UpdateFailure::End => "end failed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
    Started,
    Progress { done: u64, total: u64 },
    Finished,
    Failed(UpdateFailure),
}

pub trait UpdateChannel {
    /// Next pending lifecycle event, if any. Must not block.
    fn poll(&mut self) -> Option<UpdateEvent>;
}

/// Channel for builds without update delivery
pub struct NoUpdates;

impl UpdateChannel for NoUpdates {
    fn poll(&mut self) -> Option<UpdateEvent> {
        None
    }
}

#[derive(Debug, Default)]
pub struct UpdateMonitor {
    last_percent: Option<u64>,
}

impl UpdateMonitor {
    pub fn observe(&mut self, event: UpdateEvent) -> Option<RestartReason> {
        match event {
            UpdateEvent::Started => {
                info!("Firmware update started");
                self.last_percent = None;
                None
            }
            UpdateEvent::Progress { done, total } => {
                let percent = if total == 0 {
                    0
                } else {
                    // widened, `done * 100` does not fit u64 for large images
                    (u128::from(done.min(total)) * 100 / u128::from(total)) as u64
                };
                if self.last_percent != Some(percent) {
                    info!("Firmware update progress: {}%", percent);
                    self.last_percent = Some(percent);
                }
                None
            }
            UpdateEvent::Finished => {
                info!("Firmware update finished");
                self.last_percent = None;
                Some(RestartReason::UpdateInstalled)
            }
            UpdateEvent::Failed(failure) => {
                error!("Firmware update error: {}", failure);
                self.last_percent = None;
                None
            }
        }
    }

    #[cfg(test)]
    pub fn last_percent(&self) -> Option<u64> {
        self.last_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_tracked_in_whole_percent() {
        let mut monitor = UpdateMonitor::default();
        assert_eq!(monitor.observe(UpdateEvent::Started), None);
        monitor.observe(UpdateEvent::Progress { done: 512, total: 1024 });
        assert_eq!(monitor.last_percent(), Some(50));
        monitor.observe(UpdateEvent::Progress { done: 2048, total: 1024 });
        assert_eq!(monitor.last_percent(), Some(100));
    }

    #[test]
    fn huge_totals_do_not_overflow() {
        let mut monitor = UpdateMonitor::default();
        let total = u64::MAX - 3;
        monitor.observe(UpdateEvent::Progress {
            done: total / 4,
            total,
        });
        assert_eq!(monitor.last_percent(), Some(25));
        monitor.observe(UpdateEvent::Progress {
            done: u64::MAX,
            total: u64::MAX,
        });
        assert_eq!(monitor.last_percent(), Some(100));
    }

    #[test]
    fn zero_total_does_not_divide() {
        let mut monitor = UpdateMonitor::default();
        monitor.observe(UpdateEvent::Progress { done: 10, total: 0 });
        assert_eq!(monitor.last_percent(), Some(0));
    }

    #[test]
    fn finished_update_requests_restart() {
        let mut monitor = UpdateMonitor::default();
        assert_eq!(
            monitor.observe(UpdateEvent::Finished),
            Some(RestartReason::UpdateInstalled)
        );
    }

    #[test]
    fn failure_is_not_fatal() {
        let mut monitor = UpdateMonitor::default();
        monitor.observe(UpdateEvent::Progress { done: 1, total: 4 });
        assert_eq!(monitor.observe(UpdateEvent::Failed(UpdateFailure::Receive)), None);
        assert_eq!(monitor.last_percent(), None);
    }

    #[test]
    fn no_updates_channel_is_silent() {
        assert_eq!(NoUpdates.poll(), None);
    }
}
