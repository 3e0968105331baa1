//! Fixed-interval timer for periodic tasks

use crate::hardware::Millis;

#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    interval_ms: u64,
    next_due: Millis,
}

impl Ticker {
    /// First fire one full interval after `now`
    pub fn new(interval_ms: u64, now: Millis) -> Self {
        Self {
            interval_ms,
            next_due: now.after(interval_ms),
        }
    }

    /// True once per elapsed interval. After a long stall it fires once and realigns instead
    /// of catching up with a burst.
    pub fn poll(&mut self, now: Millis) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = self.next_due.after(self.interval_ms);
        if self.next_due <= now {
            self.next_due = now.after(self.interval_ms);
        }
        true
    }
}
