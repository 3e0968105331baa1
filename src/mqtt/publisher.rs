//! Periodic status announcement

use tracing::debug;

use super::broker::BrokerSession;
use crate::controller::scheduler::Ticker;
use crate::device::actuator::Actuator;
use crate::hardware::Millis;

pub struct StatusPublisher {
    ticker: Ticker,
}

impl StatusPublisher {
    pub fn new(interval_ms: u64, now: Millis) -> Self {
        Self {
            ticker: Ticker::new(interval_ms, now),
        }
    }

    /// Scheduled-task service: fires [`Self::on_tick`] whenever the interval has elapsed
    pub fn service(&mut self, now: Millis, actuator: &Actuator, broker: &mut dyn BrokerSession) {
        if self.ticker.poll(now) {
            self.on_tick(actuator, broker);
        }
    }

    /// Publishes the state retained when a session is open. A missed tick is not retried;
    /// the next one will try again.
    pub fn on_tick(&self, actuator: &Actuator, broker: &mut dyn BrokerSession) {
        if broker.is_connected() {
            actuator.announce(broker);
        } else {
            debug!("Status tick skipped, broker offline");
        }
    }
}
