//! Relay and status LED
//!
//! The relay pin is the single source of truth for [`ActuatorState`]; nothing caches it.
//! The LED mirrors the relay unless the connectivity supervisor is blinking it.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::hardware::{Clock, DigitalOutput, Level};
use crate::mqtt::broker::BrokerSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorState {
    Off,
    On,
}

impl ActuatorState {
    pub fn complement(self) -> Self {
        match self {
            ActuatorState::Off => ActuatorState::On,
            ActuatorState::On => ActuatorState::Off,
        }
    }

    /// Wire payload published on the response topic
    pub fn as_payload(self) -> &'static str {
        match self {
            ActuatorState::Off => "off",
            ActuatorState::On => "on",
        }
    }

    fn relay_level(self) -> Level {
        match self {
            ActuatorState::Off => Level::Low,
            ActuatorState::On => Level::High,
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_payload())
    }
}

/// Status LED wired with inverted logic: lit when the line is low
pub struct StatusLed {
    pin: Box<dyn DigitalOutput>,
}

impl StatusLed {
    pub fn new(pin: Box<dyn DigitalOutput>) -> Self {
        Self { pin }
    }

    pub fn set(&mut self, lit: bool) {
        self.pin.set_level(if lit { Level::Low } else { Level::High });
    }

    pub fn is_lit(&self) -> bool {
        self.pin.level() == Level::Low
    }

    pub fn toggle(&mut self) {
        let lit = self.is_lit();
        self.set(!lit);
    }
}

pub struct Actuator {
    relay: Box<dyn DigitalOutput>,
    led: StatusLed,
    clock: Rc<dyn Clock>,
    settle_ms: u64,
    response_topic: String,
}

impl Actuator {
    pub fn new(
        relay: Box<dyn DigitalOutput>,
        led: StatusLed,
        clock: Rc<dyn Clock>,
        settle_ms: u64,
        response_topic: impl Into<String>,
    ) -> Self {
        Self {
            relay,
            led,
            clock,
            settle_ms,
            response_topic: response_topic.into(),
        }
    }

    /// Drives relay and LED to `target`, then blocks for the settle delay so a bouncing coil
    /// is never observed half-way. With `announce` the new state is published retained,
    /// provided a broker session is open.
    pub fn set_state(
        &mut self,
        target: ActuatorState,
        announce: bool,
        broker: &mut dyn BrokerSession,
    ) {
        self.relay.set_level(target.relay_level());
        self.led.set(target == ActuatorState::On);
        self.clock.delay(self.settle_ms);
        info!("Relay switched {}", target);

        if announce {
            self.announce(broker);
        }
    }

    pub fn current_state(&self) -> ActuatorState {
        match self.relay.level() {
            Level::High => ActuatorState::On,
            Level::Low => ActuatorState::Off,
        }
    }

    pub fn toggle(&mut self, announce: bool, broker: &mut dyn BrokerSession) {
        let target = self.current_state().complement();
        self.set_state(target, announce, broker);
    }

    /// Publishes the current state retained on the response topic; no-op without a session
    pub fn announce(&self, broker: &mut dyn BrokerSession) {
        if !broker.is_connected() {
            debug!("No broker session, state not announced");
            return;
        }
        let state = self.current_state();
        match broker.publish(&self.response_topic, state.as_payload(), true) {
            Ok(()) => debug!("Announced '{}' on {}", state, self.response_topic),
            Err(e) => warn!("Failed to announce state: {}", e),
        }
    }

    /// One blink step while a link is failing
    pub fn toggle_indicator(&mut self) {
        self.led.toggle();
    }

    /// Puts the LED back in step with the relay
    pub fn refresh_indicator(&mut self) {
        let on = self.current_state() == ActuatorState::On;
        self.led.set(on);
    }

    #[cfg(test)]
    pub fn indicator_lit(&self) -> bool {
        self.led.is_lit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBroker, FakePin, ManualClock};

    fn actuator(clock: &ManualClock) -> (Actuator, FakePin, FakePin) {
        let relay = FakePin::new(Level::Low);
        let led = FakePin::new(Level::High);
        let actuator = Actuator::new(
            Box::new(relay.clone()),
            StatusLed::new(Box::new(led.clone())),
            Rc::new(clock.clone()),
            50,
            "esp8266-test/response",
        );
        (actuator, relay, led)
    }

    #[test]
    fn set_state_drives_relay_and_inverted_led() {
        let clock = ManualClock::new();
        let (mut actuator, relay, led) = actuator(&clock);
        let mut broker = FakeBroker::new();

        actuator.set_state(ActuatorState::On, false, &mut broker);
        assert_eq!(relay.level(), Level::High);
        assert_eq!(led.level(), Level::Low);
        assert!(actuator.indicator_lit());

        actuator.set_state(ActuatorState::Off, false, &mut broker);
        assert_eq!(relay.level(), Level::Low);
        assert_eq!(led.level(), Level::High);
    }

    #[test]
    fn set_state_waits_for_settle_delay() {
        let clock = ManualClock::new();
        let (mut actuator, _, _) = actuator(&clock);
        let mut broker = FakeBroker::new();

        actuator.set_state(ActuatorState::On, false, &mut broker);
        assert_eq!(clock.now(), crate::hardware::Millis(50));
    }

    #[test]
    fn current_state_reads_the_pin_not_a_cache() {
        let clock = ManualClock::new();
        let (actuator, relay, _) = actuator(&clock);

        relay.force(Level::High);
        assert_eq!(actuator.current_state(), ActuatorState::On);
        relay.force(Level::Low);
        assert_eq!(actuator.current_state(), ActuatorState::Off);
    }

    #[test]
    fn announce_requires_open_session() {
        let clock = ManualClock::new();
        let (mut actuator, _, _) = actuator(&clock);
        let mut broker = FakeBroker::new();

        actuator.set_state(ActuatorState::On, true, &mut broker);
        assert!(broker.published().is_empty());

        broker.force_connected(true);
        actuator.set_state(ActuatorState::Off, true, &mut broker);
        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "esp8266-test/response");
        assert_eq!(published[0].payload, "off");
        assert!(published[0].retain);
    }

    #[test]
    fn repeated_set_state_republishes_same_payload() {
        let clock = ManualClock::new();
        let (mut actuator, relay, _) = actuator(&clock);
        let mut broker = FakeBroker::connected();

        actuator.set_state(ActuatorState::On, true, &mut broker);
        actuator.set_state(ActuatorState::On, true, &mut broker);

        assert_eq!(relay.level(), Level::High);
        assert_eq!(relay.writes(), vec![Level::High, Level::High]);
        let payloads: Vec<_> = broker.published().into_iter().map(|p| p.payload).collect();
        assert_eq!(payloads, vec!["on", "on"]);
    }

    #[test]
    fn toggle_complements_pin_state() {
        let clock = ManualClock::new();
        let (mut actuator, relay, _) = actuator(&clock);
        let mut broker = FakeBroker::connected();

        actuator.toggle(true, &mut broker);
        assert_eq!(relay.level(), Level::High);
        actuator.toggle(true, &mut broker);
        assert_eq!(relay.level(), Level::Low);
        assert_eq!(broker.last_payload_on("esp8266-test/response").as_deref(), Some("off"));
    }

    #[test]
    fn indicator_blinks_and_resyncs() {
        let clock = ManualClock::new();
        let (mut actuator, _, _) = actuator(&clock);
        let mut broker = FakeBroker::new();
        actuator.set_state(ActuatorState::On, false, &mut broker);

        actuator.toggle_indicator();
        assert!(!actuator.indicator_lit());
        actuator.toggle_indicator();
        assert!(actuator.indicator_lit());
        actuator.toggle_indicator();

        actuator.refresh_indicator();
        assert!(actuator.indicator_lit());
    }
}
