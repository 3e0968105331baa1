//! In-memory doubles for the hardware and transport capabilities
//!
//! Every double is a cheap handle over shared state: clone one, hand the clone to the code
//! under test and keep the original to steer or inspect it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::rc::Rc;

use crate::controller::update::{UpdateChannel, UpdateEvent};
use crate::device::actuator::{Actuator, StatusLed};
use crate::hardware::{Clock, DigitalInput, DigitalOutput, Level, Millis};
use crate::mqtt::broker::{BrokerError, BrokerSession};
use crate::mqtt::message::InboundMessage;

/// Clock that only moves when told to; `delay` advances it
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Millis {
        Millis(self.now.get())
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        Millis(self.now.get())
    }

    fn delay(&self, ms: u64) {
        self.advance(ms);
    }
}

/// Output pin recording every level written to it
#[derive(Clone)]
pub struct FakePin {
    level: Rc<Cell<Level>>,
    writes: Rc<RefCell<Vec<Level>>>,
}

impl FakePin {
    pub fn new(level: Level) -> Self {
        Self {
            level: Rc::new(Cell::new(level)),
            writes: Rc::default(),
        }
    }

    pub fn level(&self) -> Level {
        self.level.get()
    }

    /// Changes the line without recording a write, as an external actor would
    pub fn force(&self, level: Level) {
        self.level.set(level);
    }

    pub fn writes(&self) -> Vec<Level> {
        self.writes.borrow().clone()
    }
}

impl DigitalOutput for FakePin {
    fn set_level(&mut self, level: Level) {
        self.level.set(level);
        self.writes.borrow_mut().push(level);
    }

    fn level(&self) -> Level {
        self.level.get()
    }
}

/// Active-low push button, released until pressed
#[derive(Clone)]
pub struct FakeButton {
    level: Rc<Cell<Level>>,
}

impl FakeButton {
    pub fn new() -> Self {
        Self {
            level: Rc::new(Cell::new(Level::High)),
        }
    }

    pub fn press(&self) {
        self.level.set(Level::Low);
    }

    pub fn release(&self) {
        self.level.set(Level::High);
    }
}

impl DigitalInput for FakeButton {
    fn level(&self) -> Level {
        self.level.get()
    }
}

#[derive(Default)]
struct NetworkLog {
    up: bool,
    associations: usize,
    address: Option<IpAddr>,
}

#[derive(Clone, Default)]
pub struct FakeNetwork {
    log: Rc<RefCell<NetworkLog>>,
}

impl FakeNetwork {
    /// Down, no address
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(self, address: IpAddr) -> Self {
        self.log.borrow_mut().address = Some(address);
        self
    }

    pub fn set_up(&self, up: bool) {
        self.log.borrow_mut().up = up;
    }

    pub fn associations(&self) -> usize {
        self.log.borrow().associations
    }
}

impl crate::connectivity::network::NetworkLink for FakeNetwork {
    fn begin_association(&mut self) {
        self.log.borrow_mut().associations += 1;
    }

    fn is_up(&mut self) -> bool {
        self.log.borrow().up
    }

    fn local_address(&self) -> Option<IpAddr> {
        self.log.borrow().address
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

#[derive(Default)]
struct BrokerLog {
    reachable: bool,
    connected: bool,
    connect_attempts: usize,
    subscriptions: Vec<String>,
    published: Vec<Published>,
    inbox: VecDeque<InboundMessage>,
}

/// Broker session kept entirely in memory
#[derive(Clone, Default)]
pub struct FakeBroker {
    log: Rc<RefCell<BrokerLog>>,
}

impl FakeBroker {
    /// Unreachable and disconnected
    pub fn new() -> Self {
        Self::default()
    }

    /// Reachable with an open session
    pub fn connected() -> Self {
        let broker = Self::new();
        broker.set_reachable(true);
        broker.force_connected(true);
        broker
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.log.borrow_mut().reachable = reachable;
    }

    pub fn force_connected(&self, connected: bool) {
        self.log.borrow_mut().connected = connected;
    }

    /// Server side drops the session; the next connect may succeed again
    pub fn drop_session(&self) {
        self.log.borrow_mut().connected = false;
    }

    /// Queues an inbound message for the next `drain`
    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        self.log
            .borrow_mut()
            .inbox
            .push_back(InboundMessage::new(topic, payload));
    }

    pub fn pending_inbound(&self) -> usize {
        self.log.borrow().inbox.len()
    }

    pub fn connect_attempts(&self) -> usize {
        self.log.borrow().connect_attempts
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.log.borrow().subscriptions.clone()
    }

    pub fn published(&self) -> Vec<Published> {
        self.log.borrow().published.clone()
    }

    pub fn clear_published(&self) {
        self.log.borrow_mut().published.clear();
    }

    pub fn last_payload_on(&self, topic: &str) -> Option<String> {
        self.log
            .borrow()
            .published
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .map(|p| p.payload.clone())
    }
}

impl BrokerSession for FakeBroker {
    fn connect(&mut self) -> Result<(), BrokerError> {
        let mut log = self.log.borrow_mut();
        log.connect_attempts += 1;
        if log.reachable {
            log.connected = true;
            Ok(())
        } else {
            Err(BrokerError::ConnectTimeout(500))
        }
    }

    fn is_connected(&self) -> bool {
        self.log.borrow().connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let mut log = self.log.borrow_mut();
        if !log.connected {
            return Err(BrokerError::NotConnected);
        }
        log.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BrokerError> {
        let mut log = self.log.borrow_mut();
        if !log.connected {
            return Err(BrokerError::NotConnected);
        }
        log.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }

    fn drain(&mut self) -> Vec<InboundMessage> {
        self.log.borrow_mut().inbox.drain(..).collect()
    }

    fn disconnect(&mut self) {
        self.log.borrow_mut().connected = false;
    }
}

/// Update channel fed from the test body
#[derive(Clone, Default)]
pub struct ScriptedUpdates {
    events: Rc<RefCell<VecDeque<UpdateEvent>>>,
}

impl ScriptedUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: UpdateEvent) {
        self.events.borrow_mut().push_back(event);
    }
}

impl UpdateChannel for ScriptedUpdates {
    fn poll(&mut self) -> Option<UpdateEvent> {
        self.events.borrow_mut().pop_front()
    }
}

/// Actuator on fake pins: relay low (off), LED high (dark)
pub fn fake_actuator(clock: &ManualClock) -> (Actuator, FakePin, FakePin) {
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
