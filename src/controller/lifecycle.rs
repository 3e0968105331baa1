//! Lifecycle controller with a statum typestate
//!
//! ```text
//! Booting ──boot()──► Running ──run()──► LoopExit
//! ```
//!
//! Every tick runs the same fixed sequence:
//!
//! 1. connectivity supervisor (network, then broker)
//! 2. inbound broker messages to the dispatcher, if the session is open
//! 3. firmware-update channel
//! 4. scheduled tasks (status publisher)
//! 5. button sample
//!
//! Two steps may block for a bounded time: the broker connect attempt and the settle delay
//! after driving the relay. Everything else returns immediately.

use std::rc::Rc;

use statum::{machine, state};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::update::{UpdateChannel, UpdateMonitor};
use super::{LoopExit, RestartReason};
use crate::config::SwitchConfig;
use crate::connectivity::link::LinkPolicy;
use crate::connectivity::network::NetworkLink;
use crate::connectivity::ConnectivitySupervisor;
use crate::device::actuator::{Actuator, ActuatorState, StatusLed};
use crate::device::button::{ButtonDebouncer, GestureAction, PressThresholds};
use crate::hardware::{Clock, DigitalInput, DigitalOutput};
use crate::mqtt::broker::BrokerSession;
use crate::mqtt::dispatcher::CommandDispatcher;
use crate::mqtt::publisher::StatusPublisher;
use crate::mqtt::topics::Identity;

/// Bound on update events handled in one tick
const MAX_UPDATE_EVENTS_PER_TICK: usize = 8;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub network: LinkPolicy,
    pub broker: LinkPolicy,
    pub thresholds: PressThresholds,
    pub debounce_ms: u64,
    pub status_interval_ms: u64,
    pub settle_ms: u64,
    pub tick_ms: u64,
}

impl ControllerSettings {
    pub fn from_config(config: &SwitchConfig) -> Self {
        Self {
            network: config.network.policy(),
            broker: config.broker.policy(),
            thresholds: config.timing.thresholds(),
            debounce_ms: config.timing.debounce_ms,
            status_interval_ms: config.timing.status_interval_ms,
            settle_ms: config.timing.settle_ms,
            tick_ms: config.timing.tick_ms,
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&SwitchConfig::default())
    }
}

/// Capabilities handed to the controller at construction
pub struct SwitchParts {
    pub clock: Rc<dyn Clock>,
    pub relay: Box<dyn DigitalOutput>,
    pub led: Box<dyn DigitalOutput>,
    pub button: Box<dyn DigitalInput>,
    pub network: Box<dyn NetworkLink>,
    pub broker: Box<dyn BrokerSession>,
    pub updates: Box<dyn UpdateChannel>,
}

#[state]
#[derive(Debug, Clone)]
pub enum LifecycleState {
    Booting, // Pins claimed, nothing driven yet
    Running, // Cooperative loop
}

#[machine]
pub struct SwitchController<S: LifecycleState> {
    clock: Rc<dyn Clock>,
    identity: Identity,
    settings: ControllerSettings,
    actuator: Actuator,
    supervisor: ConnectivitySupervisor,
    dispatcher: CommandDispatcher,
    button: ButtonDebouncer,
    publisher: StatusPublisher,
    network: Box<dyn NetworkLink>,
    broker: Box<dyn BrokerSession>,
    updates: Box<dyn UpdateChannel>,
    update_monitor: UpdateMonitor,
}

#[cfg(test)]
impl<S: LifecycleState> SwitchController<S> {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn actuator(&self) -> &Actuator {
        &self.actuator
    }
}

impl SwitchController<Booting> {
    pub fn create(identity: Identity, settings: ControllerSettings, parts: SwitchParts) -> Self {
        info!("Creating switch controller for {}", identity.host_name());
        debug!("Controller settings: {:?}", settings);

        let now = parts.clock.now();
        let actuator = Actuator::new(
            parts.relay,
            StatusLed::new(parts.led),
            parts.clock.clone(),
            settings.settle_ms,
            identity.response_topic(),
        );
        let supervisor =
            ConnectivitySupervisor::new(identity.clone(), settings.network, settings.broker);
        let dispatcher = CommandDispatcher::new(identity.clone());
        let button = ButtonDebouncer::new(parts.button, settings.debounce_ms, now);
        let publisher = StatusPublisher::new(settings.status_interval_ms, now);

        Self::new(
            parts.clock,
            identity,
            settings,
            actuator,
            supervisor,
            dispatcher,
            button,
            publisher,
            parts.network,
            parts.broker,
            parts.updates,
            UpdateMonitor::default(),
        )
    }

    /// Puts the relay in its power-on state (off) and enters the running state
    pub fn boot(mut self) -> SwitchController<Running> {
        info!(
            "Booting {}: request topic {}, response topic {}",
            self.identity.host_name(),
            self.identity.request_topic(),
            self.identity.response_topic()
        );
        self.actuator
            .set_state(ActuatorState::Off, false, self.broker.as_mut());
        self.transition()
    }
}

impl SwitchController<Running> {
    /// One pass over every component. Returns the reason when the device has to restart.
    pub fn tick(&mut self) -> Option<RestartReason> {
        let now = self.clock.now();

        if let Some(reason) = self.supervisor.step(
            now,
            &mut self.actuator,
            self.network.as_mut(),
            self.broker.as_mut(),
        ) {
            return Some(reason);
        }

        if self.broker.is_connected() {
            for message in self.broker.drain() {
                self.dispatcher.dispatch(
                    &message,
                    &mut self.actuator,
                    self.broker.as_mut(),
                    self.network.as_ref(),
                );
            }
        }

        if let Some(reason) = self.service_updates() {
            return Some(reason);
        }

        self.publisher
            .service(self.clock.now(), &self.actuator, self.broker.as_mut());

        self.sample_button()
    }

    /// Ticks until a restart is due or `shutdown` is cancelled
    pub fn run(&mut self, shutdown: &CancellationToken) -> LoopExit {
        info!("Control loop running, tick every {}ms", self.settings.tick_ms);
        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, leaving control loop");
                return LoopExit::Shutdown;
            }
            if let Some(reason) = self.tick() {
                warn!(
                    "Leaving control loop: {} (network {:?}, broker {:?})",
                    reason,
                    self.supervisor.network_phase(),
                    self.supervisor.broker_phase()
                );
                return LoopExit::Restart(reason);
            }
            self.clock.delay(self.settings.tick_ms);
        }
    }

    fn service_updates(&mut self) -> Option<RestartReason> {
        for _ in 0..MAX_UPDATE_EVENTS_PER_TICK {
            let event = self.updates.poll()?;
            if let Some(reason) = self.update_monitor.observe(event) {
                return Some(reason);
            }
        }
        None
    }

    fn sample_button(&mut self) -> Option<RestartReason> {
        let gesture = self.button.sample(self.clock.now())?;
        let kind = gesture.classify(&self.settings.thresholds);

        match kind.action() {
            GestureAction::ToggleRelay => {
                info!("Short press ({}ms), toggling relay", gesture.duration_ms);
                self.actuator.toggle(true, self.broker.as_mut());
                None
            }
            GestureAction::Restart(kind) => {
                warn!("{:?} press ({}ms)", kind, gesture.duration_ms);
                Some(RestartReason::ButtonHeld(kind))
            }
        }
    }
}
