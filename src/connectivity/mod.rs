//! Connectivity supervision
//!
//! Two [`LinkSupervisor`] instances share one retry policy shape: the network link and the
//! broker session. Each tick the network is handled first; the broker is only attempted while
//! the network is up, but its up-check runs every tick so a dropped network shows up as a
//! dropped session as well.
//!
//! ```text
//! network: up-check ─► attempt (kick-off, LED blink) ─► budget exceeded? ─► escalate
//! broker:  up-check ─► attempt (blocking, LED blink on failure) ─► budget exceeded? ─► escalate
//! ```
//!
//! Escalation never punishes a user relying on the relay: when the relay is on, the failure
//! budget is reset and retries go on forever. With the relay off the supervisor asks for a
//! restart.

pub mod link;
pub mod network;

use tracing::{error, info, warn};

use crate::controller::RestartReason;
use crate::device::actuator::{Actuator, ActuatorState};
use crate::hardware::Millis;
use crate::mqtt::broker::BrokerSession;
use crate::mqtt::topics::Identity;
use link::{LinkPhase, LinkPolicy, LinkStep, LinkSupervisor};
use network::NetworkLink;

pub struct ConnectivitySupervisor {
    identity: Identity,
    network: LinkSupervisor,
    broker: LinkSupervisor,
}

impl ConnectivitySupervisor {
    pub fn new(identity: Identity, network_policy: LinkPolicy, broker_policy: LinkPolicy) -> Self {
        info!(
            "Connectivity policy: network retry {}ms / max {} failures, broker retry {}ms / max {} failures",
            network_policy.retry_interval_ms,
            network_policy.max_failures,
            broker_policy.retry_interval_ms,
            broker_policy.max_failures
        );
        Self {
            identity,
            network: LinkSupervisor::new("Network", network_policy),
            broker: LinkSupervisor::new("Broker", broker_policy),
        }
    }

    pub fn network_phase(&self) -> LinkPhase {
        self.network.phase()
    }

    pub fn broker_phase(&self) -> LinkPhase {
        self.broker.phase()
    }

    #[cfg(test)]
    pub fn network_state(&self) -> &link::ConnectionAttemptState {
        self.network.state()
    }

    #[cfg(test)]
    pub fn broker_state(&self) -> &link::ConnectionAttemptState {
        self.broker.state()
    }

    /// Advances both links by one tick. Returns the reason when a restart is due.
    pub fn step(
        &mut self,
        now: Millis,
        actuator: &mut Actuator,
        network: &mut dyn NetworkLink,
        broker: &mut dyn BrokerSession,
    ) -> Option<RestartReason> {
        if let Some(reason) = self.step_network(now, actuator, network) {
            return Some(reason);
        }
        self.step_broker(now, actuator, broker)
    }

    fn step_network(
        &mut self,
        now: Millis,
        actuator: &mut Actuator,
        network: &mut dyn NetworkLink,
    ) -> Option<RestartReason> {
        match self.network.poll(now, network.is_up()) {
            LinkStep::Up { established } => {
                if established {
                    match network.local_address() {
                        Some(address) => info!("Network up, address {}", address),
                        None => info!("Network up, no address yet"),
                    }
                    actuator.refresh_indicator();
                }
                None
            }
            LinkStep::Waiting => None,
            LinkStep::AttemptDue => {
                network.begin_association();
                actuator.toggle_indicator();
                if self.network.record_attempt(now) {
                    escalate(&mut self.network, actuator, RestartReason::NetworkUnreachable)
                } else {
                    None
                }
            }
        }
    }

    fn step_broker(
        &mut self,
        now: Millis,
        actuator: &mut Actuator,
        broker: &mut dyn BrokerSession,
    ) -> Option<RestartReason> {
        let network_up = self.network.is_up();
        if !network_up && broker.is_connected() {
            warn!("Network lost, dropping broker session");
            broker.disconnect();
        }

        match self.broker.poll(now, network_up && broker.is_connected()) {
            LinkStep::Up { established } => {
                if established {
                    self.on_session_established(actuator, broker);
                }
                None
            }
            LinkStep::Waiting => None,
            LinkStep::AttemptDue if !network_up => None,
            LinkStep::AttemptDue => {
                let exhausted = self.broker.record_attempt(now);
                info!("Connecting to broker as {}", self.identity.host_name());
                match broker.connect() {
                    Ok(()) => {
                        info!("Broker accepted the connection");
                        return None;
                    }
                    Err(e) => {
                        warn!(
                            "Broker connect failed ({} in a row): {}",
                            self.broker.state().consecutive_failures,
                            e
                        );
                        actuator.toggle_indicator();
                    }
                }
                if exhausted {
                    escalate(&mut self.broker, actuator, RestartReason::BrokerUnreachable)
                } else {
                    None
                }
            }
        }
    }

    fn on_session_established(&self, actuator: &mut Actuator, broker: &mut dyn BrokerSession) {
        for topic in self.identity.subscriptions() {
            match broker.subscribe(topic) {
                Ok(()) => info!("Subscribed to {}", topic),
                Err(e) => warn!("Failed to subscribe to {}: {}", topic, e),
            }
        }
        actuator.refresh_indicator();
        actuator.announce(broker);
    }
}

fn escalate(
    link: &mut LinkSupervisor,
    actuator: &Actuator,
    reason: RestartReason,
) -> Option<RestartReason> {
    match actuator.current_state() {
        ActuatorState::On => {
            warn!("{}, but the relay is on: retrying indefinitely", reason);
            link.forgive();
            None
        }
        ActuatorState::Off => {
            error!("{}, restarting", reason);
            Some(reason)
        }
    }
}
