//! Remote command vocabulary
//!
//! | topic                | payload  | action                                  |
//! |----------------------|----------|-----------------------------------------|
//! | `<host>/request`     | `on`     | relay on, announce                      |
//! | `<host>/request`     | `off`    | relay off, announce                     |
//! | `<host>/request`     | `status` | announce current state                  |
//! | `sonoff_all/request` | `showip` | `<host> ==> <address>`, not retained    |
//!
//! Anything else is ignored.

use std::net::{IpAddr, Ipv4Addr};

use tracing::{debug, info, warn};

use super::broker::BrokerSession;
use super::message::{InboundMessage, Payload};
use super::topics::{Identity, Route, BROADCAST_RESPONSE_TOPIC};
use crate::connectivity::network::NetworkLink;
use crate::device::actuator::{Actuator, ActuatorState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetOn,
    SetOff,
    QueryStatus,
    DiscoveryPing,
}

impl Command {
    pub fn parse(route: Route, payload: &Payload) -> Option<Self> {
        let command = match route {
            Route::Device if payload.matches("on") => Command::SetOn,
            Route::Device if payload.matches("off") => Command::SetOff,
            Route::Device if payload.matches("status") => Command::QueryStatus,
            Route::Broadcast if payload.matches("showip") => Command::DiscoveryPing,
            _ => return None,
        };
        Some(command)
    }
}

pub struct CommandDispatcher {
    identity: Identity,
}

impl CommandDispatcher {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// Resolves a message to a command, `None` for anything outside the vocabulary
    pub fn interpret(&self, message: &InboundMessage) -> Option<Command> {
        let Some(route) = self.identity.route_of(&message.topic) else {
            warn!("Message on unsubscribed topic {}", message.topic);
            return None;
        };
        let command = Command::parse(route, &message.payload);
        if command.is_none() && message.payload.was_truncated() {
            debug!("Ignoring oversized payload on {}", message.topic);
        } else if command.is_none() {
            debug!(
                "Ignoring {:?} on {} ({:?})",
                message.payload, message.topic, route
            );
        }
        command
    }

    pub fn dispatch(
        &self,
        message: &InboundMessage,
        actuator: &mut Actuator,
        broker: &mut dyn BrokerSession,
        network: &dyn NetworkLink,
    ) {
        let Some(command) = self.interpret(message) else {
            return;
        };
        info!("Command {:?} from {}", command, message.topic);

        match command {
            Command::SetOn => actuator.set_state(ActuatorState::On, true, broker),
            Command::SetOff => actuator.set_state(ActuatorState::Off, true, broker),
            Command::QueryStatus => actuator.announce(broker),
            Command::DiscoveryPing => self.answer_discovery(broker, network),
        }
    }

    fn answer_discovery(&self, broker: &mut dyn BrokerSession, network: &dyn NetworkLink) {
        let address = network
            .local_address()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let reply = format!("{} ==> {}", self.identity.host_name(), address);
        if let Err(e) = broker.publish(BROADCAST_RESPONSE_TOPIC, &reply, false) {
            warn!("Failed to answer discovery: {}", e);
        }
    }
}
