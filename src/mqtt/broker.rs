//! Broker session capability and its `rumqttc` implementation
//!
//! The core only sees [`BrokerSession`]. [`MqttBroker`] wraps the synchronous `rumqttc`
//! client: every connect attempt builds a fresh client/event-loop pair and drives it until
//! the broker answers with `ConnAck` or the connect timeout runs out. That attempt is one of
//! the two places the control loop is allowed to block.

use std::time::{Duration, Instant};

use rumqttc::{
    Client, ClientError, ConnectReturnCode, Connection, Event, MqttOptions, Packet, QoS,
    RecvTimeoutError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::message::InboundMessage;
use crate::config::BrokerConfig;

/// Upper bound of events handled per drain, keeps one tick short under message floods
const MAX_EVENTS_PER_DRAIN: usize = 32;

const REQUEST_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("No broker session")]
    NotConnected,

    #[error("Broker did not answer within {0}ms")]
    ConnectTimeout(u64),

    #[error("Broker refused connection: {0}")]
    Refused(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

pub trait BrokerSession {
    /// Single blocking connect attempt, bounded by the transport's own timeout
    fn connect(&mut self) -> Result<(), BrokerError>;

    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BrokerError>;

    /// Hands over every message that arrived since the last call
    fn drain(&mut self) -> Vec<InboundMessage>;

    /// Drops the session locally without waiting for the broker
    fn disconnect(&mut self);
}

struct Session {
    client: Client,
    connection: Connection,
}

pub struct MqttBroker {
    options: MqttOptions,
    connect_timeout: Duration,
    poll_timeout: Duration,
    session: Option<Session>,
}

impl MqttBroker {
    pub fn new(client_id: &str, config: &BrokerConfig) -> Self {
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options
            .set_keep_alive(Duration::from_secs(config.keep_alive_secs))
            .set_clean_session(true);
        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            options.set_credentials(user.clone(), password.clone());
        }

        info!(
            "MQTT client '{}' targets {}:{}",
            client_id, config.host, config.port
        );

        Self {
            options,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            session: None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session, BrokerError> {
        self.session.as_mut().ok_or(BrokerError::NotConnected)
    }
}

impl BrokerSession for MqttBroker {
    fn connect(&mut self) -> Result<(), BrokerError> {
        // never reuse an old event loop, it would silently reconnect on its own schedule
        self.session = None;

        let (client, mut connection) = Client::new(self.options.clone(), REQUEST_QUEUE_CAPACITY);
        let deadline = Instant::now() + self.connect_timeout;
        let timeout_ms = self.connect_timeout.as_millis() as u64;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BrokerError::ConnectTimeout(timeout_ms));
            }

            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(BrokerError::Refused(format!("{:?}", ack.code)));
                    }
                    debug!("ConnAck received, session_present={}", ack.session_present);
                    self.session = Some(Session { client, connection });
                    return Ok(());
                }
                Ok(Ok(event)) => debug!("Event while connecting: {:?}", event),
                Ok(Err(e)) => return Err(BrokerError::Connection(e.to_string())),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BrokerError::ConnectTimeout(timeout_ms))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BrokerError::Connection("event loop closed".to_string()))
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.session_mut()?
            .client
            .try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BrokerError> {
        self.session_mut()?.client.try_publish(
            topic,
            QoS::AtMostOnce,
            retain,
            payload.as_bytes().to_vec(),
        )?;
        Ok(())
    }

    fn drain(&mut self) -> Vec<InboundMessage> {
        let mut inbox = Vec::new();
        let poll_timeout = self.poll_timeout;
        let Some(session) = self.session.as_mut() else {
            return inbox;
        };

        let mut lost = false;
        for _ in 0..MAX_EVENTS_PER_DRAIN {
            match session.connection.recv_timeout(poll_timeout) {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    debug!(
                        "Inbound on {} ({} bytes)",
                        publish.topic,
                        publish.payload.len()
                    );
                    inbox.push(InboundMessage::new(publish.topic, &publish.payload));
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    warn!("Broker closed the session");
                    lost = true;
                    break;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!("Broker connection lost: {}", e);
                    lost = true;
                    break;
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Broker event loop closed");
                    lost = true;
                    break;
                }
            }
        }

        if lost {
            self.session = None;
        }
        inbox
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.client.try_disconnect() {
                debug!("Disconnect request not queued: {}", e);
            }
            info!("Broker session dropped");
        }
    }
}
