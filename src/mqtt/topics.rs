//! Device identity and the topic layout derived from it

/// Prefix every host name carries on the wire
pub const HOST_PREFIX: &str = "esp8266-";

pub const BROADCAST_REQUEST_TOPIC: &str = "sonoff_all/request";
pub const BROADCAST_RESPONSE_TOPIC: &str = "sonoff_all/response";

/// Which subscribed topic a message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Device,
    Broadcast,
}

/// Immutable after boot. The request and response topics always hang off the host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    host_name: String,
    request_topic: String,
    response_topic: String,
}

impl Identity {
    pub fn from_device_name(device_name: &str) -> Self {
        let host_name = format!("{}{}", HOST_PREFIX, device_name);
        Self {
            request_topic: format!("{}/request", host_name),
            response_topic: format!("{}/response", host_name),
            host_name,
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn request_topic(&self) -> &str {
        &self.request_topic
    }

    pub fn response_topic(&self) -> &str {
        &self.response_topic
    }

    /// Topics subscribed on every new broker session
    pub fn subscriptions(&self) -> [&str; 2] {
        [self.request_topic.as_str(), BROADCAST_REQUEST_TOPIC]
    }

    pub fn route_of(&self, topic: &str) -> Option<Route> {
        if topic == self.request_topic {
            Some(Route::Device)
        } else if topic == BROADCAST_REQUEST_TOPIC {
            Some(Route::Broadcast)
        } else {
            None
        }
    }
}
