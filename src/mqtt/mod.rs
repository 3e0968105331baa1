//! # MQTT surface of the switch
//!
//! Everything the device says or hears on the broker goes through this module.
//!
//! ```text
//! mqtt/
//! ├── topics.rs      - identity and topic layout
//! ├── message.rs     - bounded inbound payloads
//! ├── broker.rs      - session capability and the rumqttc client behind it
//! ├── dispatcher.rs  - command vocabulary
//! └── publisher.rs   - periodic status announcement
//! ```
//!
//! ## Wire contract
//!
//! - subscribe `<host>/request` and `sonoff_all/request`
//! - publish `on`/`off` retained on `<host>/response`
//! - publish `<host> ==> <ip>` (not retained) on `sonoff_all/response`

pub mod broker;
pub mod dispatcher;
pub mod message;
pub mod publisher;
pub mod topics;
