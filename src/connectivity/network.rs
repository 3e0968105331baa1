//! Network association capability
//!
//! On the host the operating system owns the wireless association. The supervisor only needs
//! to kick a reconnect (never waiting for it) and to ask whether the interface is up.

use std::fs;
use std::net::{IpAddr, UdpSocket};
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::config::{BrokerConfig, NetworkConfig};

pub trait NetworkLink {
    /// Non-blocking kick-off of a new association
    fn begin_association(&mut self);

    fn is_up(&mut self) -> bool;

    /// Address assigned on the link, if any
    fn local_address(&self) -> Option<IpAddr>;
}

fn link_carrier(operstate: &str) -> bool {
    operstate.trim() == "up"
}

/// Associated is not enough: the link only counts once it has a routable address
fn link_ready(operstate: &str, address: Option<IpAddr>) -> bool {
    link_carrier(operstate) && address.is_some()
}

/// Linux interface watched through sysfs, reconnected by an external command
pub struct SysfsNetwork {
    interface: String,
    reconnect_command: Vec<String>,
    probe: (String, u16),
    pending: Option<Child>,
}

impl SysfsNetwork {
    pub fn new(network: &NetworkConfig, broker: &BrokerConfig) -> Self {
        Self {
            interface: network.interface.clone(),
            reconnect_command: network.reconnect_command.clone(),
            probe: (broker.host.clone(), broker.port),
            pending: None,
        }
    }

    fn operstate_path(&self) -> String {
        format!("/sys/class/net/{}/operstate", self.interface)
    }

    fn reap(&mut self) {
        if let Some(child) = self.pending.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Reconnect command exited with {}", status);
                    self.pending = None;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Lost track of reconnect command: {}", e);
                    self.pending = None;
                }
            }
        }
    }
}

impl NetworkLink for SysfsNetwork {
    fn begin_association(&mut self) {
        self.reap();
        if self.pending.is_some() {
            debug!("Previous reconnect command still running");
            return;
        }

        let Some((program, args)) = self.reconnect_command.split_first() else {
            debug!("No reconnect command configured, waiting for the OS");
            return;
        };

        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => self.pending = Some(child),
            Err(e) => warn!("Failed to spawn '{}': {}", program, e),
        }
    }

    fn is_up(&mut self) -> bool {
        self.reap();
        let operstate = match fs::read_to_string(self.operstate_path()) {
            Ok(state) => state,
            Err(e) => {
                debug!("Cannot read {}: {}", self.operstate_path(), e);
                return false;
            }
        };
        if !link_carrier(&operstate) {
            return false;
        }
        link_ready(&operstate, self.local_address())
    }

    fn local_address(&self) -> Option<IpAddr> {
        // connecting a UDP socket sends nothing, it only makes the kernel pick a source address
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket
            .connect((self.probe.0.as_str(), self.probe.1))
            .ok()?;
        let address = socket.local_addr().ok()?.ip();
        (!address.is_unspecified()).then_some(address)
    }
}
