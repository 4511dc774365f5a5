//! UDP sender for OSC tempo messages

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::types;
use crate::{error::DispatchError, Result};

/// Fire-and-forget OSC sink for one destination
#[derive(Debug)]
pub struct OscSink {
    socket: UdpSocket,
    target: SocketAddr,
    address: String,
}

impl OscSink {
    /// Create a new OSC sink
    ///
    /// # Arguments
    /// * `host` - Hostname or IP of the receiver
    /// * `port` - UDP port of the receiver
    /// * `address` - OSC address pattern the value is sent to
    pub fn new(host: &str, port: u16, address: &str) -> Result<Self> {
        let target = (host, port)
            .to_socket_addrs()
            .map_err(|e| {
                DispatchError::InvalidTarget(format!("Cannot resolve {}:{}: {}", host, port, e))
            })?
            .next()
            .ok_or_else(|| {
                DispatchError::InvalidTarget(format!("No address found for {}:{}", host, port))
            })?;

        let bind_addr = if target.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind_addr)?;

        tracing::info!("OSC sink created: {} -> {}", address, target);

        Ok(Self {
            socket,
            target,
            address: address.to_string(),
        })
    }

    /// Send a value.
    ///
    /// OSC over UDP has no delivery guarantee, so failures are logged and
    /// swallowed: a dead receiver must not stall the beat cadence.
    pub fn send(&self, value: f32) -> Result<()> {
        if let Err(e) = self.try_send(value) {
            tracing::warn!("OSC send to {}{} failed: {}", self.target, self.address, e);
        }
        Ok(())
    }

    fn try_send(&self, value: f32) -> Result<()> {
        let packet = types::tempo_message(&self.address, value)?;
        let buf = types::encode(&packet)?;
        self.socket.send_to(&buf, self.target)?;

        tracing::trace!("Sent OSC {} {} to {}", self.address, value, self.target);
        Ok(())
    }

    /// Resolved destination
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// OSC address pattern
    pub fn address(&self) -> &str {
        &self.address
    }
}
