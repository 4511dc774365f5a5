//! OSC packet helpers

use crate::error::{DispatchError, Result};
use rosc::{OscMessage, OscPacket, OscType};

/// Maximum length of an OSC address string
const MAX_OSC_ADDRESS_LENGTH: usize = 1024;

/// Build the single-argument tempo message for `address`
pub fn tempo_message(address: &str, value: f32) -> Result<OscPacket> {
    if address.len() > MAX_OSC_ADDRESS_LENGTH {
        return Err(DispatchError::InvalidTarget(format!(
            "OSC address too long (max {} chars)",
            MAX_OSC_ADDRESS_LENGTH
        )));
    }

    Ok(OscPacket::Message(OscMessage {
        addr: address.to_string(),
        args: vec![OscType::Float(value)],
    }))
}

/// Encode a packet for the wire
pub fn encode(packet: &OscPacket) -> Result<Vec<u8>> {
    rosc::encoder::encode(packet).map_err(|e| DispatchError::Transport(format!("OSC encode: {}", e)))
}

/// Read the first float-like argument of a message, if any
pub fn first_float(packet: &OscPacket) -> Option<f32> {
    match packet {
        OscPacket::Message(msg) => match msg.args.first()? {
            OscType::Float(f) => Some(*f),
            OscType::Double(d) => Some(*d as f32),
            OscType::Int(i) => Some(*i as f32),
            _ => None,
        },
        OscPacket::Bundle(_) => None,
    }
}
