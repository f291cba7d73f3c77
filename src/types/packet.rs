//! Raw diagnostic packet records
//!
//! The capture process hands over baseband protocol packets in one of two
//! wire formats. The core never interprets the payload; it only tags and
//! forwards it to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Baseband diagnostic protocol the payload is encoded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketProtocol {
    /// Apple Remote Invocation (Intel basebands)
    Ari,
    /// Qualcomm MSM Interface
    Qmi,
}

impl std::fmt::Display for PacketProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketProtocol::Ari => write!(f, "ari"),
            PacketProtocol::Qmi => write!(f, "qmi"),
        }
    }
}

/// Direction of the packet relative to the baseband
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketDirection {
    Ingoing,
    Outgoing,
}

/// A raw diagnostic protocol packet tagged with its framing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketRecord {
    pub protocol: PacketProtocol,
    pub direction: PacketDirection,
    pub collected_at: DateTime<Utc>,
    /// SIM slot the packet belongs to
    pub slot: u8,
    /// Opaque protocol payload, owned by the capture/storage layer
    pub payload: Vec<u8>,
}

impl PacketRecord {
    pub fn new(
        protocol: PacketProtocol,
        direction: PacketDirection,
        slot: u8,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            protocol,
            direction,
            collected_at: Utc::now(),
            slot,
            payload,
        }
    }
}
