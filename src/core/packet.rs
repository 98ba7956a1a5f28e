use crate::domain::error::{UartLinkError, UartLinkResult};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Opaque identifier naming one connected remote endpoint.
///
/// Stable for the lifetime of a connection and used as the key for all
/// per-peer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    /// Create a fresh random peer identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PeerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet direction classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketDirection {
    /// Data sent to the peer
    Tx,
    /// Data received from the peer
    Rx,
}

impl std::fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "tx"),
            PacketDirection::Rx => write!(f, "rx"),
        }
    }
}

/// One complete, separator-delimited unit exchanged with a peer.
///
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UartPacket {
    pub peer: PeerId,
    pub direction: PacketDirection,
    pub timestamp: SystemTime,
    pub data: Vec<u8>,
}

impl UartPacket {
    /// Create a new packet stamped with the current time
    pub fn new(peer: PeerId, direction: PacketDirection, data: Vec<u8>) -> Self {
        Self {
            peer,
            direction,
            timestamp: SystemTime::now(),
            data,
        }
    }

    /// Create a received packet
    pub fn rx(peer: PeerId, data: Vec<u8>) -> Self {
        Self::new(peer, PacketDirection::Rx, data)
    }

    /// Create a transmitted packet
    pub fn tx(peer: PeerId, data: Vec<u8>) -> Self {
        Self::new(peer, PacketDirection::Tx, data)
    }

    /// Get packet payload as string (if valid UTF-8)
    pub fn data_as_string(&self) -> Option<String> {
        String::from_utf8(self.data.clone()).ok()
    }

    /// Get packet payload as a hex string
    pub fn data_as_hex(&self) -> String {
        hex::encode(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if the packet matches a filter
    pub fn matches(&self, filter: &PacketFilter) -> bool {
        if let Some(peer) = filter.peer {
            if self.peer != peer {
                return false;
            }
        }

        if let Some(direction) = filter.direction {
            if self.direction != direction {
                return false;
            }
        }

        true
    }
}

/// Filter for querying packet history
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketFilter {
    pub peer: Option<PeerId>,
    pub direction: Option<PacketDirection>,
}

impl PacketFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer(mut self, peer: PeerId) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_direction(mut self, direction: PacketDirection) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// Serialize a history snapshot to pretty-printed JSON for export.
pub fn packets_to_json(packets: &[UartPacket]) -> UartLinkResult<String> {
    serde_json::to_string_pretty(packets)
        .map_err(|e| UartLinkError::InvalidData(format!("Failed to serialize packets: {}", e)))
}
