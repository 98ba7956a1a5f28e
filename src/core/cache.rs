use crate::core::packet::{PacketFilter, PeerId, UartPacket};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Per-peer ordered history of exchanged packets.
///
/// Insertion order equals chronological order. The enabled flag is fixed
/// at construction; when disabled, `record` is a no-op and snapshots are
/// always empty. An optional per-peer cap bounds memory, evicting the
/// oldest packets first.
pub struct PacketCache {
    enabled: bool,
    max_packets_per_peer: Option<usize>,
    packets: HashMap<PeerId, VecDeque<UartPacket>>,
}

impl PacketCache {
    pub fn new(enabled: bool, max_packets_per_peer: Option<usize>) -> Self {
        Self {
            enabled,
            max_packets_per_peer,
            packets: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append a packet to its peer's history. O(1) amortized.
    pub fn record(&mut self, packet: UartPacket) {
        if !self.enabled {
            return;
        }

        let history = self.packets.entry(packet.peer).or_default();
        history.push_back(packet);

        if let Some(max) = self.max_packets_per_peer {
            while history.len() > max {
                history.pop_front();
            }
        }
    }

    /// Chronological copy of a peer's history. Unknown peers yield an
    /// empty snapshot; a snapshot never observes later mutations.
    pub fn snapshot(&self, peer: PeerId) -> Vec<UartPacket> {
        self.packets
            .get(&peer)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Filtered history across all peers, ordered by timestamp.
    pub fn snapshot_filtered(&self, filter: &PacketFilter) -> Vec<UartPacket> {
        let mut matched: Vec<UartPacket> = self
            .packets
            .values()
            .flat_map(|history| history.iter())
            .filter(|packet| packet.matches(filter))
            .cloned()
            .collect();
        matched.sort_by_key(|packet| packet.timestamp);
        matched
    }

    /// Number of packets retained for a peer
    pub fn len(&self, peer: PeerId) -> usize {
        self.packets.get(&peer).map_or(0, |history| history.len())
    }

    pub fn is_empty(&self, peer: PeerId) -> bool {
        self.len(peer) == 0
    }

    /// Discard one peer's history. The cache stays usable afterwards.
    pub fn clear(&mut self, peer: PeerId) {
        if self.packets.remove(&peer).is_some() {
            debug!("Cleared packet history for peer {}", peer);
        }
    }

    /// Discard every peer's history
    pub fn clear_all(&mut self) {
        let count: usize = self.packets.values().map(|history| history.len()).sum();
        self.packets.clear();
        info!("Cleared packet history ({} packet(s) dropped)", count);
    }
}
