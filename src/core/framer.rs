use crate::core::packet::{PeerId, UartPacket};
use crate::domain::config::FramingConfig;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Reassembles raw byte chunks into separator-delimited packets.
///
/// One receive buffer per peer, created lazily on first chunk. Chunks for
/// the same peer must be fed in arrival order; the framer performs no
/// reordering. Any byte sequence between separators is a valid payload,
/// including empty.
pub struct LineFramer {
    config: FramingConfig,
    buffers: HashMap<PeerId, Vec<u8>>,
}

impl LineFramer {
    pub fn new(config: FramingConfig) -> Self {
        Self {
            config,
            buffers: HashMap::new(),
        }
    }

    /// Append a chunk to the peer's receive buffer and extract every
    /// complete packet, in stream order.
    ///
    /// Bytes after the last separator stay buffered for the next call.
    /// Returns an empty vector when no separator is present yet.
    pub fn feed(&mut self, peer: PeerId, chunk: &[u8]) -> Vec<UartPacket> {
        let buffer = self.buffers.entry(peer).or_default();
        buffer.extend_from_slice(chunk);

        let mut packets = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = buffer[consumed..]
            .iter()
            .position(|&b| b == self.config.separator)
        {
            let end = consumed + offset;
            let mut payload = buffer[consumed..end].to_vec();
            if self.config.strip_carriage_return && payload.last() == Some(&b'\r') {
                payload.pop();
            }
            packets.push(UartPacket::rx(peer, payload));
            consumed = end + 1;
        }

        if consumed > 0 {
            buffer.drain(..consumed);
        }

        if !packets.is_empty() {
            debug!(
                "Framed {} packet(s) for peer {}, {} byte(s) left buffered",
                packets.len(),
                peer,
                buffer.len()
            );
        }

        packets
    }

    /// Drop the first `byte_count` buffered bytes without producing packets.
    ///
    /// Used to discard backlog accumulated before a consumer has armed
    /// itself for reading. Silent no-op when `byte_count` exceeds the
    /// buffered length; callers derive boundary-aligned counts from a
    /// prior scan.
    pub fn evict_processed_prefix(&mut self, peer: PeerId, byte_count: usize) {
        if let Some(buffer) = self.buffers.get_mut(&peer) {
            if byte_count <= buffer.len() {
                buffer.drain(..byte_count);
                trace!("Evicted {} buffered byte(s) for peer {}", byte_count, peer);
            }
        }
    }

    /// Discard the peer's receive buffer entirely. Disconnect path.
    pub fn reset(&mut self, peer: PeerId) {
        if self.buffers.remove(&peer).is_some() {
            debug!("Reset receive buffer for peer {}", peer);
        }
    }

    /// Bytes received but not yet resolved into a complete packet.
    pub fn buffered_len(&self, peer: PeerId) -> usize {
        self.buffers.get(&peer).map_or(0, |b| b.len())
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(FramingConfig::default())
    }
}
