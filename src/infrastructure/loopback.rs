use crate::core::packet::PeerId;
use crate::core::transport::UartTransport;
use crate::domain::error::{UartLinkError, UartLinkResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory transport that records every write per peer.
///
/// Peers start unready; flip them with [`set_ready`](Self::set_ready).
/// Useful for tests and local bench work against the dispatcher without
/// a radio attached.
#[derive(Default)]
pub struct LoopbackTransport {
    ready: Mutex<HashSet<PeerId>>,
    written: Mutex<HashMap<PeerId, Vec<Vec<u8>>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a peer's channel writable or not
    pub async fn set_ready(&self, peer: PeerId, ready: bool) {
        let mut set = self.ready.lock().await;
        if ready {
            set.insert(peer);
        } else {
            set.remove(&peer);
        }
    }

    /// Buffers written for a peer, in write order
    pub async fn written(&self, peer: PeerId) -> Vec<Vec<u8>> {
        self.written
            .lock()
            .await
            .get(&peer)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl UartTransport for LoopbackTransport {
    async fn write(&self, peer: PeerId, data: &[u8]) -> UartLinkResult<()> {
        if !self.ready.lock().await.contains(&peer) {
            return Err(UartLinkError::TransportUnready { peer });
        }

        debug!("Loopback write of {} byte(s) for peer {}", data.len(), peer);
        self.written
            .lock()
            .await
            .entry(peer)
            .or_default()
            .push(data.to_vec());
        Ok(())
    }

    async fn is_ready(&self, peer: PeerId) -> bool {
        self.ready.lock().await.contains(&peer)
    }
}
