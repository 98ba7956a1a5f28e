use crate::core::packet::PeerId;
use crate::domain::error::UartLinkResult;
use async_trait::async_trait;

/// Boundary to the radio/link layer.
///
/// Implementations accept outbound buffers here and deliver raw inbound
/// chunks to [`UartDispatcher::on_bytes_received`] through whatever
/// channel suits them. Injected explicitly into the dispatcher; there is
/// no process-wide transport singleton.
///
/// [`UartDispatcher::on_bytes_received`]: crate::core::dispatch::UartDispatcher::on_bytes_received
#[async_trait]
pub trait UartTransport: Send + Sync {
    /// Transmit raw bytes to a peer.
    ///
    /// Returns `TransportUnready` when the peer's channel is not yet
    /// writable and a transport error when the write itself fails.
    async fn write(&self, peer: PeerId, data: &[u8]) -> UartLinkResult<()>;

    /// Whether the peer's channel is currently writable.
    async fn is_ready(&self, peer: PeerId) -> bool;
}
