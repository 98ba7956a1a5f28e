use crate::core::cache::PacketCache;
use crate::core::framer::LineFramer;
use crate::core::packet::{PacketFilter, PeerId, UartPacket};
use crate::core::transport::UartTransport;
use crate::domain::config::UartLinkConfig;
use crate::domain::error::{UartLinkError, UartLinkResult};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Observer receiving every packet the dispatcher frames or sends.
///
/// Implemented independently by each consumer (echo view, plotter,
/// button panel); one capability method instead of a subclass chain.
/// Callbacks run on the task that fed the dispatcher and must not call
/// back into it.
pub trait PacketObserver: Send + Sync {
    fn on_packet(&self, packet: &UartPacket);
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Aggregate traffic counters across all peers
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

/// Outcome of one peer's leg of a broadcast
#[derive(Debug)]
pub struct SendReport {
    pub peer: PeerId,
    /// Position of this send within the broadcast, starting at zero for
    /// each `send_to_all` call. Consumers that want to echo a broadcast
    /// message once can ignore legs with a non-zero index; the dispatcher
    /// itself never suppresses echoes.
    pub broadcast_index: usize,
    pub result: UartLinkResult<()>,
}

impl SendReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-peer link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    /// Attached, no packet framed yet
    Idle,
    /// Packets flowing
    Active,
}

struct DispatchInner {
    framer: LineFramer,
    cache: PacketCache,
    links: HashMap<PeerId, LinkState>,
    observers: Vec<(ObserverId, Arc<dyn PacketObserver>)>,
    next_observer_id: u64,
    stats: DispatchStats,
}

impl DispatchInner {
    /// Deliver one packet to every observer, in subscription order.
    ///
    /// A panicking observer is logged and skipped; it never blocks
    /// delivery to the observers after it.
    fn notify(&self, packet: &UartPacket) {
        for (id, observer) in &self.observers {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer.on_packet(packet)));
            if outcome.is_err() {
                error!(
                    "Observer {:?} panicked while handling a {} packet for peer {}",
                    id, packet.direction, packet.peer
                );
            }
        }
    }
}

/// Single integration point between the transport adapter and all packet
/// consumers.
///
/// Composes the framer and the cache, fans packets out to registered
/// observers, and serializes all mutation and delivery behind one lock so
/// that for any peer the observers see packets exactly in framing order.
/// Callers keep the single-writer-per-peer discipline: `on_bytes_received`
/// and `send` are not invoked concurrently for the same peer.
pub struct UartDispatcher {
    transport: Arc<dyn UartTransport>,
    config: UartLinkConfig,
    inner: Mutex<DispatchInner>,
}

impl UartDispatcher {
    pub fn new(transport: Arc<dyn UartTransport>, config: UartLinkConfig) -> Self {
        let inner = DispatchInner {
            framer: LineFramer::new(config.framing.clone()),
            cache: PacketCache::new(
                config.dispatch.cache_enabled,
                config.dispatch.max_cached_packets,
            ),
            links: HashMap::new(),
            observers: Vec::new(),
            next_observer_id: 0,
            stats: DispatchStats::default(),
        };

        Self {
            transport,
            config,
            inner: Mutex::new(inner),
        }
    }

    /// Register an observer. Returns the handle used to unsubscribe.
    pub async fn subscribe(&self, observer: Arc<dyn PacketObserver>) -> ObserverId {
        let mut inner = self.inner.lock().await;
        let id = ObserverId(inner.next_observer_id);
        inner.next_observer_id += 1;
        inner.observers.push((id, observer));
        debug!("Observer {:?} subscribed", id);
        id
    }

    /// Remove an observer. Returns false when the handle is unknown.
    pub async fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.lock().await;
        let before = inner.observers.len();
        inner.observers.retain(|(observer_id, _)| *observer_id != id);
        let removed = inner.observers.len() < before;
        if removed {
            debug!("Observer {:?} unsubscribed", id);
        }
        removed
    }

    /// Register a peer ahead of traffic. Transport connect path.
    pub async fn attach_peer(&self, peer: PeerId) {
        let mut inner = self.inner.lock().await;
        inner.links.entry(peer).or_insert(LinkState::Idle);
        info!("Peer {} attached", peer);
    }

    /// Drop a peer's link state and receive buffer. Transport disconnect
    /// path. Cached history survives until explicitly cleared.
    pub async fn detach_peer(&self, peer: PeerId) {
        let mut inner = self.inner.lock().await;
        inner.framer.reset(peer);
        if inner.links.remove(&peer).is_some() {
            info!("Peer {} detached", peer);
        }
    }

    pub async fn is_peer_attached(&self, peer: PeerId) -> bool {
        let inner = self.inner.lock().await;
        inner.links.contains_key(&peer)
    }

    /// Entry point for raw inbound chunks from the transport.
    ///
    /// Frames the chunk, records each packet, and notifies every observer
    /// per packet in discovery order before returning. May be called from
    /// any task; peers without prior state are attached lazily.
    pub async fn on_bytes_received(&self, peer: PeerId, chunk: &[u8]) {
        let mut inner = self.inner.lock().await;

        inner.links.entry(peer).or_insert(LinkState::Idle);
        inner.stats.bytes_received += chunk.len() as u64;

        let packets = inner.framer.feed(peer, chunk);
        if packets.is_empty() {
            return;
        }

        if let Some(state) = inner.links.get_mut(&peer) {
            if *state == LinkState::Idle {
                *state = LinkState::Active;
                info!("Peer {} link active", peer);
            }
        }

        inner.stats.packets_received += packets.len() as u64;
        for packet in packets {
            inner.cache.record(packet.clone());
            inner.notify(&packet);
        }
    }

    /// Send raw bytes to a peer.
    ///
    /// The outbound packet is recorded and echoed to observers before the
    /// transport write, so consumers can display what was sent even when
    /// the transport then refuses it; the transport error is still
    /// returned to the caller.
    pub async fn send(&self, peer: PeerId, payload: &[u8]) -> UartLinkResult<()> {
        {
            let mut inner = self.inner.lock().await;

            if !inner.links.contains_key(&peer) {
                return Err(UartLinkError::PeerUnknown { peer });
            }

            let packet = UartPacket::tx(peer, payload.to_vec());
            inner.stats.bytes_sent += payload.len() as u64;
            inner.stats.packets_sent += 1;
            inner.cache.record(packet.clone());
            inner.notify(&packet);
        }

        debug!("Sending {} byte(s) to peer {}", payload.len(), peer);
        self.transport.write(peer, payload).await
    }

    /// Send text to a peer, appending the configured line ending.
    pub async fn send_text(&self, peer: PeerId, text: &str) -> UartLinkResult<()> {
        let mut payload = text.as_bytes().to_vec();
        self.config.dispatch.line_ending.apply(&mut payload);
        self.send(peer, &payload).await
    }

    /// Send the same payload to several peers independently.
    ///
    /// One peer's failure never blocks delivery to the others; each leg
    /// reports its own outcome.
    pub async fn send_to_all(&self, peers: &[PeerId], payload: &[u8]) -> Vec<SendReport> {
        let mut reports = Vec::with_capacity(peers.len());

        for (broadcast_index, peer) in peers.iter().copied().enumerate() {
            let result = self.send(peer, payload).await;
            if let Err(ref e) = result {
                warn!("Broadcast leg for peer {} failed: {}", peer, e);
            }
            reports.push(SendReport {
                peer,
                broadcast_index,
                result,
            });
        }

        reports
    }

    /// Broadcast variant of [`send_text`](Self::send_text).
    pub async fn send_text_to_all(&self, peers: &[PeerId], text: &str) -> Vec<SendReport> {
        let mut payload = text.as_bytes().to_vec();
        self.config.dispatch.line_ending.apply(&mut payload);
        self.send_to_all(peers, &payload).await
    }

    /// Chronological history snapshot for a peer
    pub async fn packets_cache(&self, peer: PeerId) -> Vec<UartPacket> {
        let inner = self.inner.lock().await;
        inner.cache.snapshot(peer)
    }

    /// Filtered history snapshot across peers
    pub async fn packets_cache_filtered(&self, filter: &PacketFilter) -> Vec<UartPacket> {
        let inner = self.inner.lock().await;
        inner.cache.snapshot_filtered(filter)
    }

    /// Discard one peer's history. Caller-initiated; observers refresh
    /// their own display, nothing is broadcast.
    pub async fn clear_cache(&self, peer: PeerId) {
        let mut inner = self.inner.lock().await;
        inner.cache.clear(peer);
    }

    /// Discard every peer's history
    pub async fn clear_all_caches(&self) {
        let mut inner = self.inner.lock().await;
        inner.cache.clear_all();
    }

    pub async fn stats(&self) -> DispatchStats {
        let inner = self.inner.lock().await;
        inner.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::PacketDirection;
    use crate::infrastructure::loopback::LoopbackTransport;
    use std::sync::Mutex as StdMutex;

    struct Recorder {
        packets: StdMutex<Vec<UartPacket>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                packets: StdMutex::new(Vec::new()),
            })
        }

        fn payloads(&self) -> Vec<Vec<u8>> {
            self.packets
                .lock()
                .unwrap()
                .iter()
                .map(|p| p.data.clone())
                .collect()
        }
    }

    impl PacketObserver for Recorder {
        fn on_packet(&self, packet: &UartPacket) {
            self.packets.lock().unwrap().push(packet.clone());
        }
    }

    struct Panicker;

    impl PacketObserver for Panicker {
        fn on_packet(&self, _packet: &UartPacket) {
            panic!("observer failure");
        }
    }

    fn new_dispatcher() -> (Arc<UartDispatcher>, Arc<LoopbackTransport>) {
        let transport = Arc::new(LoopbackTransport::new());
        let dispatcher = Arc::new(UartDispatcher::new(
            transport.clone(),
            UartLinkConfig::default(),
        ));
        (dispatcher, transport)
    }

    #[tokio::test]
    async fn test_receive_notifies_in_framing_order() {
        let (dispatcher, _transport) = new_dispatcher();
        let recorder = Recorder::new();
        dispatcher.subscribe(recorder.clone()).await;

        let peer = PeerId::new();
        dispatcher.on_bytes_received(peer, b"abc\ndef\nxyz").await;

        assert_eq!(recorder.payloads(), vec![b"abc".to_vec(), b"def".to_vec()]);

        dispatcher.on_bytes_received(peer, b"123\n").await;
        assert_eq!(
            recorder.payloads(),
            vec![b"abc".to_vec(), b"def".to_vec(), b"xyz123".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_send_records_and_echoes() {
        let (dispatcher, transport) = new_dispatcher();
        let recorder = Recorder::new();
        dispatcher.subscribe(recorder.clone()).await;

        let peer = PeerId::new();
        dispatcher.attach_peer(peer).await;
        transport.set_ready(peer, true).await;

        dispatcher.send(peer, b"ping\n").await.unwrap();

        let history = dispatcher.packets_cache(peer).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].direction, PacketDirection::Tx);
        assert_eq!(history[0].data, b"ping\n");
        assert_eq!(recorder.payloads(), vec![b"ping\n".to_vec()]);
        assert_eq!(transport.written(peer).await, vec![b"ping\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_send_unknown_peer() {
        let (dispatcher, _transport) = new_dispatcher();

        let result = dispatcher.send(PeerId::new(), b"x").await;
        assert!(matches!(result, Err(UartLinkError::PeerUnknown { .. })));
    }

    #[tokio::test]
    async fn test_send_unready_transport_still_echoes() {
        let (dispatcher, _transport) = new_dispatcher();
        let recorder = Recorder::new();
        dispatcher.subscribe(recorder.clone()).await;

        let peer = PeerId::new();
        dispatcher.attach_peer(peer).await;

        let result = dispatcher.send(peer, b"lost").await;
        assert!(matches!(
            result,
            Err(UartLinkError::TransportUnready { .. })
        ));

        // Local echo and history survive the transport failure
        assert_eq!(recorder.payloads(), vec![b"lost".to_vec()]);
        assert_eq!(dispatcher.packets_cache(peer).await.len(), 1);
    }

    #[tokio::test]
    async fn test_send_text_applies_line_ending() {
        let (dispatcher, transport) = new_dispatcher();
        let peer = PeerId::new();
        dispatcher.attach_peer(peer).await;
        transport.set_ready(peer, true).await;

        dispatcher.send_text(peer, "hello").await.unwrap();

        assert_eq!(transport.written(peer).await, vec![b"hello\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_send_to_all_isolates_failures() {
        let (dispatcher, transport) = new_dispatcher();
        let peer_a = PeerId::new();
        let peer_b = PeerId::new();
        dispatcher.attach_peer(peer_a).await;
        dispatcher.attach_peer(peer_b).await;
        transport.set_ready(peer_b, true).await;

        let reports = dispatcher.send_to_all(&[peer_a, peer_b], b"x\n").await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].peer, peer_a);
        assert_eq!(reports[0].broadcast_index, 0);
        assert!(!reports[0].is_ok());
        assert_eq!(reports[1].peer, peer_b);
        assert_eq!(reports[1].broadcast_index, 1);
        assert!(reports[1].is_ok());
        assert_eq!(transport.written(peer_b).await, vec![b"x\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_broadcast_index_resets_per_broadcast() {
        let (dispatcher, transport) = new_dispatcher();
        let peer = PeerId::new();
        dispatcher.attach_peer(peer).await;
        transport.set_ready(peer, true).await;

        let first = dispatcher.send_to_all(&[peer], b"a\n").await;
        let second = dispatcher.send_to_all(&[peer], b"b\n").await;

        assert_eq!(first[0].broadcast_index, 0);
        assert_eq!(second[0].broadcast_index, 0);
    }

    #[tokio::test]
    async fn test_observer_panic_is_isolated() {
        let (dispatcher, _transport) = new_dispatcher();
        let recorder = Recorder::new();
        dispatcher.subscribe(Arc::new(Panicker)).await;
        dispatcher.subscribe(recorder.clone()).await;

        let peer = PeerId::new();
        dispatcher.on_bytes_received(peer, b"one\ntwo\n").await;

        // The recorder behind the panicking observer still sees every packet
        assert_eq!(recorder.payloads(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (dispatcher, _transport) = new_dispatcher();
        let recorder = Recorder::new();
        let id = dispatcher.subscribe(recorder.clone()).await;

        let peer = PeerId::new();
        dispatcher.on_bytes_received(peer, b"before\n").await;

        assert!(dispatcher.unsubscribe(id).await);
        assert!(!dispatcher.unsubscribe(id).await);

        dispatcher.on_bytes_received(peer, b"after\n").await;
        assert_eq!(recorder.payloads(), vec![b"before".to_vec()]);
    }

    #[tokio::test]
    async fn test_detach_resets_buffer() {
        let (dispatcher, _transport) = new_dispatcher();
        let recorder = Recorder::new();
        dispatcher.subscribe(recorder.clone()).await;

        let peer = PeerId::new();
        dispatcher.on_bytes_received(peer, b"stale").await;
        dispatcher.detach_peer(peer).await;
        assert!(!dispatcher.is_peer_attached(peer).await);

        dispatcher.on_bytes_received(peer, b"fresh\n").await;
        assert_eq!(recorder.payloads(), vec![b"fresh".to_vec()]);
    }

    #[tokio::test]
    async fn test_cache_disabled_dispatcher() {
        let transport = Arc::new(LoopbackTransport::new());
        let mut config = UartLinkConfig::default();
        config.dispatch.cache_enabled = false;
        let dispatcher = UartDispatcher::new(transport.clone(), config);

        let peer = PeerId::new();
        dispatcher.on_bytes_received(peer, b"a\nb\nc\n").await;

        assert!(dispatcher.packets_cache(peer).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_then_record_again() {
        let (dispatcher, _transport) = new_dispatcher();
        let peer = PeerId::new();

        dispatcher.on_bytes_received(peer, b"old\n").await;
        dispatcher.clear_cache(peer).await;
        assert!(dispatcher.packets_cache(peer).await.is_empty());

        dispatcher.on_bytes_received(peer, b"new\n").await;
        let history = dispatcher.packets_cache(peer).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].data, b"new");
    }

    #[tokio::test]
    async fn test_stats_counters() {
        let (dispatcher, transport) = new_dispatcher();
        let peer = PeerId::new();
        dispatcher.attach_peer(peer).await;
        transport.set_ready(peer, true).await;

        dispatcher.on_bytes_received(peer, b"abc\ndef\n").await;
        dispatcher.send(peer, b"ok\n").await.unwrap();

        let stats = dispatcher.stats().await;
        assert_eq!(stats.bytes_received, 8);
        assert_eq!(stats.packets_received, 2);
        assert_eq!(stats.bytes_sent, 3);
        assert_eq!(stats.packets_sent, 1);
    }
}
