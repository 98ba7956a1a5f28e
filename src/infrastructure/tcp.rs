use crate::core::dispatch::UartDispatcher;
use crate::core::packet::PeerId;
use crate::core::transport::UartTransport;
use crate::domain::error::{UartLinkError, UartLinkResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// TCP-backed transport, one connection per peer.
///
/// Stands in for a radio link during bench work against real or simulated
/// devices. Inbound chunks are pushed onto the channel handed out by
/// [`new`](Self::new); wire it to a dispatcher with [`spawn_inbound_pump`].
pub struct TcpUartTransport {
    inbound: mpsc::UnboundedSender<(PeerId, Vec<u8>)>,
    peers: Mutex<HashMap<PeerId, PeerHandle>>,
}

struct PeerHandle {
    tx_sender: mpsc::UnboundedSender<Vec<u8>>,
    _tx_handle: JoinHandle<()>,
    rx_handle: JoinHandle<()>,
}

impl TcpUartTransport {
    /// Create the transport together with its inbound chunk channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(PeerId, Vec<u8>)>) {
        let (inbound, inbound_receiver) = mpsc::unbounded_channel();
        (
            Self {
                inbound,
                peers: Mutex::new(HashMap::new()),
            },
            inbound_receiver,
        )
    }

    /// Open a connection and assign it a fresh peer identifier.
    pub async fn connect(&self, host: &str, port: u16, timeout_ms: u64) -> UartLinkResult<PeerId> {
        let stream = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            TcpStream::connect((host, port)),
        )
        .await
        .map_err(|_| UartLinkError::Transport {
            message: format!("Connection timeout to {}:{}", host, port),
        })??;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let peer = PeerId::new();
        info!("TCP connection to {}:{} established as peer {}", host, port, peer);

        let (mut read_half, mut write_half) = stream.into_split();
        let (tx_sender, mut tx_receiver) = mpsc::unbounded_channel::<Vec<u8>>();
        let inbound = self.inbound.clone();

        // TX task - handles outgoing buffers
        let tx_handle = tokio::spawn(async move {
            while let Some(data) = tx_receiver.recv().await {
                match write_half.write_all(&data).await {
                    Ok(_) => {
                        if let Err(e) = write_half.flush().await {
                            error!("Failed to flush TCP stream: {}", e);
                            break;
                        }
                        debug!("Sent {} byte(s) over TCP", data.len());
                    }
                    Err(e) => {
                        error!("Failed to write to TCP stream: {}", e);
                        break;
                    }
                }
            }
        });

        // RX task - forwards raw chunks to the inbound channel
        let rx_handle = tokio::spawn(async move {
            let mut buffer = vec![0u8; 4096];

            loop {
                match read_half.read(&mut buffer).await {
                    Ok(0) => {
                        info!("TCP connection closed by peer {}", peer);
                        break;
                    }
                    Ok(n) => {
                        debug!("Received {} byte(s) over TCP", n);
                        if inbound.send((peer, buffer[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to read from TCP stream: {}", e);
                        break;
                    }
                }
            }
        });

        let mut peers = self.peers.lock().await;
        peers.insert(
            peer,
            PeerHandle {
                tx_sender,
                _tx_handle: tx_handle,
                rx_handle,
            },
        );

        Ok(peer)
    }

    /// Tear down a peer's connection.
    pub async fn disconnect(&self, peer: PeerId) -> UartLinkResult<()> {
        let mut peers = self.peers.lock().await;
        match peers.remove(&peer) {
            Some(handle) => {
                // Dropping the sender lets the TX task drain and exit
                drop(handle.tx_sender);
                handle.rx_handle.abort();
                info!("Peer {} disconnected", peer);
                Ok(())
            }
            None => Err(UartLinkError::PeerUnknown { peer }),
        }
    }
}

#[async_trait]
impl UartTransport for TcpUartTransport {
    async fn write(&self, peer: PeerId, data: &[u8]) -> UartLinkResult<()> {
        let peers = self.peers.lock().await;
        let handle = peers
            .get(&peer)
            .ok_or(UartLinkError::TransportUnready { peer })?;

        handle
            .tx_sender
            .send(data.to_vec())
            .map_err(|_| UartLinkError::Transport {
                message: format!("TX channel closed for peer {}", peer),
            })
    }

    async fn is_ready(&self, peer: PeerId) -> bool {
        let peers = self.peers.lock().await;
        peers
            .get(&peer)
            .map_or(false, |handle| !handle.tx_sender.is_closed())
    }
}

/// Forward inbound transport chunks into the dispatcher until the
/// transport side closes.
pub fn spawn_inbound_pump(
    dispatcher: Arc<UartDispatcher>,
    mut inbound: mpsc::UnboundedReceiver<(PeerId, Vec<u8>)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((peer, chunk)) = inbound.recv().await {
            dispatcher.on_bytes_received(peer, &chunk).await;
        }
    })
}
