//! WebSocket gateway using `tokio-tungstenite`.
//!
//! The gateway turns a set of WebSocket clients into one pub/sub
//! endpoint: frames from any socket feed a single [`GatewaySubscriber`],
//! and every publish is fanned out to every open socket. The topic name
//! is only used for logging.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionId, Publisher, Subscriber, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Inbound frames buffered before socket readers start waiting.
const INBOUND_CAPACITY: usize = 1024;

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

type Peers = Arc<Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Vec<u8>>>>>;

fn lock(peers: &Peers) -> MutexGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<Vec<u8>>>> {
    peers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A WebSocket listener acting as both ends of the bus.
///
/// Dropping the gateway stops accepting and closes every open socket.
pub struct WebSocketGateway {
    local_addr: SocketAddr,
    peers: Peers,
    accept_task: JoinHandle<()>,
}

impl WebSocketGateway {
    /// Binds the gateway and starts accepting connections.
    ///
    /// Returns the gateway (the publishing side) and the subscriber that
    /// yields every frame received from any client.
    ///
    /// # Errors
    /// Returns `TransportError::Bind` if the address can't be bound.
    pub async fn bind(addr: &str) -> Result<(Self, GatewaySubscriber), TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::Bind)?;
        let local_addr = listener.local_addr().map_err(TransportError::Bind)?;
        tracing::info!(%local_addr, "WebSocket gateway listening");

        let peers = Peers::default();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&peers), inbound_tx));

        let gateway = Self {
            local_addr,
            peers,
            accept_task,
        };
        Ok((gateway, GatewaySubscriber { rx: inbound_rx }))
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of sockets currently receiving publishes.
    pub fn connection_count(&self) -> usize {
        lock(&self.peers).len()
    }
}

impl Drop for WebSocketGateway {
    fn drop(&mut self) {
        self.accept_task.abort();
        // Dropping the senders makes each connection task close its socket.
        lock(&self.peers).clear();
    }
}

impl Publisher for WebSocketGateway {
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<(), TransportError> {
        let mut peers = lock(&self.peers);
        peers.retain(|_, tx| tx.send(data.to_vec()).is_ok());
        tracing::trace!(topic, peers = peers.len(), "published to gateway");
        Ok(())
    }
}

/// Every frame received by a [`WebSocketGateway`], in arrival order.
#[derive(Debug)]
pub struct GatewaySubscriber {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Subscriber for GatewaySubscriber {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

// ---------------------------------------------------------------------------
// Connection tasks
// ---------------------------------------------------------------------------

async fn accept_loop(listener: TcpListener, peers: Peers, inbound: mpsc::Sender<Vec<u8>>) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let peers = Arc::clone(&peers);
        let inbound = inbound.clone();
        tokio::spawn(async move {
            let ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "WebSocket handshake failed");
                    return;
                }
            };
            let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
            tracing::debug!(%id, %addr, "accepted WebSocket connection");
            serve_connection(id, ws, peers, inbound).await;
        });
    }
}

async fn serve_connection(
    id: ConnectionId,
    ws: WebSocketStream<TcpStream>,
    peers: Peers,
    inbound: mpsc::Sender<Vec<u8>>,
) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    lock(&peers).insert(id, outbound_tx);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            frame = stream.next() => {
                let data: Vec<u8> = match frame {
                    Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(Message::Binary(data))) => data.into(),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // ping/pong/raw frame
                    Some(Err(e)) => {
                        tracing::debug!(%id, error = %e, "receive failed");
                        break;
                    }
                };
                if inbound.send(data).await.is_err() {
                    break;
                }
            }
            outgoing = outbound_rx.recv() => {
                let Some(data) = outgoing else {
                    let _ = sink.close().await;
                    break;
                };
                if let Err(e) = sink.send(frame_for(data)).await {
                    tracing::debug!(%id, error = %e, "send failed");
                    break;
                }
            }
        }
    }

    lock(&peers).remove(&id);
    tracing::debug!(%id, "WebSocket connection closed");
}

/// JSON envelopes go out as text frames; anything else as binary.
fn frame_for(data: Vec<u8>) -> Message {
    match String::from_utf8(data) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}
