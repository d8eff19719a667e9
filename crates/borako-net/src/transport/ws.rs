//! WebSocket transport for direct peer links.
//!
//! Every peer listens on a TCP port that others dial as `ws://host:port`.
//! Peer ids are generated, since a listening address such as `0.0.0.0:9000`
//! says nothing about which machine is behind it. A dialing peer opens with a
//! `HELLO` frame carrying its own id; the dialer in turn knows the listener by
//! the URL it dialed. Payloads travel as binary frames.

use super::{EventReceiver, EventSender, PeerId, Transport, TransportError, TransportEvent};
use crate::protocol::Handshake;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, connect_async, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long a listener waits for the `HELLO` frame
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

type LinkSender = mpsc::UnboundedSender<Message>;

/// State shared with the per-connection tasks
struct Shared {
    /// Outgoing frame queue of every open link
    links: DashMap<PeerId, LinkSender>,
    events: EventSender,
}

pub struct WsTransport {
    bind_addr: SocketAddr,
    local_addr: Option<SocketAddr>,
    id: Option<PeerId>,
    shared: Arc<Shared>,
    listener: Option<JoinHandle<()>>,
}

impl WsTransport {
    /// Create a transport that will listen on `bind_addr` once initialized
    pub fn new(bind_addr: SocketAddr) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Self {
            bind_addr,
            local_addr: None,
            id: None,
            shared: Arc::new(Shared {
                links: DashMap::new(),
                events,
            }),
            listener: None,
        };
        (transport, rx)
    }

    /// Address the listener is bound to, once initialized
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn initialize(&mut self, id: Option<PeerId>) -> Result<PeerId, TransportError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        info!("Peer {} listening on ws://{}", id, local_addr);

        let shared = Arc::clone(&self.shared);
        self.listener = Some(tokio::spawn(accept_loop(listener, shared)));
        self.local_addr = Some(local_addr);
        self.id = Some(id.clone());
        Ok(id)
    }

    async fn connect(&self, remote: &PeerId) -> Result<(), TransportError> {
        let local = self.id.clone().ok_or(TransportError::NotInitialized)?;
        if self.shared.links.contains_key(remote) {
            return Ok(());
        }

        let (mut ws, _) = connect_async(remote.as_str()).await?;
        let hello = serde_json::to_string(&Handshake::Hello { peer_id: local })
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        ws.send(Message::Text(hello)).await?;

        info!("Connected to {}", remote);
        let link = register(&self.shared, remote.clone());
        tokio::spawn(run_link(ws, link, Arc::clone(&self.shared)));
        Ok(())
    }

    fn send(&self, peer: &PeerId, bytes: Vec<u8>) -> Result<(), TransportError> {
        let link = self
            .shared
            .links
            .get(peer)
            .ok_or_else(|| TransportError::NotConnected(peer.clone()))?;
        link.send(Message::Binary(bytes))
            .map_err(|_| TransportError::NotConnected(peer.clone()))
    }

    fn broadcast(&self, bytes: &[u8]) {
        for link in self.shared.links.iter() {
            let _ = link.send(Message::Binary(bytes.to_vec()));
        }
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        self.shared.links.contains_key(peer)
    }

    fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        for link in self.shared.links.iter() {
            let _ = link.send(Message::Close(None));
        }
        self.shared.links.clear();
        self.local_addr = None;
        self.id = None;
    }
}

/// Accept incoming links until the listener task is aborted
async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    while let Ok((stream, addr)) = listener.accept().await {
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            if let Err(e) = accept_link(stream, shared).await {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Upgrade an incoming connection and wait for the dialer's `HELLO`
async fn accept_link(stream: TcpStream, shared: Arc<Shared>) -> Result<(), TransportError> {
    let mut ws = accept_async(stream).await?;

    let first = tokio::time::timeout(HANDSHAKE_TIMEOUT, ws.next())
        .await
        .map_err(|_| TransportError::Handshake("timed out waiting for HELLO".into()))?;
    let peer_id = match first {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<Handshake>(&text) {
            Ok(Handshake::Hello { peer_id }) => peer_id,
            Err(e) => return Err(TransportError::Handshake(e.to_string())),
        },
        Some(Ok(other)) => {
            return Err(TransportError::Handshake(format!(
                "expected HELLO, got {:?}",
                other
            )))
        }
        Some(Err(e)) => return Err(e.into()),
        None => return Err(TransportError::Handshake("closed before HELLO".into())),
    };

    info!("Accepted link from {}", peer_id);
    let link = register(&shared, peer_id);
    run_link(ws, link, shared).await;
    Ok(())
}

/// A registered link: the peer and its outgoing frame queue
struct Link {
    peer_id: PeerId,
    tx: LinkSender,
    rx: mpsc::UnboundedReceiver<Message>,
}

/// Make a link visible to `send` and announce it
fn register(shared: &Shared, peer_id: PeerId) -> Link {
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    if let Some(stale) = shared.links.insert(peer_id.clone(), tx.clone()) {
        let _ = stale.send(Message::Close(None));
    }
    let _ = shared.events.send(TransportEvent::PeerJoined(peer_id.clone()));
    Link { peer_id, tx, rx }
}

/// Pump frames for one link until either side closes it
async fn run_link<S>(ws: WebSocketStream<S>, link: Link, shared: Arc<Shared>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Link {
        peer_id,
        tx,
        mut rx,
    } = link;
    let (mut ws_sender, mut ws_receiver) = ws.split();

    // Spawn task to forward frames from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Binary(bytes)) => {
                let _ = shared.events.send(TransportEvent::Message {
                    from: peer_id.clone(),
                    bytes,
                });
            }
            Ok(Message::Text(text)) => {
                let _ = shared.events.send(TransportEvent::Message {
                    from: peer_id.clone(),
                    bytes: text.into_bytes(),
                });
            }
            Ok(Message::Close(_)) => {
                debug!("Peer {} closing link", peer_id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error from {}: {}", peer_id, e);
                break;
            }
        }
    }

    // A newer link for the same peer may have replaced this one
    let removed = shared
        .links
        .remove_if(&peer_id, |_, link| link.same_channel(&tx))
        .is_some();
    send_task.abort();

    if removed {
        info!("Link to {} closed", peer_id);
        let _ = shared.events.send(TransportEvent::PeerLeft(peer_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    async fn listening() -> (WsTransport, EventReceiver, PeerId, String) {
        let (mut transport, events) = WsTransport::new("127.0.0.1:0".parse().unwrap());
        let id = transport.initialize(None).await.unwrap();
        let url = format!("ws://{}", transport.local_addr().unwrap());
        (transport, events, id, url)
    }

    async fn next(events: &mut EventReceiver) -> TransportEvent {
        tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_ids_are_not_derived_from_the_address() {
        let (a, _a_events, a_id, _) = listening().await;
        let (b, _b_events, b_id, _) = listening().await;

        assert_ne!(a_id, b_id);
        assert!(!a_id.starts_with("ws://"));
        assert!(a.local_addr().is_some());
        assert!(b.local_addr().is_some());
    }

    #[tokio::test]
    async fn test_hello_names_the_dialer() {
        let (a, mut a_events, _, a_url) = listening().await;
        let (b, mut b_events, b_id, _) = listening().await;

        b.connect(&a_url).await.unwrap();
        assert!(matches!(next(&mut b_events).await, TransportEvent::PeerJoined(p) if p == a_url));
        assert!(matches!(next(&mut a_events).await, TransportEvent::PeerJoined(p) if p == b_id));

        b.send(&a_url, b"ping".to_vec()).unwrap();
        match next(&mut a_events).await {
            TransportEvent::Message { from, bytes } => {
                assert_eq!(from, b_id);
                assert_eq!(bytes, b"ping".to_vec());
            }
            other => panic!("unexpected event {:?}", other),
        }

        a.send(&b_id, b"pong".to_vec()).unwrap();
        match next(&mut b_events).await {
            TransportEvent::Message { from, bytes } => {
                assert_eq!(from, a_url);
                assert_eq!(bytes, b"pong".to_vec());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reconnect_under_same_id_replaces_stale_link() {
        let (a, mut a_events, _, a_url) = listening().await;
        let (old, mut old_events, b_id, _) = listening().await;

        old.connect(&a_url).await.unwrap();
        next(&mut old_events).await;
        next(&mut a_events).await;

        // Same peer id coming back from a fresh process
        let (mut fresh, mut fresh_events) = WsTransport::new("127.0.0.1:0".parse().unwrap());
        fresh.initialize(Some(b_id.clone())).await.unwrap();
        fresh.connect(&a_url).await.unwrap();
        next(&mut fresh_events).await;
        assert!(matches!(next(&mut a_events).await, TransportEvent::PeerJoined(p) if p == b_id));

        // The old link is closed from the listener's side
        assert!(matches!(next(&mut old_events).await, TransportEvent::PeerLeft(p) if p == a_url));

        a.send(&b_id, b"hello again".to_vec()).unwrap();
        match next(&mut fresh_events).await {
            TransportEvent::Message { from, bytes } => {
                assert_eq!(from, a_url);
                assert_eq!(bytes, b"hello again".to_vec());
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Closing the replaced link does not unseat the peer
        assert!(a.is_connected(&b_id));
        assert!(
            tokio::time::timeout(Duration::from_millis(200), a_events.recv())
                .await
                .is_err()
        );
    }
}
