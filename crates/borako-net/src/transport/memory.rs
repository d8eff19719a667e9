//! In-process transport.
//!
//! All peers share one `MemoryNetwork`. Deliveries are synchronous pushes
//! onto the receiver's event channel, which keeps tests deterministic. The
//! network can sever and re-link pairs of peers and mark peers unreachable.

use super::{EventReceiver, EventSender, PeerId, Transport, TransportError, TransportEvent};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct NetworkInner {
    /// Event channel of every registered peer
    peers: DashMap<PeerId, EventSender>,
    /// Open links, stored with the smaller id first
    links: DashSet<(PeerId, PeerId)>,
    /// Peers whose connection attempts never complete
    unreachable: DashSet<PeerId>,
}

/// Shared switchboard for in-process peers
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

fn link_key(a: &str, b: &str) -> (PeerId, PeerId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport attached to this network
    pub fn transport(&self) -> (MemoryTransport, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = MemoryTransport {
            network: self.clone(),
            id: None,
            events,
        };
        (transport, rx)
    }

    pub fn is_linked(&self, a: &str, b: &str) -> bool {
        self.inner.links.contains(&link_key(a, b))
    }

    /// Drop the link between two peers, notifying both sides
    pub fn sever(&self, a: &str, b: &str) {
        if self.inner.links.remove(&link_key(a, b)).is_some() {
            debug!("Severed link {} <-> {}", a, b);
            self.deliver(a, TransportEvent::PeerLeft(b.to_string()));
            self.deliver(b, TransportEvent::PeerLeft(a.to_string()));
        }
    }

    /// Restore a link between two registered peers, notifying both sides
    pub fn relink(&self, a: &str, b: &str) {
        if !self.inner.peers.contains_key(a) || !self.inner.peers.contains_key(b) {
            return;
        }
        if self.inner.links.insert(link_key(a, b)) {
            debug!("Re-linked {} <-> {}", a, b);
            self.deliver(a, TransportEvent::PeerJoined(b.to_string()));
            self.deliver(b, TransportEvent::PeerJoined(a.to_string()));
        }
    }

    /// Make connection attempts to a peer hang, or stop doing so
    pub fn set_unreachable(&self, peer: &str, unreachable: bool) {
        if unreachable {
            self.inner.unreachable.insert(peer.to_string());
        } else {
            self.inner.unreachable.remove(peer);
        }
    }

    fn deliver(&self, to: &str, event: TransportEvent) {
        if let Some(sender) = self.inner.peers.get(to) {
            let _ = sender.send(event);
        }
    }

    fn links_of(&self, peer: &str) -> Vec<PeerId> {
        self.inner
            .links
            .iter()
            .filter_map(|link| {
                let (a, b) = link.key();
                if a == peer {
                    Some(b.clone())
                } else if b == peer {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A peer's handle on a `MemoryNetwork`
pub struct MemoryTransport {
    network: MemoryNetwork,
    id: Option<PeerId>,
    events: EventSender,
}

impl MemoryTransport {
    fn local_id(&self) -> Result<&PeerId, TransportError> {
        self.id.as_ref().ok_or(TransportError::NotInitialized)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn initialize(&mut self, id: Option<PeerId>) -> Result<PeerId, TransportError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let inner = &self.network.inner;
        if inner.peers.contains_key(&id) {
            return Err(TransportError::IdTaken(id));
        }
        inner.peers.insert(id.clone(), self.events.clone());
        self.id = Some(id.clone());
        Ok(id)
    }

    async fn connect(&self, remote: &PeerId) -> Result<(), TransportError> {
        let local = self.local_id()?.clone();
        let inner = &self.network.inner;

        if inner.unreachable.contains(remote) {
            std::future::pending::<()>().await;
        }
        if !inner.peers.contains_key(remote) {
            return Err(TransportError::Unreachable(remote.clone()));
        }

        self.network.relink(&local, remote);
        Ok(())
    }

    fn send(&self, peer: &PeerId, bytes: Vec<u8>) -> Result<(), TransportError> {
        let local = self.local_id()?;
        if !self.network.is_linked(local, peer) {
            return Err(TransportError::NotConnected(peer.clone()));
        }
        self.network.deliver(
            peer,
            TransportEvent::Message {
                from: local.clone(),
                bytes,
            },
        );
        Ok(())
    }

    fn broadcast(&self, bytes: &[u8]) {
        let Ok(local) = self.local_id() else {
            return;
        };
        for peer in self.network.links_of(local) {
            self.network.deliver(
                &peer,
                TransportEvent::Message {
                    from: local.clone(),
                    bytes: bytes.to_vec(),
                },
            );
        }
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        match &self.id {
            Some(local) => self.network.is_linked(local, peer),
            None => false,
        }
    }

    fn shutdown(&mut self) {
        let Some(local) = self.id.take() else {
            return;
        };
        for peer in self.network.links_of(&local) {
            self.network.sever(&local, &peer);
        }
        self.network.inner.peers.remove(&local);
    }
}
