//! Point-to-point links between peers.
//!
//! A transport carries opaque byte payloads. Link changes and inbound
//! payloads are reported on the event channel handed out when the transport
//! is constructed, so the coordinator can consume them in one place.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;
pub mod ws;

pub use memory::{MemoryNetwork, MemoryTransport};
pub use ws::WsTransport;

/// Identifier of a peer process. A player's id is the peer id of the
/// process it plays from.
pub type PeerId = String;

/// Something that happened on a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A payload arrived from a linked peer
    Message { from: PeerId, bytes: Vec<u8> },
    /// A link to a peer was established
    PeerJoined(PeerId),
    /// A link to a peer was closed
    PeerLeft(PeerId),
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport not initialized")]
    NotInitialized,

    #[error("Peer id {0} is already in use")]
    IdTaken(PeerId),

    #[error("Peer {0} is unreachable")]
    Unreachable(PeerId),

    #[error("No link to peer {0}")]
    NotConnected(PeerId),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Capability to reach other peers
#[async_trait]
pub trait Transport: Send + Sync {
    /// Register on the network, optionally reusing a saved id, and return
    /// the id other peers reach us by
    async fn initialize(&mut self, id: Option<PeerId>) -> Result<PeerId, TransportError>;

    /// Open a link to a remote peer. May never complete if the peer is
    /// silently unreachable; callers apply their own timeout.
    async fn connect(&self, remote: &PeerId) -> Result<(), TransportError>;

    /// Send a payload over an open link
    fn send(&self, peer: &PeerId, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Send a payload over every open link
    fn broadcast(&self, bytes: &[u8]);

    fn is_connected(&self, peer: &PeerId) -> bool;

    /// Close every link and leave the network
    fn shutdown(&mut self);
}
