//! Borako peer-to-peer networking.
//!
//! This crate replicates a `borako_core::GameState` across peers:
//! - [`transport`]: abstract point-to-point links, with in-memory and
//!   WebSocket implementations
//! - [`protocol`]: the message envelope carried over a link
//! - [`coordinator`]: host-authoritative replication and the grace period
//!   for vanished peers
//! - [`session`]: persistence blob for resuming after a restart
//! - [`config`]: environment configuration

pub mod config;
pub mod coordinator;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{ConfigError, CoordinatorConfig, PeerConfig};
pub use coordinator::{Coordinator, CoordinatorError, Dispatch};
pub use protocol::{Envelope, Handshake};
pub use session::Session;
pub use transport::{
    EventReceiver, MemoryNetwork, MemoryTransport, PeerId, Transport, TransportError,
    TransportEvent, WsTransport,
};
