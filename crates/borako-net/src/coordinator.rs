//! Replication coordinator.
//!
//! One peer hosts and owns the authoritative `GameState`. Every other peer
//! keeps a mirror that is replaced wholesale by the host's snapshots. Intents
//! submitted on a client are forwarded to the host, which applies them and
//! broadcasts the resulting state to everyone.

use crate::config::CoordinatorConfig;
use crate::protocol::Envelope;
use crate::session::Session;
use crate::transport::{EventReceiver, PeerId, Transport, TransportError, TransportEvent};
use borako_core::{GameAction, GameError, GameState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Could not reach {peer} after {attempts} attempts")]
    ConnectFailed { peer: PeerId, attempts: u32 },

    #[error("Not connected to a host")]
    NoHost,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What became of a dispatched intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Applied to the local state
    Applied,
    /// Refused by the local state machine
    Rejected(GameError),
    /// Sent to the host
    Forwarded,
}

/// A seated peer that vanished and may still come back
#[derive(Debug, Clone)]
struct Departure {
    peer: PeerId,
    deadline: Instant,
}

pub struct Coordinator<T: Transport> {
    transport: T,
    config: CoordinatorConfig,
    state: GameState,
    peer_id: PeerId,
    host_id: Option<PeerId>,
    is_connected: bool,
    departures: Vec<Departure>,
    rng: StdRng,
    snapshots: watch::Sender<GameState>,
}

impl<T: Transport> Coordinator<T> {
    fn with_parts(
        transport: T,
        config: CoordinatorConfig,
        peer_id: PeerId,
        host_id: Option<PeerId>,
        state: GameState,
    ) -> Self {
        let (snapshots, _) = watch::channel(state.clone());
        Self {
            transport,
            config,
            state,
            peer_id,
            is_connected: host_id.is_some(),
            host_id,
            departures: Vec::new(),
            rng: StdRng::from_entropy(),
            snapshots,
        }
    }

    /// Open a table with the local player as host
    pub async fn host(
        mut transport: T,
        config: CoordinatorConfig,
        name: String,
        team_a_name: Option<String>,
        team_b_name: Option<String>,
    ) -> Result<Self, CoordinatorError> {
        let peer_id = transport.initialize(None).await?;
        let mut coordinator = Self::with_parts(
            transport,
            config,
            peer_id.clone(),
            Some(peer_id.clone()),
            GameState::new(),
        );

        coordinator.apply(GameAction::InitGame {
            player_id: peer_id.clone(),
            host_name: name,
            team_a_name,
            team_b_name,
        });
        info!("Hosting as {}", peer_id);
        Ok(coordinator)
    }

    /// Connect to a host and ask for a seat
    pub async fn join(
        mut transport: T,
        config: CoordinatorConfig,
        host: PeerId,
        name: String,
    ) -> Result<Self, CoordinatorError> {
        let peer_id = transport.initialize(None).await?;
        connect_with_retry(&transport, &host, &config).await?;

        let coordinator = Self::with_parts(
            transport,
            config,
            peer_id.clone(),
            Some(host.clone()),
            GameState::new(),
        );
        coordinator.send_to_host(GameAction::JoinGame {
            player_id: peer_id.clone(),
            name,
        })?;
        info!("Joined {} as {}", host, peer_id);
        Ok(coordinator)
    }

    /// Pick up a saved session under the same peer id
    pub async fn resume(
        mut transport: T,
        config: CoordinatorConfig,
        session: Session,
    ) -> Result<Self, CoordinatorError> {
        let peer_id = transport.initialize(Some(session.peer_id.clone())).await?;

        let host_id = match session.host_id {
            Some(host) if host == peer_id => Some(host),
            Some(host) => {
                connect_with_retry(&transport, &host, &config).await?;
                Some(host)
            }
            None => None,
        };

        info!("Resumed session as {}", peer_id);
        Ok(Self::with_parts(transport, config, peer_id, host_id, session.state))
    }

    /// Use a fixed seed for shuffles and starter choice
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn host_id(&self) -> Option<&PeerId> {
        self.host_id.as_ref()
    }

    pub fn is_host(&self) -> bool {
        self.host_id.as_ref() == Some(&self.peer_id)
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Receive every new mirror state
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.snapshots.subscribe()
    }

    /// Snapshot of everything needed to resume later
    pub fn session(&self) -> Session {
        Session {
            state: self.state.clone(),
            peer_id: self.peer_id.clone(),
            host_id: self.host_id.clone(),
            is_connected: self.is_connected,
        }
    }

    /// Submit an intent from the local participant. A peer that lost its
    /// host has nowhere to send intents and gets `NoHost`.
    pub fn dispatch(&mut self, action: GameAction) -> Result<Dispatch, CoordinatorError> {
        if self.is_host() {
            let outcome = self.apply(action);
            if outcome == Dispatch::Applied {
                self.broadcast_state()?;
            }
            return Ok(outcome);
        }

        // Own hand order is shown at once; the host's snapshot settles it
        if let GameAction::ReorderHand { player_id, .. } = &action {
            if *player_id == self.peer_id {
                if let Dispatch::Rejected(e) = self.apply(action.clone()) {
                    return Ok(Dispatch::Rejected(e));
                }
            }
        }

        self.send_to_host(action)?;
        Ok(Dispatch::Forwarded)
    }

    /// Seat a bot placeholder in the lobby
    pub fn add_bot(&mut self, name: String) -> Result<Dispatch, CoordinatorError> {
        if !self.is_host() {
            return Err(CoordinatorError::NotHost);
        }
        let player_id = format!("bot-{}", Uuid::new_v4().simple());
        self.dispatch(GameAction::JoinGame { player_id, name })
    }

    /// Give up the seat, close every link and forget the table. Unlike a
    /// dropped link this takes effect at once, without a grace period.
    pub fn leave(&mut self) {
        info!("Leaving table");
        let player_id = self.peer_id.clone();
        if self.state.get_player(&player_id).is_some() {
            let action = GameAction::PlayerLeft { player_id };
            if self.is_host() {
                if self.apply(action) == Dispatch::Applied {
                    if let Err(e) = self.broadcast_state() {
                        warn!("Could not broadcast state: {}", e);
                    }
                }
            } else if let Err(e) = self.send_to_host(action) {
                warn!("Could not tell the host we are leaving: {}", e);
            }
        }

        self.transport.shutdown();
        self.host_id = None;
        self.is_connected = false;
        self.departures.clear();
        self.replace_state(GameState::new());
    }

    /// React to one transport event
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message { from, bytes } => match Envelope::decode(&bytes) {
                Ok(envelope) => self.handle_envelope(from, envelope),
                Err(e) => warn!("Dropping malformed message from {}: {}", from, e),
            },

            TransportEvent::PeerJoined(peer) => {
                if self.is_host() {
                    if self.cancel_departure(&peer) {
                        info!("Peer {} reconnected", peer);
                    } else {
                        info!("Peer {} connected", peer);
                    }
                    if let Err(e) = self.broadcast_state() {
                        warn!("Could not send state to {}: {}", peer, e);
                    }
                } else if self.host_id.as_ref() == Some(&peer) {
                    self.is_connected = true;
                }
            }

            TransportEvent::PeerLeft(peer) => {
                if self.is_host() {
                    if self.state.get_player(&peer).is_some() {
                        let deadline = Instant::now() + self.config.grace_period;
                        info!("Peer {} disconnected; holding seat until grace period ends", peer);
                        self.cancel_departure(&peer);
                        self.departures.push(Departure { peer, deadline });
                    } else {
                        debug!("Unseated peer {} disconnected", peer);
                    }
                } else if self.host_id.as_ref() == Some(&peer) {
                    warn!("Lost connection to host {}", peer);
                    self.host_id = None;
                    self.is_connected = false;
                    let mut reset = GameState::new();
                    reset.logs.push("Lost connection to the host".to_string());
                    self.replace_state(reset);
                }
            }
        }
    }

    fn handle_envelope(&mut self, from: PeerId, envelope: Envelope) {
        match envelope {
            Envelope::StateUpdate(state) => {
                if self.is_host() {
                    warn!("Ignoring snapshot from {}", from);
                } else if self.host_id.as_ref() == Some(&from) {
                    self.replace_state(*state);
                }
            }

            Envelope::Action(action) => {
                if !self.is_host() {
                    debug!("Ignoring {} from {}; not hosting", action.name(), from);
                    return;
                }
                if action.is_local_only() || action.actor() != Some(&from) {
                    warn!("Refusing {} from {}", action.name(), from);
                    return;
                }

                let name = action.name();
                match self.apply(action) {
                    Dispatch::Applied => {
                        debug!("Applied {} from {}", name, from);
                        if let Err(e) = self.broadcast_state() {
                            warn!("Could not broadcast state: {}", e);
                        }
                    }
                    Dispatch::Rejected(e) => debug!("Rejected {} from {}: {}", name, from, e),
                    Dispatch::Forwarded => {}
                }
            }
        }
    }

    /// Earliest pending grace-period expiry
    pub fn next_deadline(&self) -> Option<Instant> {
        self.departures.iter().map(|d| d.deadline).min()
    }

    /// Remove every seated peer whose grace period ended before `now`
    /// without a reconnection
    pub fn poll_departures(&mut self, now: Instant) {
        let (due, pending): (Vec<Departure>, Vec<Departure>) = std::mem::take(&mut self.departures)
            .into_iter()
            .partition(|d| d.deadline <= now);
        self.departures = pending;

        for departure in due {
            if self.transport.is_connected(&departure.peer) {
                continue;
            }
            info!("Grace period over for {}", departure.peer);
            let outcome = self.apply(GameAction::PlayerLeft {
                player_id: departure.peer,
            });
            if outcome == Dispatch::Applied {
                if let Err(e) = self.broadcast_state() {
                    warn!("Could not broadcast state: {}", e);
                }
            }
        }
    }

    /// Serve transport events, local intents and grace-period expiries
    /// until either channel closes. Returns the final session.
    pub async fn run(
        mut self,
        mut events: EventReceiver,
        mut intents: mpsc::UnboundedReceiver<GameAction>,
    ) -> Result<Session, CoordinatorError> {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                intent = intents.recv() => match intent {
                    Some(action) => {
                        let name = action.name();
                        match self.dispatch(action) {
                            Ok(Dispatch::Rejected(e)) => warn!("{} rejected: {}", name, e),
                            Ok(_) => debug!("{} dispatched", name),
                            Err(e) => warn!("{} failed: {}", name, e),
                        }
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.poll_departures(Instant::now());
                }
            }
        }

        let session = self.session();
        self.transport.shutdown();
        Ok(session)
    }

    // ==================== Helper Methods ====================

    fn apply(&mut self, action: GameAction) -> Dispatch {
        match self.state.apply_action(action, &mut self.rng) {
            Ok(()) => {
                self.snapshots.send_replace(self.state.clone());
                Dispatch::Applied
            }
            Err(e) => Dispatch::Rejected(e),
        }
    }

    fn replace_state(&mut self, state: GameState) {
        self.state = state;
        self.snapshots.send_replace(self.state.clone());
    }

    fn broadcast_state(&self) -> Result<(), CoordinatorError> {
        let bytes = Envelope::StateUpdate(Box::new(self.state.clone())).encode()?;
        self.transport.broadcast(&bytes);
        Ok(())
    }

    fn send_to_host(&self, action: GameAction) -> Result<(), CoordinatorError> {
        let host = self.host_id.as_ref().ok_or(CoordinatorError::NoHost)?;
        let bytes = Envelope::Action(action).encode()?;
        self.transport.send(host, bytes)?;
        Ok(())
    }

    fn cancel_departure(&mut self, peer: &str) -> bool {
        let before = self.departures.len();
        self.departures.retain(|d| d.peer != peer);
        self.departures.len() != before
    }
}

/// Dial a peer, giving each attempt `connect_timeout`
async fn connect_with_retry<T: Transport>(
    transport: &T,
    peer: &PeerId,
    config: &CoordinatorConfig,
) -> Result<(), CoordinatorError> {
    let attempts = config.connect_retries + 1;
    for attempt in 1..=attempts {
        match timeout(config.connect_timeout, transport.connect(peer)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => warn!("Connection attempt {}/{} to {} failed: {}", attempt, attempts, peer, e),
            Err(_) => warn!("Connection attempt {}/{} to {} timed out", attempt, attempts, peer),
        }
    }
    Err(CoordinatorError::ConnectFailed {
        peer: peer.clone(),
        attempts,
    })
}
