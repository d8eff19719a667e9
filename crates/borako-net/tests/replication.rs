//! Replication tests over the in-memory transport.
//!
//! Events are pumped by hand so every interleaving is deterministic.

use borako_core::{GameAction, GameError, GamePhase, GameState, TeamId};
use borako_net::{
    Coordinator, CoordinatorConfig, CoordinatorError, Dispatch, EventReceiver, MemoryNetwork,
    MemoryTransport, Session, Transport,
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

struct Peer {
    coordinator: Coordinator<MemoryTransport>,
    events: EventReceiver,
}

impl Peer {
    fn id(&self) -> String {
        self.coordinator.peer_id().clone()
    }

    fn state(&self) -> &GameState {
        self.coordinator.state()
    }

    fn dispatch(&mut self, action: GameAction) -> Dispatch {
        self.coordinator.dispatch(action).unwrap()
    }

    /// Handle every queued event, returning how many there were
    fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.coordinator.handle_event(event);
            handled += 1;
        }
        handled
    }
}

/// Pump all peers until no events remain
fn settle(peers: &mut [&mut Peer]) {
    loop {
        let handled: usize = peers.iter_mut().map(|p| p.pump()).sum();
        if handled == 0 {
            break;
        }
    }
}

async fn host(network: &MemoryNetwork) -> Peer {
    let (transport, events) = network.transport();
    let coordinator = Coordinator::host(
        transport,
        CoordinatorConfig::default(),
        "Host".into(),
        None,
        Some("Night Owls".into()),
    )
    .await
    .unwrap()
    .with_seed(42);
    Peer {
        coordinator,
        events,
    }
}

async fn join(network: &MemoryNetwork, host: &Peer, name: &str) -> Peer {
    let (transport, events) = network.transport();
    let coordinator =
        Coordinator::join(transport, CoordinatorConfig::default(), host.id(), name.into())
            .await
            .unwrap();
    Peer {
        coordinator,
        events,
    }
}

fn start(host: &mut Peer) {
    let action = GameAction::StartGame {
        player_id: host.id(),
    };
    assert_eq!(host.dispatch(action), Dispatch::Applied);
}

#[tokio::test]
async fn test_join_replicates_lobby() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);

    assert_eq!(host.state().players.len(), 2);
    assert_eq!(guest.state(), host.state());
    assert_eq!(guest.state().teams.b.name, "Night Owls");
    assert_eq!(
        guest.state().get_player(&guest.id()).unwrap().team_id,
        TeamId::B
    );
    assert!(guest.coordinator.is_connected());
    assert!(!guest.coordinator.is_host());
}

#[tokio::test]
async fn test_client_intent_is_forwarded_and_applied_by_host() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest]);
    assert_eq!(guest.state().phase, GamePhase::Playing);

    let current = guest.state().current_turn_player_id.clone().unwrap();
    let (actor, other) = if current == guest.id() {
        (&mut guest, &mut host)
    } else {
        (&mut host, &mut guest)
    };
    let outcome = actor.dispatch(GameAction::DrawCard {
        player_id: current.clone(),
    });
    if actor.coordinator.is_host() {
        assert_eq!(outcome, Dispatch::Applied);
    } else {
        assert_eq!(outcome, Dispatch::Forwarded);
    }
    settle(&mut [actor, other]);

    assert_eq!(guest.state(), host.state());
    assert_eq!(
        host.state().get_player(&current).unwrap().hand.len(),
        12
    );
}

#[tokio::test]
async fn test_rejected_intent_changes_nothing() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest]);

    let waiting = host
        .state()
        .players
        .iter()
        .find(|p| Some(&p.id) != host.state().current_turn_player_id.as_ref())
        .unwrap()
        .id
        .clone();
    let before = host.state().clone();

    if waiting == host.id() {
        assert_eq!(
            host.dispatch(GameAction::DrawCard { player_id: waiting }),
            Dispatch::Rejected(GameError::NotYourTurn)
        );
    } else {
        guest.dispatch(GameAction::DrawCard { player_id: waiting });
    }
    settle(&mut [&mut host, &mut guest]);

    assert_eq!(host.state(), &before);
    assert_eq!(guest.state(), &before);
}

#[tokio::test]
async fn test_optimistic_reorder_then_snapshot() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest]);

    let mut order: Vec<String> = guest
        .state()
        .get_player(&guest.id())
        .unwrap()
        .hand
        .iter()
        .map(|c| c.id.clone())
        .collect();
    order.reverse();

    let outcome = guest.dispatch(GameAction::ReorderHand {
        player_id: guest.id(),
        new_order: order.clone(),
    });
    assert_eq!(outcome, Dispatch::Forwarded);

    // Shown locally before the host answers
    let shown: Vec<String> = guest
        .state()
        .get_player(&guest.id())
        .unwrap()
        .hand
        .iter()
        .map(|c| c.id.clone())
        .collect();
    assert_eq!(shown, order);
    assert_ne!(guest.state(), host.state());

    settle(&mut [&mut host, &mut guest]);
    assert_eq!(guest.state(), host.state());
}

fn hand_order(state: &GameState, player: &str) -> Vec<String> {
    state
        .get_player(player)
        .unwrap()
        .hand
        .iter()
        .map(|c| c.id.clone())
        .collect()
}

#[tokio::test]
async fn test_interleaved_snapshot_overrides_optimistic_reorder() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest]);

    let guest_id = guest.id();
    let dealt = hand_order(guest.state(), &guest_id);
    let mut reversed = dealt.clone();
    reversed.reverse();

    guest.dispatch(GameAction::ReorderHand {
        player_id: guest_id.clone(),
        new_order: reversed.clone(),
    });
    assert_eq!(hand_order(guest.state(), &guest_id), reversed);

    // The host acts before it reads the guest's reorder
    let mut host_order = hand_order(host.state(), &host.id());
    host_order.rotate_left(1);
    assert_eq!(
        host.dispatch(GameAction::ReorderHand {
            player_id: host.id(),
            new_order: host_order,
        }),
        Dispatch::Applied
    );
    guest.pump();

    assert_eq!(guest.state(), host.state());
    assert_eq!(hand_order(guest.state(), &guest_id), dealt);

    // Once the host applies the reorder the next snapshot carries it
    settle(&mut [&mut host, &mut guest]);
    assert_eq!(hand_order(guest.state(), &guest_id), reversed);
    assert_eq!(guest.state(), host.state());
}

#[tokio::test]
async fn test_host_ignores_spoofed_and_local_only_intents() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    let before = host.state().clone();

    // Kick issued in the host's name from the guest's link
    guest.dispatch(GameAction::KickPlayer {
        player_id: host.id(),
        target_id: guest.id(),
    });
    guest.dispatch(GameAction::SyncState {
        state: Box::default(),
    });
    settle(&mut [&mut host, &mut guest]);

    assert_eq!(host.state(), &before);
}

#[tokio::test]
async fn test_late_joiner_receives_current_state() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut first = join(&network, &host, "First").await;
    settle(&mut [&mut host, &mut first]);

    let mut second = join(&network, &host, "Second").await;
    settle(&mut [&mut host, &mut first, &mut second]);

    assert_eq!(host.state().players.len(), 3);
    assert_eq!(first.state(), host.state());
    assert_eq!(second.state(), host.state());
}

#[tokio::test]
async fn test_subscribers_see_every_change() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    let mut watcher = guest.coordinator.subscribe();
    settle(&mut [&mut host, &mut guest]);

    assert!(watcher.has_changed().unwrap());
    assert_eq!(watcher.borrow_and_update().players.len(), 2);
}

#[tokio::test]
async fn test_bot_seat() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);

    assert_eq!(
        host.coordinator.add_bot("Robo".into()).unwrap(),
        Dispatch::Applied
    );
    assert!(matches!(
        guest.coordinator.add_bot("Nope".into()),
        Err(CoordinatorError::NotHost)
    ));
    settle(&mut [&mut host, &mut guest]);

    let bot = &guest.state().players[2];
    assert!(bot.id.starts_with("bot-"));
    assert_eq!(bot.name, "Robo");
}

#[tokio::test(start_paused = true)]
async fn test_grace_period_expiry_removes_player() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest]);

    network.sever(&host.id(), &guest.id());
    settle(&mut [&mut host, &mut guest]);
    assert_eq!(host.state().players.len(), 2);
    assert!(host.coordinator.next_deadline().is_some());

    tokio::time::advance(Duration::from_millis(1500)).await;
    host.coordinator.poll_departures(Instant::now());
    assert_eq!(host.state().players.len(), 2);

    tokio::time::advance(Duration::from_millis(600)).await;
    host.coordinator.poll_departures(Instant::now());
    assert_eq!(host.state().players.len(), 1);
    assert_eq!(host.state().phase, GamePhase::Lobby);
    assert!(host.coordinator.next_deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_keeps_seat() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest]);
    let before = host.state().clone();

    network.sever(&host.id(), &guest.id());
    settle(&mut [&mut host, &mut guest]);
    tokio::time::advance(Duration::from_secs(1)).await;
    network.relink(&host.id(), &guest.id());
    settle(&mut [&mut host, &mut guest]);

    tokio::time::advance(Duration::from_secs(3)).await;
    host.coordinator.poll_departures(Instant::now());
    assert_eq!(host.state(), &before);

    // Losing the host is final on the guest side
    assert!(guest.state().players.is_empty());
    assert_eq!(guest.coordinator.host_id(), None);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_expires_departures() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    assert_eq!(host.state().players.len(), 2);

    let mut snapshots = host.coordinator.subscribe();
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let Peer {
        coordinator,
        events,
    } = host;
    let guest_id = guest.id();
    let host_id = coordinator.peer_id().clone();
    let task = tokio::spawn(coordinator.run(events, intent_rx));

    network.sever(&host_id, &guest_id);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(snapshots.borrow_and_update().players.len(), 1);

    drop(intent_tx);
    let session = task.await.unwrap().unwrap();
    assert!(session.is_host());
    assert_eq!(session.state.players.len(), 1);
}

#[tokio::test]
async fn test_host_loss_resets_client() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest]);

    host.coordinator.leave();
    settle(&mut [&mut host, &mut guest]);

    assert_eq!(guest.state().phase, GamePhase::Lobby);
    assert!(guest.state().players.is_empty());
    assert!(!guest.coordinator.is_connected());
    assert_eq!(guest.coordinator.host_id(), None);

    // Without a host there is no table to play on, not even a new one
    let init = GameAction::InitGame {
        player_id: guest.id(),
        host_name: "Guest".into(),
        team_a_name: None,
        team_b_name: None,
    };
    assert!(matches!(
        guest.coordinator.dispatch(init),
        Err(CoordinatorError::NoHost)
    ));
    assert!(guest.state().players.is_empty());
}

#[tokio::test]
async fn test_leaving_guest_frees_seat_at_once() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    let mut other = join(&network, &host, "Other").await;
    settle(&mut [&mut host, &mut guest, &mut other]);
    assert_eq!(host.state().players.len(), 3);

    let guest_id = guest.id();
    guest.coordinator.leave();
    settle(&mut [&mut host, &mut guest, &mut other]);

    assert!(host.state().get_player(&guest_id).is_none());
    assert_eq!(host.state().players.len(), 2);
    assert!(host.coordinator.next_deadline().is_none());
    assert_eq!(other.state(), host.state());
    assert!(guest.state().players.is_empty());
}

#[tokio::test]
async fn test_leaving_guest_mid_match_returns_everyone_to_lobby() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    let mut other = join(&network, &host, "Other").await;
    settle(&mut [&mut host, &mut guest, &mut other]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest, &mut other]);

    guest.coordinator.leave();
    settle(&mut [&mut host, &mut guest, &mut other]);

    assert_eq!(host.state().phase, GamePhase::Lobby);
    assert_eq!(host.state().players.len(), 2);
    assert!(host.coordinator.next_deadline().is_none());
    assert_eq!(other.state(), host.state());
}

#[tokio::test]
async fn test_leaving_host_closes_table_for_everyone() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    let mut watcher = guest.coordinator.subscribe();
    settle(&mut [&mut host, &mut guest]);
    watcher.borrow_and_update();

    host.coordinator.leave();
    // The emptied table arrives before the link drops
    assert_eq!(guest.pump(), 2);

    assert!(watcher.has_changed().unwrap());
    assert!(host.state().players.is_empty());
    assert!(guest.state().players.is_empty());
    assert_eq!(guest.coordinator.host_id(), None);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_host_fails_after_retries() {
    let network = MemoryNetwork::new();
    let (mut silent, _silent_events) = network.transport();
    let silent_id = silent.initialize(None).await.unwrap();
    network.set_unreachable(&silent_id, true);

    let (transport, _events) = network.transport();
    let started = Instant::now();
    let result =
        Coordinator::join(transport, CoordinatorConfig::default(), silent_id, "Guest".into()).await;

    assert!(matches!(
        result,
        Err(CoordinatorError::ConnectFailed { attempts: 3, .. })
    ));
    assert!(started.elapsed() >= Duration::from_secs(15));
}

#[tokio::test]
async fn test_unknown_host_fails_fast() {
    let network = MemoryNetwork::new();
    let (transport, _events) = network.transport();
    let config = CoordinatorConfig {
        connect_retries: 0,
        ..CoordinatorConfig::default()
    };
    let result = Coordinator::join(transport, config, "nobody".into(), "Guest".into()).await;

    assert!(matches!(
        result,
        Err(CoordinatorError::ConnectFailed { attempts: 1, .. })
    ));
}

#[tokio::test]
async fn test_resume_session() {
    let network = MemoryNetwork::new();
    let mut host = host(&network).await;
    let mut guest = join(&network, &host, "Guest").await;
    settle(&mut [&mut host, &mut guest]);
    start(&mut host);
    settle(&mut [&mut host, &mut guest]);

    let saved = Session::from_json(&guest.coordinator.session().to_json().unwrap()).unwrap();
    assert_eq!(saved.host_id.as_ref(), Some(&host.id()));

    // The guest process stops without giving up its seat
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    drop(intent_tx);
    let Peer {
        coordinator,
        events,
    } = guest;
    let stopped = coordinator.run(events, intent_rx).await.unwrap();
    assert_eq!(stopped.peer_id, saved.peer_id);
    settle(&mut [&mut host]);
    assert!(host.coordinator.next_deadline().is_some());

    let (transport, events) = network.transport();
    let coordinator = Coordinator::resume(transport, CoordinatorConfig::default(), saved.clone())
        .await
        .unwrap();
    let mut guest = Peer {
        coordinator,
        events,
    };
    assert_eq!(guest.id(), saved.peer_id);
    settle(&mut [&mut host, &mut guest]);

    assert!(host.coordinator.next_deadline().is_none());
    assert_eq!(guest.state(), host.state());
    assert_eq!(host.state().players.len(), 2);
    assert_eq!(host.state().phase, GamePhase::Playing);
}
