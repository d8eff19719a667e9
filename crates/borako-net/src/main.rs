//! Borako peer.
//!
//! Hosts a table, or joins one when `BORAKO_JOIN` is set. Intents are read
//! from stdin as JSON lines and every new state is written to stdout as a
//! JSON line. Logs go to stderr.

use borako_core::GameAction;
use borako_net::{Coordinator, CoordinatorConfig, PeerConfig, Session, WsTransport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let peer_config = PeerConfig::from_env()?;
    let config = CoordinatorConfig::from_env()?;

    info!("Starting Borako peer...");

    let saved = match &peer_config.session_path {
        Some(path) if path.exists() => {
            let json = std::fs::read_to_string(path)?;
            Some(Session::from_json(&json)?)
        }
        _ => None,
    };

    let (transport, events) = WsTransport::new(peer_config.listen_addr);
    let coordinator = match (saved, &peer_config.join) {
        (Some(session), _) => Coordinator::resume(transport, config, session).await?,
        (None, Some(host)) => {
            Coordinator::join(transport, config, host.clone(), peer_config.name.clone()).await?
        }
        (None, None) => {
            Coordinator::host(
                transport,
                config,
                peer_config.name.clone(),
                peer_config.team_a_name.clone(),
                peer_config.team_b_name.clone(),
            )
            .await?
        }
    };
    info!("Peer id: {}", coordinator.peer_id());

    // Print every new state
    let mut snapshots = coordinator.subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let line = serde_json::to_string(&*snapshots.borrow_and_update());
            match line {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Could not encode state: {}", e),
            }
        }
    });

    // Read intents from stdin
    let (intent_tx, intent_rx) = mpsc::unbounded_channel::<GameAction>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GameAction>(&line) {
                Ok(action) => {
                    if intent_tx.send(action).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Invalid intent: {}", e),
            }
        }
    });

    let session = coordinator.run(events, intent_rx).await?;

    if let Some(path) = &peer_config.session_path {
        std::fs::write(path, session.to_json()?)?;
        info!("Session saved to {}", path.display());
    }

    Ok(())
}
