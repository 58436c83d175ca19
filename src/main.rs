//! Maple network client
//!
//! Connects to a game server, completes the handshake and keeps the session
//! polled on a fixed tick, logging every world event the server causes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use maple_net::config::ClientConfig;
use maple_net::game::world::EventLog;
use maple_net::net::session::{Session, SessionState};
use maple_net::net::transport::TcpTransport;
use maple_net::protocol::dispatcher::Dispatcher;
use maple_net::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Maple network client v{}", VERSION);

    let config = ClientConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );

    let address = config.address();
    let transport = TcpTransport::connect(&address, config.connect_timeout())
        .await
        .with_context(|| format!("Could not reach game server at {}", address))?;
    info!("Connected to {}", address);

    let dispatcher = Arc::new(Dispatcher::with_map_object_handlers());
    let mut session = Session::new(transport, dispatcher);
    if let Some(version) = config.expected_version() {
        session = session.with_expected_version(version);
    }

    run(&mut session, &config).await;

    session.close();
    let stats = session.stats();
    info!(
        packets_received = stats.packets_received,
        packets_sent = stats.packets_sent,
        unhandled = stats.packets_unhandled,
        malformed = stats.packets_malformed,
        "Session closed"
    );
    Ok(())
}

/// Poll the session every tick until shutdown or disconnect
async fn run(session: &mut Session<TcpTransport>, config: &ClientConfig) {
    let mut world = EventLog::new();
    let mut ticker = interval(config.tick_rate());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = session.transport().readable() => {
                if let Err(e) = result {
                    warn!("Socket readiness failed: {}", e);
                }
            }
            _ = &mut shutdown => break,
        }

        if let Err(e) = session.read(&mut world) {
            if e.is_fatal() {
                error!("Session error: {}", e);
                break;
            }
            warn!("Recoverable session error: {}", e);
        }
        for event in world.drain() {
            if config.debug {
                info!(event = ?event, "World event");
            } else {
                debug!(event = ?event, "World event");
            }
        }

        if let Err(e) = session.flush_outbound() {
            warn!("Failed to send queued packets: {}", e);
        }

        match session.state() {
            SessionState::Handshaking | SessionState::Connected => {}
            SessionState::Disconnected => {
                warn!("Disconnected from server");
                break;
            }
            SessionState::Failed => {
                error!("Session failed, a new connection is required");
                break;
            }
        }
    }
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,maple_net=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
