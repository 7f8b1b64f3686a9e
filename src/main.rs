//! report-scribe-daemon: routes dictated speech fragments into report sections
//!
//! The daemon listens on a Unix socket for text fragments from a speech
//! recognizer and for manual actions from a UI. Each fragment is either a
//! spoken navigation command ("go to gestational age"), the possible start
//! of one, or dictation for the currently active report section:
//! - Command grammars tolerate common misrecognitions of "go to"
//! - A history buffer recovers commands split across fragments
//! - A timeout monitor backs out of command suspicion after silence
//! - Section content persists to a JSON report document

mod command;
mod config;
mod events;
mod ipc;
mod lifecycle;
mod router;
mod store;
mod text;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::RouterEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::router::{Router, RouterMsg, TimeoutMonitor};
use crate::store::JsonDocumentStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "report-scribe-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        sections = config.sections.len(),
        "configuration loaded"
    );

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // IPC clients and timeout monitor -> router
    let (msg_tx, msg_rx) = mpsc::channel::<RouterMsg>(64);
    // Router -> IPC server and logging (broadcast of router events)
    let (event_tx, mut event_rx) = broadcast::channel::<RouterEvent>(64);

    // Open the persisted report document
    let store = JsonDocumentStore::open(&config.document_path, &config.sections)?;

    // Create the router
    let mut router = Router::new(
        config.sections.clone(),
        Box::new(store),
        config.history_capacity,
        config.suspicion_timeout,
        event_tx.clone(),
    );
    let status = router.status_handle();

    // Start the timeout monitor
    let monitor_handle = TimeoutMonitor::new(config.poll_interval, msg_tx.clone()).spawn();

    // Create IPC server
    let server = Server::new(
        &config.socket_path,
        msg_tx.clone(),
        status,
        event_tx.clone(),
        config.sections.clone(),
    )?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the router (processes fragments and manual actions)
        _ = router.run(msg_rx) => {
            info!("router exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Log router events
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "router event");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("event logger exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup. Committed content is left as last written; no rollback.
    info!("shutting down...");

    monitor_handle.abort();
    server.shutdown().await;

    info!("report-scribe-daemon stopped");

    Ok(())
}
