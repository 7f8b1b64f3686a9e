//! Unix domain socket server for IPC
//!
//! Accepts recognizer and UI clients, forwards their requests into the
//! router's serialized message loop, and pushes router events to
//! subscribed clients.
//!
//! Each connection is split into a sequential read loop and a dedicated
//! writer task fed by a channel. Responses and notifications both go
//! through the writer, so a notification can never interrupt a partially
//! read request frame and desync the connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::RouterEvent;
use crate::router::{RouterMsg, RouterStatus};

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// State shared with every client handler.
struct ServerContext {
    /// Router message channel; all mutations go through here.
    msg_tx: mpsc::Sender<RouterMsg>,
    /// Snapshot of router state, written by the router task.
    status: Arc<RwLock<RouterStatus>>,
    /// Source of events for subscribed clients.
    event_tx: broadcast::Sender<RouterEvent>,
    /// Section catalogue, reported in status responses.
    sections: Vec<String>,
    start_time: Instant,
}

/// IPC server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    context: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`.
    pub fn new(
        socket_path: &Path,
        msg_tx: mpsc::Sender<RouterMsg>,
        status: Arc<RwLock<RouterStatus>>,
        event_tx: broadcast::Sender<RouterEvent>,
        sections: Vec<String>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            context: Arc::new(ServerContext {
                msg_tx,
                status,
                event_tx,
                sections,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = Arc::clone(&self.context);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection.
    ///
    /// The stream is split: this task reads request frames sequentially,
    /// while a writer task owns the write half and frames everything queued
    /// on `out_tx`. A subscription forwarder feeds router events into the
    /// same queue, so reads are never raced against writes.
    async fn handle_client(stream: UnixStream, context: Arc<ServerContext>) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(32);

        let writer_task = Self::spawn_writer(writer, out_rx);
        let mut forwarder: Option<JoinHandle<()>> = None;

        let result = Self::read_loop(&mut reader, &context, &out_tx, &mut forwarder).await;

        // Let the writer drain queued frames, then stop the forwarder.
        drop(out_tx);
        if let Some(task) = forwarder {
            task.abort();
        }
        let _ = writer_task.await;

        result
    }

    /// Sole owner of the write half: frames every queued message in order.
    fn spawn_writer(
        mut writer: OwnedWriteHalf,
        mut out_rx: mpsc::Receiver<Vec<u8>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let len = (frame.len() as u32).to_le_bytes();
                if writer.write_all(&len).await.is_err() || writer.write_all(&frame).await.is_err()
                {
                    debug!("client write failed, writer exiting");
                    break;
                }
            }
        })
    }

    /// Read and process request frames until the client disconnects.
    async fn read_loop(
        reader: &mut OwnedReadHalf,
        context: &Arc<ServerContext>,
        out_tx: &mpsc::Sender<Vec<u8>>,
        forwarder: &mut Option<JoinHandle<()>>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > 1024 * 1024 {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            let request: Request =
                serde_json::from_slice(&msg_buf).context("failed to parse request")?;
            debug!(?request, "received request");

            let (response, subscribe) = Self::process_request(request, context).await;
            if subscribe && forwarder.is_none() {
                // Subscribe before acknowledging so no event is missed.
                let event_rx = context.event_tx.subscribe();
                *forwarder = Some(Self::spawn_forwarder(event_rx, out_tx.clone()));
                debug!("client subscribed to notifications");
            }

            if Self::queue_message(out_tx, &response).await.is_err() {
                debug!("client writer gone");
                return Ok(());
            }
        }
    }

    /// Forward router events to one subscribed client's writer queue.
    fn spawn_forwarder(
        mut event_rx: broadcast::Receiver<RouterEvent>,
        out_tx: mpsc::Sender<Vec<u8>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        if Self::queue_message(&out_tx, &Notification::Event { event })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("event channel closed");
                        break;
                    }
                }
            }
        })
    }

    /// Serialize a message and queue it for the writer task.
    async fn queue_message<T: serde::Serialize>(
        out_tx: &mpsc::Sender<Vec<u8>>,
        msg: &T,
    ) -> Result<()> {
        let frame = serde_json::to_vec(msg)?;
        out_tx
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("client writer closed"))?;
        Ok(())
    }

    /// Process a request and return a response.
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, context: &ServerContext) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let status = context.status.read().await;
                (
                    Response::Status(DaemonStatus {
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        state: status.state,
                        active_section: status.active_section.clone(),
                        sections: context.sections.clone(),
                        uptime_secs: context.start_time.elapsed().as_secs(),
                    }),
                    false,
                )
            }

            Request::PushFragment { text } => {
                (Self::forward(context, RouterMsg::Fragment(text)).await, false)
            }

            Request::SelectSection { name } => (
                Self::forward(context, RouterMsg::SelectSection(name)).await,
                false,
            ),

            Request::SetContent { text } => (
                Self::forward(context, RouterMsg::SetContent(text)).await,
                false,
            ),

            Request::ResetDocument => {
                (Self::forward(context, RouterMsg::ResetDocument).await, false)
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Queue a message for the router's serialized loop.
    async fn forward(context: &ServerContext, msg: RouterMsg) -> Response {
        match context.msg_tx.send(msg).await {
            Ok(()) => Response::Accepted,
            Err(e) => {
                error!(?e, "router channel closed");
                Response::Error {
                    code: "router_unavailable".to_string(),
                    message: "router is not running".to_string(),
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}
