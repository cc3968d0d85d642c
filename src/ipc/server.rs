// src/ipc/server.rs

//! Unix-socket front end of the daemon.
//!
//! Connections never touch the scheduler. Each decoded request is handed to
//! the runtime as a `RuntimeEvent::Request` together with a oneshot channel,
//! and the response is written back once the runtime has processed it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::ipc::protocol::{Request, Response};

/// Listening socket plus the connection tasks it spawned.
#[derive(Debug)]
pub struct Server {
    listener: UnixListener,
    socket_path: PathBuf,
    connections: JoinSet<()>,
}

impl Server {
    /// Bind `socket_path`, replacing a stale socket file.
    ///
    /// Fails if another daemon is still answering on it.
    pub async fn bind(socket_path: &Path) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating socket dir: {}", parent.display()))?;
        }

        if socket_path.exists() {
            if UnixStream::connect(socket_path).await.is_ok() {
                bail!(
                    "another daemon is already listening on {}",
                    socket_path.display()
                );
            }
            std::fs::remove_file(socket_path)
                .with_context(|| format!("removing old socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("binding to socket: {}", socket_path.display()))?;

        info!(socket = %socket_path.display(), "daemon listening");

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            connections: JoinSet::new(),
        })
    }

    /// Accept connections until an accept error occurs.
    pub async fn serve(&mut self, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Result<()> {
        loop {
            let (stream, _addr) = self.listener.accept().await?;
            debug!("client connected");

            let tx = runtime_tx.clone();
            self.connections.spawn(async move {
                if let Err(e) = handle_connection(stream, tx).await {
                    debug!(error = %e, "client connection ended with an error");
                }
            });

            // Reap finished connection tasks so the set does not grow.
            while self.connections.try_join_next().is_some() {}
        }
    }

    /// Give open connections up to `timeout` to flush their last response,
    /// then remove the socket file.
    pub async fn shutdown(mut self, timeout: Duration) {
        let drain = async { while self.connections.join_next().await.is_some() {} };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            debug!("connections still open at shutdown; aborting them");
            self.connections.abort_all();
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!(socket = %self.socket_path.display(), error = %e, "failed to remove socket file");
        }
    }
}

/// Serve one client: one request per line, one response per line.
async fn handle_connection(stream: UnixStream, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(request, &runtime_tx).await,
            Err(e) => {
                warn!(error = %e, "malformed request");
                Response::error(format!("malformed request: {e}"))
            }
        };

        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

async fn dispatch(request: Request, runtime_tx: &mpsc::Sender<RuntimeEvent>) -> Response {
    let (reply, rx) = oneshot::channel();

    if runtime_tx
        .send(RuntimeEvent::Request { request, reply })
        .await
        .is_err()
    {
        return Response::error("daemon is shutting down");
    }

    match rx.await {
        Ok(response) => response,
        Err(_) => Response::error("daemon dropped the request"),
    }
}
