// src/ipc/client.rs

//! Client side of the daemon socket, including daemon auto-start.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, info};

use crate::errors::{CatinError, Result};
use crate::ipc::protocol::{Request, Response};

const STARTUP_POLL: Duration = Duration::from_millis(100);

/// Connection parameters for talking to the daemon.
#[derive(Debug, Clone)]
pub struct Client {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Client {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one request and wait for its response.
    ///
    /// A timeout only stops the wait; whatever the daemon already did stays
    /// done.
    pub async fn send(&self, request: &Request) -> Result<Response> {
        match tokio::time::timeout(self.timeout, self.roundtrip(request)).await {
            Ok(result) => result,
            Err(_) => Err(CatinError::DaemonUnavailable(format!(
                "no response to {} within {:?}",
                request.op(),
                self.timeout
            ))),
        }
    }

    async fn roundtrip(&self, request: &Request) -> Result<Response> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            CatinError::DaemonUnavailable(format!(
                "failed to connect to {}: {e}",
                self.socket_path.display()
            ))
        })?;
        let (reader, mut writer) = stream.into_split();

        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        let mut lines = BufReader::new(reader).lines();
        let Some(reply) = lines.next_line().await? else {
            return Err(CatinError::Protocol(
                "daemon closed the connection without answering".to_string(),
            ));
        };

        Ok(serde_json::from_str(&reply)?)
    }

    /// PID of the daemon if one answers on the socket.
    pub async fn test_running(&self) -> Option<u32> {
        match self.send(&Request::Test { name: None }).await {
            Ok(response) if response.ok => response.pid,
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "daemon liveness check failed");
                None
            }
        }
    }
}

/// Make sure a daemon is running, starting `meow run --detach` if needed.
///
/// Returns the daemon PID once it answers, or `DaemonUnavailable` when it
/// does not come up within `wait`.
pub async fn ensure_daemon(client: &Client, settings: Option<&Path>, wait: Duration) -> Result<u32> {
    if let Some(pid) = client.test_running().await {
        return Ok(pid);
    }

    let exe = std::env::current_exe()?;
    let mut cmd = std::process::Command::new(exe);
    cmd.arg("run").arg("--detach");
    if let Some(settings) = settings {
        cmd.arg("--settings").arg(settings);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn()?;
    info!(pid = child.id(), "started daemon");

    let deadline = tokio::time::Instant::now() + wait;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(STARTUP_POLL).await;
        if let Some(pid) = client.test_running().await {
            return Ok(pid);
        }
    }

    Err(CatinError::DaemonUnavailable(format!(
        "daemon did not answer on {} within {:?}",
        client.socket_path().display(),
        wait
    )))
}
