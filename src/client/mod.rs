//! Client side of the embedding daemon socket.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tokio::net::UnixStream;
use tracing::{debug, info};

use crate::error::DaemonError;
use crate::models::Config;
use crate::server::protocol::{
    EmbedRequest, Request, Response, StatusResponse, read_frame, write_frame,
};

const READY_TIMEOUT: Duration = Duration::from_secs(60);

pub struct DaemonClient {
    socket_path: PathBuf,
    auto_start: bool,
}

impl DaemonClient {
    pub fn new(config: &Config) -> Self {
        Self::with_socket(config.socket_path(), config.daemon.auto_start)
    }

    pub fn with_socket(socket_path: PathBuf, auto_start: bool) -> Self {
        Self {
            socket_path,
            auto_start,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_running(&self) -> bool {
        self.socket_path.exists()
            && std::os::unix::net::UnixStream::connect(&self.socket_path).is_ok()
    }

    pub async fn ensure_running(&self) -> Result<(), DaemonError> {
        if self.is_running() {
            return Ok(());
        }

        if !self.auto_start {
            return Err(DaemonError::NotRunning);
        }

        info!(socket = %self.socket_path.display(), "starting embedding daemon");
        spawn_daemon()?;
        self.wait_for_ready().await
    }

    async fn wait_for_ready(&self) -> Result<(), DaemonError> {
        let check_interval = Duration::from_millis(100);
        let start = std::time::Instant::now();

        while start.elapsed() < READY_TIMEOUT {
            if self.is_running() && self.ping().await.is_ok() {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "daemon ready");
                return Ok(());
            }
            tokio::time::sleep(check_interval).await;
        }

        Err(DaemonError::Timeout)
    }

    async fn send_request(&self, request: Request) -> Result<Response, DaemonError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| DaemonError::ConnectionFailed(e.to_string()))?;

        write_frame(&mut stream, &request).await?;
        let body = read_frame(&mut stream).await?.ok_or_else(|| {
            DaemonError::ProtocolError("daemon closed the connection".to_string())
        })?;

        match serde_json::from_slice(&body) {
            Ok(Response::Error(e)) => Err(DaemonError::ProtocolError(e.message)),
            Ok(response) => Ok(response),
            Err(e) => Err(DaemonError::ProtocolError(e.to_string())),
        }
    }

    pub async fn ping(&self) -> Result<(), DaemonError> {
        match self.send_request(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn status(&self) -> Result<StatusResponse, DaemonError> {
        match self.send_request(Request::Status).await? {
            Response::Status(s) => Ok(s),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn shutdown(&self) -> Result<(), DaemonError> {
        match self.send_request(Request::Shutdown).await? {
            Response::ShutdownAck => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn embed(
        &self,
        texts: Vec<String>,
        is_query: bool,
    ) -> Result<Vec<Vec<f32>>, DaemonError> {
        self.ensure_running().await?;

        let request = Request::Embed(EmbedRequest { texts, is_query });
        match self.send_request(request).await? {
            Response::Embed(r) => Ok(r.embeddings),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> DaemonError {
    DaemonError::ProtocolError(format!("unexpected response: {:?}", response))
}

/// Launch `csearch serve --daemon` detached from this process.
pub fn spawn_daemon() -> Result<(), DaemonError> {
    let exe = std::env::current_exe().map_err(|e| DaemonError::SpawnError(e.to_string()))?;

    Command::new(&exe)
        .args(["serve", "--daemon"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::inherit())
        .spawn()
        .map_err(|e| DaemonError::SpawnError(e.to_string()))?;

    Ok(())
}

/// Send SIGTERM to the daemon recorded in the pid file.
pub fn stop_daemon(config: &Config) -> Result<(), DaemonError> {
    let pid_path = config.pid_path();
    if !pid_path.exists() {
        return Err(DaemonError::NotRunning);
    }

    let pid: i32 = std::fs::read_to_string(&pid_path)?
        .trim()
        .parse()
        .map_err(|_| DaemonError::ProtocolError("invalid pid file".to_string()))?;

    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(DaemonError::SocketError(e.to_string())),
        }
    }

    let _ = std::fs::remove_file(&pid_path);
    let _ = std::fs::remove_file(config.socket_path());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_socket_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let client = DaemonClient::with_socket(dir.path().join("daemon.sock"), false);

        assert!(!client.is_running());
        assert!(matches!(
            client.ensure_running().await,
            Err(DaemonError::NotRunning)
        ));
        assert!(matches!(
            client.embed(vec!["hi".into()], true).await,
            Err(DaemonError::NotRunning)
        ));
    }

    #[test]
    fn test_stop_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.daemon.socket_path = Some(dir.path().join("daemon.sock"));

        assert!(matches!(stop_daemon(&config), Err(DaemonError::NotRunning)));
    }

    #[test]
    fn test_stop_rejects_garbage_pid() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.daemon.socket_path = Some(dir.path().join("daemon.sock"));
        std::fs::write(config.pid_path(), "not-a-pid").unwrap();

        assert!(matches!(
            stop_daemon(&config),
            Err(DaemonError::ProtocolError(_))
        ));
    }
}
