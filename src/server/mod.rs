//! Embedding daemon: keeps the ONNX model loaded and serves embed requests
//! over a Unix socket until it has been idle for the configured timeout.

pub mod embedding;
pub mod protocol;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::ModelError;
use crate::models::Config;
use crate::server::embedding::{EmbeddingModel, SharedEmbeddingModel};
use crate::server::protocol::{
    EmbedResponse, Request, Response, StatusResponse, read_frame, write_frame,
};

pub struct DaemonServer {
    config: Config,
    socket_path: PathBuf,
    embedding_model: SharedEmbeddingModel,
    last_request: Arc<RwLock<Instant>>,
    requests_served: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl DaemonServer {
    pub fn new(config: Config) -> Result<Self, ModelError> {
        let socket_path = config.socket_path();
        let model_dir = config.model_dir().ok_or_else(|| {
            ModelError::NotFound("could not determine models directory".to_string())
        })?;

        info!(model = %config.embedding.model_id, dir = %model_dir.display(), "loading embedding model");
        let embedding_model = Arc::new(EmbeddingModel::load(&config.embedding, &model_dir)?);
        info!(dimension = embedding_model.dimension(), "embedding model loaded");

        Ok(Self {
            config,
            socket_path,
            embedding_model,
            last_request: Arc::new(RwLock::new(Instant::now())),
            requests_served: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn run(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        self.write_pid_file()?;

        info!(
            socket = %self.socket_path.display(),
            idle_timeout_secs = self.config.daemon.idle_timeout_secs,
            "daemon listening"
        );

        let idle_timeout = Duration::from_secs(self.config.daemon.idle_timeout_secs);
        let check_interval = Duration::from_secs(1).min(idle_timeout.max(Duration::from_millis(100)));

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            *self.last_request.write().await = Instant::now();
                            self.handle_connection(stream).await;
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
                _ = tokio::time::sleep(check_interval) => {
                    let last = *self.last_request.read().await;
                    if last.elapsed() > idle_timeout {
                        info!("idle timeout reached, shutting down");
                        break;
                    }
                }
                _ = shutdown_signal() => {
                    info!("received shutdown signal");
                    break;
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    async fn handle_connection(&self, mut stream: UnixStream) {
        loop {
            let body = match read_frame(&mut stream).await {
                Ok(Some(body)) => body,
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "dropping connection");
                    break;
                }
            };

            let response = match serde_json::from_slice::<Request>(&body) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => Response::error(format!("invalid request: {}", e)),
            };
            self.requests_served.fetch_add(1, Ordering::Relaxed);

            if let Err(e) = write_frame(&mut stream, &response).await {
                debug!(error = %e, "failed to write response");
                break;
            }

            if matches!(response, Response::ShutdownAck) {
                break;
            }
        }
    }

    async fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Shutdown => {
                info!("shutdown requested");
                self.shutdown.store(true, Ordering::Relaxed);
                Response::ShutdownAck
            }

            Request::Status => {
                let last = *self.last_request.read().await;
                Response::Status(StatusResponse {
                    running: true,
                    pid: std::process::id(),
                    embedding_model: self.config.embedding.model_id.clone(),
                    dimension: self.embedding_model.dimension(),
                    idle_secs: last.elapsed().as_secs(),
                    idle_timeout_secs: self.config.daemon.idle_timeout_secs,
                    requests_served: self.requests_served.load(Ordering::Relaxed),
                })
            }

            Request::Embed(req) => {
                let start = Instant::now();
                let model = Arc::clone(&self.embedding_model);
                let count = req.texts.len();
                let result =
                    tokio::task::spawn_blocking(move || model.embed(&req.texts)).await;

                match result {
                    Ok(Ok(embeddings)) => {
                        debug!(
                            count,
                            is_query = req.is_query,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "embedded batch"
                        );
                        Response::Embed(EmbedResponse { embeddings })
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, count, "embedding failed");
                        Response::error(e.to_string())
                    }
                    Err(e) => Response::error(format!("embedding task failed: {}", e)),
                }
            }
        }
    }

    fn write_pid_file(&self) -> Result<(), std::io::Error> {
        std::fs::write(self.config.pid_path(), std::process::id().to_string())
    }

    fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
        let _ = std::fs::remove_file(self.config.pid_path());
        info!("daemon stopped");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

pub async fn run_daemon(config: Config) -> anyhow::Result<()> {
    let server = DaemonServer::new(config)?;
    server.run().await?;
    Ok(())
}
