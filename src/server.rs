//! Server lifecycle: bind, serve in the background, shut down gracefully.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::store::SharedDocumentStore;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server Error. Server already running.")]
    AlreadyRunning,

    #[error("Server Error. Server already stopped.")]
    NotRunning,

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server task failed: {0}")]
    Serve(String),
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

/// HTTP server with explicit start/stop.
pub struct Server {
    state: Arc<AppState>,
    running: Mutex<Option<Running>>,
}

impl Server {
    pub fn new(config: Config, store: SharedDocumentStore) -> Self {
        Self {
            state: Arc::new(AppState::new(config, store)),
            running: Mutex::new(None),
        }
    }

    /// Bind the configured address and start serving.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// the port is 0.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        let app = api::router(Arc::clone(&self.state));
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!("Listening on {}", local_addr);
        *running = Some(Running {
            addr: local_addr,
            shutdown,
            handle,
        });
        Ok(local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let Some(running) = self.running.lock().await.take() else {
            return Err(ServerError::NotRunning);
        };

        // The serving task may already have exited; its result is checked below.
        let _ = running.shutdown.send(());
        running
            .handle
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server on {} stopped", running.addr);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryDocumentStore, StoreType};
    use serde_json::{json, Value};

    fn server() -> Server {
        let mut config = Config::new(StoreType::Memory);
        config.port = 0;
        Server::new(config, Arc::new(InMemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let server = server();
        assert!(!server.is_running().await);

        let addr = server.start().await.unwrap();
        assert!(server.is_running().await);
        assert_eq!(server.local_addr().await, Some(addr));
        assert!(matches!(
            server.start().await,
            Err(ServerError::AlreadyRunning)
        ));

        server.stop().await.unwrap();
        assert!(!server.is_running().await);
        assert!(matches!(server.stop().await, Err(ServerError::NotRunning)));

        // restartable after a stop
        server.start().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start_fails() {
        let server = server();
        tokio_test::assert_err!(server.stop().await);
    }

    #[tokio::test]
    async fn test_serves_http_requests() {
        let server = server();
        let addr = server.start().await.unwrap();
        let base = format!("http://{}", addr);
        let client = reqwest::Client::new();

        let created = client
            .post(format!("{}/lists", base))
            .json(&json!({ "name": "Test List", "description": "over the wire" }))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), reqwest::StatusCode::CREATED);
        let created: Value = created.json().await.unwrap();

        let fetched = client
            .get(format!("{}/lists/{}", base, created["_id"].as_str().unwrap()))
            .send()
            .await
            .unwrap();
        assert_eq!(fetched.status(), reqwest::StatusCode::OK);
        let fetched: Value = fetched.json().await.unwrap();
        assert_eq!(fetched[0]["name"], "Test List");

        let missing = client.get(format!("{}/nope", base)).send().await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let first = server();
        let addr = first.start().await.unwrap();

        let mut config = Config::new(StoreType::Memory);
        config.port = addr.port();
        let second = Server::new(config, Arc::new(InMemoryDocumentStore::new()));
        assert!(matches!(
            second.start().await,
            Err(ServerError::Bind { .. })
        ));
        assert!(!second.is_running().await);

        first.stop().await.unwrap();
    }
}
