//! Test utilities for ota-client
//!
//! [`TestServer`] serves an OTA router on a loopback port and hands out a
//! client pointed at it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{OtaClient, Result};

/// An OTA server bound to `127.0.0.1:0`, stopped when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: OtaClient,
    running: Option<Running>,
}

struct Running {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Serve `router` with the default client timeouts
    ///
    /// ```ignore
    /// let state = AppState::new(registry, relay, calibration);
    /// let server = TestServer::start(ota_api::create_router(state)).await?;
    /// let devices = server.client.list_devices().await?;
    /// ```
    pub async fn start(router: axum::Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Serve `router` with explicit request and connect timeouts for the client
    pub async fn start_with_timeout(
        router: axum::Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (stop, stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stopped.await;
                })
                .await;
            if let Err(e) = served {
                tracing::warn!(error = %e, "test server exited with error");
            }
        });

        let client = OtaClient::with_config(&format!("http://{}", addr), timeout, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            running: Some(Running { stop, task }),
        })
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for a request path, for tests that bypass the typed client
    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url(), path_and_query)
    }

    pub fn client(&self) -> &OtaClient {
        &self.client
    }

    /// Stop accepting connections and wait for in-flight requests to finish
    pub async fn shutdown(mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop.send(());
            let _ = running.task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop.send(());
            running.task.abort();
        }
    }
}
