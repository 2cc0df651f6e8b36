use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::Config;
use crate::http::connection::Connection;
use crate::proxy::router::VirtualHostRouter;

/// Accepts client connections and hands each one to its own task.
///
/// A semaphore bounds how many connections are handled at once; when every
/// permit is taken the accept loop waits for one to be released.
pub struct Listener {
    inner: TcpListener,
    router: Arc<VirtualHostRouter>,
    connection_limit: Arc<Semaphore>,
    client_timeout: Duration,
}

impl Listener {
    pub async fn bind(cfg: &Config, router: Arc<VirtualHostRouter>) -> anyhow::Result<Self> {
        let inner = TcpListener::bind(&cfg.server.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", cfg.server.listen_addr))?;

        info!(
            address = %inner.local_addr()?,
            max_connections = cfg.server.max_connections,
            "Listening"
        );

        Ok(Self {
            inner,
            router,
            connection_limit: Arc::new(Semaphore::new(cfg.server.max_connections)),
            client_timeout: cfg.server.client_timeout(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Runs the accept loop. Only a closed connection limiter ends it;
    /// accept errors are logged and the loop carries on.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            // Acquire permit first (backpressure)
            let permit = self
                .connection_limit
                .clone()
                .acquire_owned()
                .await
                .context("connection limiter closed")?;

            let (socket, peer) = match self.inner.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    // Usually fd exhaustion; give it a moment
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            tracing::debug!(
                peer = %peer,
                available_permits = self.connection_limit.available_permits(),
                "Accepted connection"
            );

            let router = self.router.clone();
            let client_timeout = self.client_timeout;
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, router, client_timeout);
                if let Err(e) = conn.run().await {
                    tracing::warn!(peer = %peer, error = %e, "Connection error");
                }
                drop(permit);
            });
        }
    }
}

/// Builds the router from `cfg` and serves until the task is dropped.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let router = Arc::new(VirtualHostRouter::from_config(cfg)?);
    Listener::bind(cfg, router).await?.run().await
}
