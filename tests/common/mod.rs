//! Shared utilities for end-to-end tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use vhost_proxy::config::Config;
use vhost_proxy::discovery::{Discovered, DiscoveryCache, StaticRegistry};
use vhost_proxy::proxy::{Connector, VirtualHostRouter};
use vhost_proxy::renegotiate::Renegotiator;
use vhost_proxy::server::Listener;

/// Start a mock backend that answers every connection with `response`
/// verbatim and reports the request head it received.
pub async fn start_mock_backend(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let seen_tx = seen_tx.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let _ = seen_tx.send(head);
                        let _ = socket.write_all(response).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen_rx)
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Router whose static registry maps `service` to `backend`.
pub fn router_for(
    service: &str,
    backend: SocketAddr,
    capabilities: &[(&str, &str)],
    discovery_timeout: Duration,
) -> VirtualHostRouter {
    let registry = StaticRegistry::new().with_service(
        service,
        Discovered {
            address: backend.ip().to_string(),
            port: backend.port(),
            capabilities: capabilities
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        },
    );

    VirtualHostRouter::new(
        DiscoveryCache::new(Arc::new(registry), Duration::from_secs(30), discovery_timeout),
        Connector::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(2),
        ),
        Renegotiator::default(),
    )
}

/// Serve `router` on an ephemeral port.
pub async fn start_proxy(router: VirtualHostRouter) -> SocketAddr {
    let mut cfg = Config::default();
    cfg.server.listen_addr = "127.0.0.1:0".to_string();

    let listener = Listener::bind(&cfg, Arc::new(router)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = listener.run().await;
    });

    addr
}

/// Send raw request bytes and read until the proxy closes the connection.
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    response
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}
