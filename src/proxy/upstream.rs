//! Upstream connection and request forwarding
//!
//! This module connects to the backend a request resolved to, forwards the
//! request and reads back the complete response.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::BackendConfig;
use crate::discovery::record::ServiceRecord;
use crate::error::ProxyError;
use crate::http::parser::{ParseError, parse_http_response, parse_http_response_at_eof};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer::serialize_request;

/// Default buffer size for reads
const BUFFER_SIZE: usize = 8192;

/// Upper bound on the response head before the body starts
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Hop-by-hop headers, which describe a single connection and are not forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "Connection",
    "Keep-Alive",
    "Proxy-Connection",
    "Upgrade",
    "TE",
    "Trailer",
    "Transfer-Encoding",
    "Expect",
];

/// Forwards requests to a resolved backend
#[derive(Debug, Clone)]
pub struct Connector {
    connect_timeout: Duration,
    write_timeout: Duration,
    /// Bounds reading the complete response
    read_timeout: Duration,
    max_response_bytes: usize,
}

impl Connector {
    pub fn new(connect_timeout: Duration, write_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            write_timeout,
            read_timeout,
            max_response_bytes: BackendConfig::default().max_response_bytes,
        }
    }

    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    pub fn from_config(cfg: &BackendConfig) -> Self {
        Self::new(cfg.connect_timeout(), cfg.write_timeout(), cfg.read_timeout())
            .with_max_response_bytes(cfg.max_response_bytes)
    }

    /// Forward a request to the backend in `record`.
    ///
    /// Never fails: transport problems and unusable responses come back as a
    /// `502 Bad Gateway` response.
    pub async fn forward(&self, request: &Request, record: &ServiceRecord) -> Response {
        match self.try_forward(request, record).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    /// Forward a request, reporting failures as [`ProxyError`].
    ///
    /// The backend connection lives only for the duration of this call and is
    /// closed whatever the outcome.
    pub async fn try_forward(&self, request: &Request, record: &ServiceRecord) -> Result<Response, ProxyError> {
        let backend = &record.backend;

        tracing::debug!(
            backend = %backend,
            method = %request.method,
            path = %request.path,
            "Forwarding request to backend"
        );

        // Connect to backend with timeout
        let mut stream = timeout(
            self.connect_timeout,
            TcpStream::connect((backend.host.as_str(), backend.port)),
        )
        .await
        .map_err(|_| ProxyError::BackendUnreachable(format!("connect to {} timed out", backend)))?
        .map_err(|e| ProxyError::BackendUnreachable(format!("connect to {}: {}", backend, e)))?;

        tracing::trace!(backend = %backend, "Connected to backend");

        let result = self.exchange(&mut stream, request).await;

        match &result {
            Ok(response) => {
                // Best effort; the socket is closed on drop either way
                let _ = timeout(self.write_timeout, stream.shutdown()).await;
                tracing::info!(
                    backend = %backend,
                    status = response.status.as_u16(),
                    method = %request.method,
                    path = %request.path,
                    "Request forwarded successfully"
                );
            }
            Err(e) => {
                tracing::warn!(
                    backend = %backend,
                    error = %e,
                    method = %request.method,
                    path = %request.path,
                    "Failed to proxy request to backend"
                );
            }
        }

        result
    }

    /// Send request to backend and receive response
    async fn exchange<S>(&self, stream: &mut S, request: &Request) -> Result<Response, ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request_bytes = self.build_http_request(request);

        timeout(self.write_timeout, async {
            stream.write_all(&request_bytes).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ProxyError::BackendUnreachable("write to backend timed out".to_string()))?
        .map_err(|e| ProxyError::BackendUnreachable(format!("write to backend: {}", e)))?;

        tracing::trace!("Request sent to backend");

        let expect_body = request.method != Method::HEAD;
        timeout(self.read_timeout, self.read_http_response(stream, expect_body))
            .await
            .map_err(|_| ProxyError::BackendUnreachable("backend response timed out".to_string()))?
    }

    /// Build HTTP request bytes to send to backend
    ///
    /// Everything is forwarded as received except connection-scoped headers:
    /// those are dropped, `Connection: close` is set, and the body is framed
    /// with `Content-Length`.
    pub fn build_http_request(&self, request: &Request) -> Vec<u8> {
        let mut outbound = request.clone();

        // Headers named in Connection are hop-by-hop too
        let listed: Vec<String> = request
            .header("Connection")
            .map(|v| {
                v.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        for name in HOP_BY_HOP {
            outbound.headers.remove(name);
        }
        for name in &listed {
            outbound.headers.remove(name);
        }

        if !outbound.body.is_empty() || request.header("Content-Length").is_some() {
            outbound
                .headers
                .insert("Content-Length", outbound.body.len().to_string());
        }

        outbound.headers.insert("Connection", "close");

        serialize_request(&outbound)
    }

    /// Read HTTP response from backend
    ///
    /// Reads until one complete response is buffered, skipping interim 1xx
    /// responses, or until the backend closes the connection.
    async fn read_http_response<S>(&self, stream: &mut S, expect_body: bool) -> Result<Response, ProxyError>
    where
        S: AsyncRead + Unpin,
    {
        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

        loop {
            let n = stream
                .read_buf(&mut buffer)
                .await
                .map_err(|e| ProxyError::BackendUnreachable(format!("read from backend: {}", e)))?;

            if n == 0 {
                return match parse_http_response_at_eof(&buffer, expect_body) {
                    Ok((response, _)) => Ok(response),
                    Err(ParseError::Incomplete) => Err(ProxyError::MalformedBackendResponse(
                        "connection closed before complete response received".to_string(),
                    )),
                    Err(e) => Err(ProxyError::MalformedBackendResponse(e.to_string())),
                };
            }

            loop {
                match parse_http_response(&buffer, expect_body) {
                    Ok((response, consumed)) if is_interim(&response) => {
                        tracing::trace!(status = response.status.as_u16(), "Skipping interim response");
                        buffer.advance(consumed);
                    }
                    Ok((response, _)) => return Ok(response),
                    Err(ParseError::Incomplete) => break,
                    Err(e) => return Err(ProxyError::MalformedBackendResponse(e.to_string())),
                }
            }

            if buffer.len() > self.max_response_bytes {
                return Err(ProxyError::MalformedBackendResponse(format!(
                    "response exceeds {} bytes",
                    self.max_response_bytes
                )));
            }

            // Prevent unbounded header growth
            if buffer.len() > MAX_HEADER_BYTES && !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
                return Err(ProxyError::MalformedBackendResponse(
                    "response headers too large".to_string(),
                ));
            }
        }
    }
}

fn is_interim(response: &Response) -> bool {
    let code = response.status.as_u16();
    (100..200).contains(&code) && code != 101
}
