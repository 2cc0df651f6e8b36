use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::discovery::ServiceRecord;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::proxy::router::VirtualHostRouter;

/// Largest request accepted from a client, head and body together
const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// One client connection, handled for a single request/response exchange.
pub struct Connection<S> {
    stream: S,
    buffer: Vec<u8>,
    state: ConnectionState,
    router: Arc<VirtualHostRouter>,
    client_timeout: Duration,
}

pub enum ConnectionState {
    Reading,
    Resolving(Request),
    Forwarding(Request, ServiceRecord),
    Responding(ResponseWriter),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, router: Arc<VirtualHostRouter>, client_timeout: Duration) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(4096),
            state: ConnectionState::Reading,
            router,
            client_timeout,
        }
    }

    /// Drives the connection to `Closed`. Every request that was read gets a
    /// response, whatever fails along the way.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::Reading => self.read_step().await?,

                ConnectionState::Resolving(req) => match self.router.resolve(&req).await {
                    Ok(record) => ConnectionState::Forwarding(req, record),
                    Err(response) => {
                        ConnectionState::Responding(ResponseWriter::new(&fit_to_method(&req, response)))
                    }
                },

                ConnectionState::Forwarding(req, record) => {
                    let response = self.router.forward(&req, &record).await;
                    tracing::info!(
                        host = %record.hostname,
                        method = %req.method,
                        path = %req.path,
                        status = response.status.as_u16(),
                        "Request completed"
                    );
                    ConnectionState::Responding(ResponseWriter::new(&fit_to_method(&req, response)))
                }

                ConnectionState::Responding(mut writer) => {
                    match timeout(self.client_timeout, writer.write_to_stream(&mut self.stream)).await {
                        Ok(result) => result?,
                        Err(_) => anyhow::bail!("timed out writing response to client"),
                    }
                    // Best effort; the stream is closed on drop
                    let _ = timeout(self.client_timeout, self.stream.shutdown()).await;
                    ConnectionState::Closed
                }

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    async fn read_step(&mut self) -> anyhow::Result<ConnectionState> {
        let outcome = match timeout(self.client_timeout, self.read_request()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!("Client did not send a complete request in time");
                return Ok(ConnectionState::Responding(ResponseWriter::new(
                    &Response::request_timeout(),
                )));
            }
        };

        match outcome {
            Ok(Some(req)) => Ok(ConnectionState::Resolving(req)),
            Ok(None) => Ok(ConnectionState::Closed),
            Err(e) => {
                if let Some(parse_error) = e.downcast_ref::<ParseError>() {
                    tracing::debug!(error = %parse_error, "Rejecting malformed request");
                    return Ok(ConnectionState::Responding(ResponseWriter::new(
                        &Response::bad_request("The request could not be parsed."),
                    )));
                }

                if self.buffer.len() > MAX_REQUEST_BYTES {
                    return Ok(ConnectionState::Responding(ResponseWriter::new(
                        &Response::plain(StatusCode::PAYLOAD_TOO_LARGE, "The request is too large."),
                    )));
                }

                Err(e)
            }
        }
    }

    pub async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    // Remove consumed bytes
                    self.buffer.drain(..consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => {
                    // Malformed request → protocol error
                    return Err(e.into());
                }
            }

            if self.buffer.len() > MAX_REQUEST_BYTES {
                anyhow::bail!("request exceeds {} bytes", MAX_REQUEST_BYTES);
            }

            // Read more data
            let mut temp = [0u8; 4096];
            let n = self.stream.read(&mut temp).await?;

            if n == 0 {
                // Client closed connection
                if !self.buffer.is_empty() {
                    tracing::debug!(buffered = self.buffer.len(), "Client closed mid-request");
                }
                return Ok(None);
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
    }
}

/// Replies to `HEAD` keep their headers, `Content-Length` included, but
/// never a body.
fn fit_to_method(request: &Request, mut response: Response) -> Response {
    if request.method == Method::HEAD {
        response.body.clear();
    }
    response
}
