use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::HeaderMap;
use crate::http::request::Request;
use crate::http::response::Response;

/// Serializes a response, keeping `Content-Length` consistent with the body.
///
/// A missing length is filled in, a length that disagrees with a non-empty
/// body is corrected, and an existing length on an empty body is kept since
/// replies to `HEAD` legitimately announce a length they do not send.
/// Statuses that cannot carry a body are written as-is.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        resp.version,
        resp.status.as_u16(),
        resp.reason
    );
    buf.extend_from_slice(status_line.as_bytes());

    let mut headers = resp.headers.clone();
    if resp.status.allows_body() {
        let body_len = resp.body.len().to_string();
        let stale = match headers.get("Content-Length") {
            None => true,
            Some(existing) => !resp.body.is_empty() && existing.trim() != body_len,
        };
        if stale {
            headers.insert("Content-Length", body_len);
        }
        headers.remove("Transfer-Encoding");
    }

    write_head(&mut buf, &headers);

    // Body
    buf.extend_from_slice(&resp.body);

    buf
}

/// Serializes a request as it goes out to a backend.
pub fn serialize_request(req: &Request) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + req.body.len());

    let path = if req.path.is_empty() { "/" } else { &req.path };
    let request_line = format!("{} {} {}\r\n", req.method, path, req.version);
    buf.extend_from_slice(request_line.as_bytes());

    write_head(&mut buf, &req.headers);

    buf.extend_from_slice(&req.body);

    buf
}

fn write_head(buf: &mut Vec<u8>, headers: &HeaderMap) {
    for (k, v) in headers.iter() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");
}

pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub async fn write_to_stream<S>(&mut self, stream: &mut S) -> anyhow::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream
                .write(&self.buffer[self.written..])
                .await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;

        Ok(())
    }
}
