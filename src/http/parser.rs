use crate::http::headers::HeaderMap;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid status line")]
    InvalidStatusLine,
    #[error("invalid header line")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("invalid chunked body")]
    InvalidChunk,
    #[error("incomplete message")]
    Incomplete,
}

/// How the body of a message is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    Empty,
    Length(usize),
    Chunked,
    UntilClose,
}

/// Parses one request from the front of `buf`.
///
/// Returns the request and the number of bytes it occupied, or
/// [`ParseError::Incomplete`] when more data is needed. A start line that
/// cannot be understood does not fail the parse: the request falls back to
/// `GET / HTTP/1.1` with whatever headers and body were sent.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    // Look for header/body separator
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let head = String::from_utf8_lossy(&buf[..headers_end]);

    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let headers = parse_header_lines(lines)?;

    let (method, path, version) = parse_request_line(request_line).unwrap_or_else(|| {
        tracing::debug!(line = %request_line, "Malformed request line, defaulting to GET /");
        (Method::GET, "/".to_string(), "HTTP/1.1".to_string())
    });

    let framing = if is_chunked(&headers) {
        BodyFraming::Chunked
    } else {
        match content_length(&headers)? {
            Some(len) => BodyFraming::Length(len),
            None => BodyFraming::Empty,
        }
    };

    let body_start = headers_end + 4;
    let (body, body_len) = read_body(&buf[body_start..], framing, false)?;

    let mut headers = headers;
    if framing == BodyFraming::Chunked {
        reframe(&mut headers, body.len());
    }

    let request = Request {
        method,
        path,
        version,
        headers,
        body,
    };

    Ok((request, body_start + body_len))
}

/// Parses one response from the front of `buf`.
///
/// `expect_body` is false when the response answers a `HEAD` request, in
/// which case no body is read whatever the headers announce. Responses
/// delimited by connection close report [`ParseError::Incomplete`] here; use
/// [`parse_http_response_at_eof`] once the peer has closed.
pub fn parse_http_response(buf: &[u8], expect_body: bool) -> Result<(Response, usize), ParseError> {
    parse_response(buf, expect_body, false)
}

/// Like [`parse_http_response`], for a buffer the peer will not add to.
pub fn parse_http_response_at_eof(
    buf: &[u8],
    expect_body: bool,
) -> Result<(Response, usize), ParseError> {
    parse_response(buf, expect_body, true)
}

fn parse_response(buf: &[u8], expect_body: bool, at_eof: bool) -> Result<(Response, usize), ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let head = String::from_utf8_lossy(&buf[..headers_end]);

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let (version, status, reason) = parse_status_line(status_line)?;
    let mut headers = parse_header_lines(lines)?;

    let framing = if !expect_body || !status.allows_body() {
        BodyFraming::Empty
    } else if is_chunked(&headers) {
        BodyFraming::Chunked
    } else {
        match content_length(&headers)? {
            Some(len) => BodyFraming::Length(len),
            None => BodyFraming::UntilClose,
        }
    };

    let body_start = headers_end + 4;
    let (body, body_len) = read_body(&buf[body_start..], framing, at_eof)?;

    match framing {
        BodyFraming::Chunked => reframe(&mut headers, body.len()),
        BodyFraming::UntilClose => {
            headers.insert("Content-Length", body.len().to_string());
        }
        _ => {}
    }

    let response = Response {
        version,
        status,
        reason,
        headers,
        body,
    };

    Ok((response, body_start + body_len))
}

fn parse_request_line(line: &str) -> Option<(Method, String, String)> {
    let mut parts = line.split_whitespace();

    let method = Method::from_token(parts.next()?)?;
    let path = parts.next()?;
    let version = parts.next()?;

    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return None;
    }

    Some((method, path.to_string(), version.to_string()))
}

fn parse_status_line(line: &str) -> Result<(String, StatusCode, String), ParseError> {
    let mut parts = line.splitn(3, ' ');

    let version = parts.next().ok_or(ParseError::InvalidStatusLine)?;
    if !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidStatusLine);
    }

    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(StatusCode::from_u16)
        .ok_or(ParseError::InvalidStatusLine)?;

    let reason = parts.next().unwrap_or_default().trim().to_string();

    Ok((version.to_string(), status, reason))
}

fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<HeaderMap, ParseError> {
    let mut headers = HeaderMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        // Obsolete line folding: continuation of the previous value
        if line.starts_with(' ') || line.starts_with('\t') {
            if !headers.append_to_last(line.trim()) {
                return Err(ParseError::InvalidHeader);
            }
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(ParseError::InvalidHeader);
        }

        headers.insert(key, value.trim());
    }

    Ok(headers)
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get("Transfer-Encoding")
        .and_then(|te| te.rsplit(',').next())
        .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

fn content_length(headers: &HeaderMap) -> Result<Option<usize>, ParseError> {
    headers
        .get("Content-Length")
        .map(|v| v.trim().parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
        .transpose()
}

/// Replaces chunked framing with an explicit length after decoding.
fn reframe(headers: &mut HeaderMap, len: usize) {
    headers.remove("Transfer-Encoding");
    headers.insert("Content-Length", len.to_string());
}

fn read_body(data: &[u8], framing: BodyFraming, at_eof: bool) -> Result<(Vec<u8>, usize), ParseError> {
    match framing {
        BodyFraming::Empty => Ok((Vec::new(), 0)),
        BodyFraming::Length(len) => {
            if data.len() < len {
                return Err(ParseError::Incomplete);
            }
            Ok((data[..len].to_vec(), len))
        }
        BodyFraming::Chunked => decode_chunked(data)?.ok_or(ParseError::Incomplete),
        BodyFraming::UntilClose => {
            if !at_eof {
                return Err(ParseError::Incomplete);
            }
            Ok((data.to_vec(), data.len()))
        }
    }
}

/// Decodes a chunked body. Returns `None` while the terminating chunk and
/// trailer section have not arrived yet.
///
/// Frames are located first and the body is copied only once the whole
/// message is present, so re-parsing a growing buffer costs one pass over
/// the chunk headers rather than a copy of everything decoded so far.
fn decode_chunked(data: &[u8]) -> Result<Option<(Vec<u8>, usize)>, ParseError> {
    let Some((chunks, used)) = scan_chunks(data)? else {
        return Ok(None);
    };

    let total = chunks.iter().map(|(start, end)| end - start).sum();
    let mut body = Vec::with_capacity(total);
    for (start, end) in chunks {
        body.extend_from_slice(&data[start..end]);
    }

    Ok(Some((body, used)))
}

/// Byte ranges of the chunk payloads and the length of the whole encoding.
fn scan_chunks(data: &[u8]) -> Result<Option<(Vec<(usize, usize)>, usize)>, ParseError> {
    let mut chunks = Vec::new();
    let mut pos = 0;

    loop {
        let Some(line_len) = find_crlf(&data[pos..]) else {
            return Ok(None);
        };

        let size_line = std::str::from_utf8(&data[pos..pos + line_len])
            .map_err(|_| ParseError::InvalidChunk)?;
        // Chunk extensions are ignored
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| ParseError::InvalidChunk)?;
        pos += line_len + 2;

        if size == 0 {
            // Trailer section, discarded, ends with an empty line
            loop {
                let Some(trailer_len) = find_crlf(&data[pos..]) else {
                    return Ok(None);
                };
                pos += trailer_len + 2;
                if trailer_len == 0 {
                    return Ok(Some((chunks, pos)));
                }
            }
        }

        let chunk_end = pos.checked_add(size).ok_or(ParseError::InvalidChunk)?;
        let frame_end = chunk_end.checked_add(2).ok_or(ParseError::InvalidChunk)?;
        if data.len() < frame_end {
            return Ok(None);
        }

        if &data[chunk_end..frame_end] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }
        chunks.push((pos, chunk_end));
        pos = frame_end;
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn chunked_waits_for_terminator() {
        let partial = b"5\r\nhello\r\n";
        assert_eq!(decode_chunked(partial).unwrap(), None);

        let full = b"5\r\nhello\r\n0\r\n\r\n";
        let (body, used) = decode_chunked(full).unwrap().unwrap();
        assert_eq!(body, b"hello");
        assert_eq!(used, full.len());
    }

    #[test]
    fn chunk_size_overflow_is_rejected() {
        let data = b"ffffffffffffffffff\r\n";
        assert_eq!(decode_chunked(data), Err(ParseError::InvalidChunk));
    }

    #[test]
    fn chunk_size_near_max_is_rejected_not_wrapped() {
        let resp = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffec\r\nxx";
        let result = std::panic::catch_unwind(|| parse_http_response(resp, true));

        assert!(matches!(result, Ok(Err(ParseError::InvalidChunk))));
    }

    #[test]
    fn chunk_payloads_are_located_before_copying() {
        let partial = b"3\r\nabc\r\n4\r\nde";
        assert_eq!(scan_chunks(partial).unwrap(), None);

        let full = b"3\r\nabc\r\n4\r\ndefg\r\n0\r\n\r\n";
        let (chunks, used) = scan_chunks(full).unwrap().unwrap();
        assert_eq!(chunks, vec![(3, 6), (11, 15)]);
        assert_eq!(used, full.len());
    }
}
