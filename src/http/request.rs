use crate::http::headers::HeaderMap;

/// HTTP request methods.
///
/// Covers the HTTP/1.1 methods and the WebDAV extensions a file backend
/// expects. Any other syntactically valid method token is carried through as
/// [`Method::Extension`] so the proxy never has to understand a method to
/// forward it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
    // WebDAV (RFC 4918)
    PROPFIND,
    PROPPATCH,
    MKCOL,
    COPY,
    MOVE,
    LOCK,
    UNLOCK,
    /// Any other valid method token, stored verbatim
    Extension(String),
}

/// Represents a parsed HTTP request from a client.
///
/// Requests are treated as values: stages that need a different request
/// (e.g. a rewritten `Accept` header) build a new one with
/// [`Request::with_header`] instead of mutating a shared instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (GET, PROPFIND, etc.)
    pub method: Method,
    /// The request target, including any query component
    pub path: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body, empty when the request carried none
    pub body: Vec<u8>,
}

/// Builder for constructing Request objects.
#[derive(Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Method {
    /// Parses one of the known HTTP or WebDAV methods.
    ///
    /// Matching is case-sensitive, as method tokens are.
    ///
    /// ```
    /// # use vhost_proxy::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("PROPFIND"), Some(Method::PROPFIND));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            "PROPFIND" => Some(Method::PROPFIND),
            "PROPPATCH" => Some(Method::PROPPATCH),
            "MKCOL" => Some(Method::MKCOL),
            "COPY" => Some(Method::COPY),
            "MOVE" => Some(Method::MOVE),
            "LOCK" => Some(Method::LOCK),
            "UNLOCK" => Some(Method::UNLOCK),
            _ => None,
        }
    }

    /// Parses any valid method token, falling back to [`Method::Extension`]
    /// for tokens that are not one of the known methods.
    pub fn from_token(s: &str) -> Option<Self> {
        if let Some(method) = Self::from_str(s) {
            return Some(method);
        }

        if is_token(s) {
            Some(Method::Extension(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::PROPFIND => "PROPFIND",
            Method::PROPPATCH => "PROPPATCH",
            Method::MKCOL => "MKCOL",
            Method::COPY => "COPY",
            Method::MOVE => "MOVE",
            Method::LOCK => "LOCK",
            Method::UNLOCK => "UNLOCK",
            Method::Extension(token) => token,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `token` as defined by RFC 9110 section 5.6.2.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
        })
    }
}

impl Request {
    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// The `Host` header, if the client sent one.
    pub fn host(&self) -> Option<&str> {
        self.header("Host").filter(|h| !h.trim().is_empty())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("User-Agent")
    }

    /// Returns a copy of this request with one header set (or replaced).
    pub fn with_header(&self, key: &str, value: impl Into<String>) -> Request {
        let mut next = self.clone();
        next.headers.insert(key, value);
        next
    }
}
