use std::collections::HashMap;

use crate::config::RenegotiationConfig;
use crate::discovery::record::{CAP_JSON, CAP_STYLESHEET, ServiceRecord};
use crate::error::ProxyError;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder};
use crate::renegotiate::listing::DirectoryListing;
use crate::renegotiate::render::{render_error, render_listing};

pub const JSON_MEDIA_TYPE: &str = "application/json";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Headers describing the backend's representation, which no longer apply
/// once the body has been rendered.
const REPRESENTATION_HEADERS: [&str; 5] = [
    "Content-Type",
    "Content-Length",
    "Content-Encoding",
    "Transfer-Encoding",
    "ETag",
];

/// Whether the `User-Agent` names one of the browser tokens.
pub fn is_browser(user_agent: Option<&str>, tokens: &[String]) -> bool {
    user_agent
        .map(|ua| tokens.iter().any(|token| ua.contains(token.as_str())))
        .unwrap_or(false)
}

/// Whether the backend advertises the JSON listing representation.
pub fn supports_json(capabilities: &HashMap<String, String>) -> bool {
    capabilities
        .get(CAP_JSON)
        .map(|v| {
            let v = v.trim();
            ["true", "1", "yes", "on"]
                .iter()
                .any(|yes| v.eq_ignore_ascii_case(yes))
        })
        .unwrap_or(false)
}

/// Stylesheet advertised by the backend, or `default`.
pub fn stylesheet<'a>(capabilities: &'a HashMap<String, String>, default: &'a str) -> &'a str {
    capabilities
        .get(CAP_STYLESHEET)
        .map(String::as_str)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or(default)
}

/// Request to send upstream: asks for JSON when a browser is talking to a
/// backend that can produce it, otherwise an unchanged copy.
pub fn rewrite_request(
    request: &Request,
    browser: bool,
    capabilities: &HashMap<String, String>,
) -> Request {
    if browser && supports_json(capabilities) {
        request.with_header("Accept", JSON_MEDIA_TYPE)
    } else {
        request.clone()
    }
}

/// Response to return to the client: JSON listings become HTML for browsers,
/// everything else passes through untouched.
///
/// Statuses that cannot carry a body are never rendered. Callers answering a
/// `HEAD` request must not call this at all; see [`Renegotiator::inbound`].
pub fn rewrite_response(
    response: Response,
    browser: bool,
    capabilities: &HashMap<String, String>,
    default_stylesheet: &str,
) -> Response {
    if !browser
        || !response.status.allows_body()
        || response.media_type().as_deref() != Some(JSON_MEDIA_TYPE)
    {
        return response;
    }

    let document = match DirectoryListing::from_json(&response.body) {
        Ok(listing) => render_listing(&listing, stylesheet(capabilities, default_stylesheet)),
        Err(e) => {
            tracing::warn!(error = %e, status = response.status.as_u16(), "Could not render listing");
            render_error("The server returned a listing this proxy could not read.")
        }
    };

    let mut headers = response.headers;
    for name in REPRESENTATION_HEADERS {
        headers.remove(name);
    }

    ResponseBuilder::new(response.status)
        .version(response.version)
        .reason(response.reason)
        .headers(headers)
        .header("Content-Type", HTML_CONTENT_TYPE)
        .body(document.into_bytes())
        .build()
}

/// Renegotiation policy configured for the proxy.
#[derive(Debug, Clone)]
pub struct Renegotiator {
    browser_tokens: Vec<String>,
    default_stylesheet: String,
}

impl Renegotiator {
    pub fn new(browser_tokens: Vec<String>, default_stylesheet: impl Into<String>) -> Self {
        Self {
            browser_tokens,
            default_stylesheet: default_stylesheet.into(),
        }
    }

    pub fn from_config(cfg: &RenegotiationConfig) -> Self {
        Self::new(cfg.browser_tokens.clone(), cfg.default_stylesheet.clone())
    }

    pub fn is_browser(&self, request: &Request) -> bool {
        is_browser(request.user_agent(), &self.browser_tokens)
    }

    pub fn outbound(&self, request: &Request, record: &ServiceRecord) -> Request {
        rewrite_request(request, self.is_browser(request), &record.capabilities)
    }

    /// `request` is the client's original request. Replies to `HEAD` pass
    /// through since they announce a body they do not carry.
    pub fn inbound(&self, request: &Request, response: Response, record: &ServiceRecord) -> Response {
        if request.method == Method::HEAD {
            return response;
        }

        rewrite_response(
            response,
            self.is_browser(request),
            &record.capabilities,
            &self.default_stylesheet,
        )
    }

    /// Response for a request whose backend could not be used. Browsers on
    /// the rendering path get an HTML error document with the same status.
    pub fn failure(&self, request: &Request, record: &ServiceRecord, error: ProxyError) -> Response {
        let plain = error.into_response();
        if request.method == Method::HEAD
            || !(self.is_browser(request) && supports_json(&record.capabilities))
        {
            return plain;
        }

        ResponseBuilder::new(plain.status)
            .header("Content-Type", HTML_CONTENT_TYPE)
            .body(render_error("The server behind this address could not be reached.").into_bytes())
            .build()
    }
}

impl Default for Renegotiator {
    fn default() -> Self {
        Self::from_config(&RenegotiationConfig::default())
    }
}
