//! Tests for content renegotiation and listing rendering

use std::collections::HashMap;

use vhost_proxy::discovery::{BackendAddr, ServiceRecord};
use vhost_proxy::error::ProxyError;
use vhost_proxy::http::request::{Method, Request, RequestBuilder};
use vhost_proxy::http::response::{Response, ResponseBuilder, StatusCode};
use vhost_proxy::http::writer::serialize_response;
use vhost_proxy::renegotiate::{
    DirectoryListing, ItemKind, Renegotiator, format_size, is_browser, render_listing,
    rewrite_request, rewrite_response, supports_json,
};

const SAMPLE_LISTING: &str = r#"{"type":"directory_listing","path":"/a","items":[{"name":"doc","type":"folder","path":"/a/doc"},{"name":"x.jpg","type":"file","path":"/a/x.jpg","size":2048}]}"#;

const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

fn json_capable() -> HashMap<String, String> {
    HashMap::from([("json".to_string(), "true".to_string())])
}

fn record(capabilities: HashMap<String, String>) -> ServiceRecord {
    ServiceRecord::new("files.local", BackendAddr::new("127.0.0.1", 8081), capabilities)
}

fn request(user_agent: Option<&str>) -> Request {
    let mut builder = RequestBuilder::new()
        .method(Method::GET)
        .path("/a/")
        .header("Host", "files.local")
        .header("Accept", "text/html");
    if let Some(ua) = user_agent {
        builder = builder.header("User-Agent", ua);
    }
    builder.build().unwrap()
}

fn json_response(body: &str) -> Response {
    ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("ETag", "\"v1\"")
        .header("X-Backend", "dav")
        .body(body.as_bytes().to_vec())
        .build()
}

#[test]
fn test_render_sample_listing() {
    let listing = DirectoryListing::from_json(SAMPLE_LISTING.as_bytes()).unwrap();
    assert_eq!(listing.items[0].kind, ItemKind::Folder);

    let html = render_listing(&listing, "/.proxy/style.css");

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<a href=\"/a/doc/\">doc/</a>"));
    assert!(html.contains("<a href=\"/a/x.jpg\">x.jpg</a>"));
    assert!(html.contains("<td>2.0 KB</td>"));
    assert!(html.contains("<link rel=\"stylesheet\" href=\"/.proxy/style.css\">"));
    // Parent of /a is the root
    assert!(html.contains("<a href=\"/\">../</a>"));
}

#[test]
fn test_render_root_listing_has_no_parent_link() {
    let listing = DirectoryListing::from_json(
        br#"{"type":"directory_listing","path":"/","items":[]}"#,
    )
    .unwrap();

    let html = render_listing(&listing, "/s.css");
    assert!(!html.contains("../"));
    assert!(html.contains("Index of /"));
}

#[test]
fn test_render_escapes_backend_strings() {
    let listing = DirectoryListing::from_json(
        br#"{"type":"directory_listing","path":"/<p>","items":[{"name":"a\"b<c>.txt","type":"file","path":"/<p>/a\"b<c>.txt","size":1}]}"#,
    )
    .unwrap();

    let html = render_listing(&listing, "/s.css");

    assert!(!html.contains("<c>"));
    assert!(!html.contains("<p>"));
    assert!(html.contains("a&quot;b&lt;c&gt;.txt"));
    assert!(html.contains("Index of /&lt;p&gt;"));
}

#[test]
fn test_format_size_boundaries() {
    assert_eq!(format_size(0), "0 B");
    assert_eq!(format_size(1023), "1023 B");
    assert_eq!(format_size(1024), "1.0 KB");
    assert_eq!(format_size(1536), "1.5 KB");
    assert_eq!(format_size(2047), "2.0 KB");
    assert_eq!(format_size(1_048_575), "1024.0 KB");
    assert_eq!(format_size(1_048_576), "1.0 MB");
    assert_eq!(format_size(1_073_741_824), "1.0 GB");
}

#[test]
fn test_listing_shape_mismatch() {
    let bodies: [&[u8]; 4] = [
        b"not json",
        br#"{"type":"file","path":"/a","items":[]}"#,
        br#"{"type":"directory_listing","path":"/a"}"#,
        br#"[1,2,3]"#,
    ];

    for body in bodies {
        let result = DirectoryListing::from_json(body);
        assert!(matches!(result, Err(ProxyError::PayloadShapeMismatch(_))));
    }
}

#[test]
fn test_browser_detection() {
    let tokens: Vec<String> = ["Mozilla", "Chrome"].iter().map(|s| s.to_string()).collect();

    assert!(is_browser(Some(FIREFOX), &tokens));
    assert!(!is_browser(Some("curl/8.5.0"), &tokens));
    assert!(!is_browser(None, &tokens));
}

#[test]
fn test_json_capability_values() {
    for yes in ["true", "1", "yes", "ON"] {
        let caps = HashMap::from([("json".to_string(), yes.to_string())]);
        assert!(supports_json(&caps), "{yes} should enable json");
    }

    for no in ["false", "0", ""] {
        let caps = HashMap::from([("json".to_string(), no.to_string())]);
        assert!(!supports_json(&caps), "{no} should not enable json");
    }

    assert!(!supports_json(&HashMap::new()));
}

#[test]
fn test_outbound_accept_rewritten_for_browser() {
    let negotiator = Renegotiator::default();
    let original = request(Some(FIREFOX));

    let outbound = negotiator.outbound(&original, &record(json_capable()));

    assert_eq!(outbound.header("Accept"), Some("application/json"));
    assert_eq!(original.header("Accept"), Some("text/html"));
    assert_eq!(outbound.path, original.path);
}

#[test]
fn test_outbound_unchanged_without_json_capability() {
    let negotiator = Renegotiator::default();

    for ua in [Some(FIREFOX), Some("curl/8.5.0"), None] {
        let original = request(ua);
        let outbound = negotiator.outbound(&original, &record(HashMap::new()));
        assert_eq!(outbound, original);
    }
}

#[test]
fn test_outbound_unchanged_for_non_browser() {
    let original = request(Some("curl/8.5.0"));
    let outbound = rewrite_request(&original, false, &json_capable());

    assert_eq!(outbound, original);
}

#[test]
fn test_inbound_renders_listing_for_browser() {
    let negotiator = Renegotiator::default();
    let response = negotiator.inbound(
        &request(Some(FIREFOX)),
        json_response(SAMPLE_LISTING),
        &record(json_capable()),
    );

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(response.header("ETag"), None);
    assert_eq!(response.header("X-Backend"), Some("dav"));
    assert_eq!(
        response.header("Content-Length"),
        Some(response.body.len().to_string().as_str())
    );

    let html = String::from_utf8(response.body).unwrap();
    assert!(html.contains("href=\"/a/x.jpg\""));
}

#[test]
fn test_inbound_uses_advertised_stylesheet() {
    let negotiator = Renegotiator::new(vec!["Mozilla".to_string()], "/default.css");
    let mut caps = json_capable();
    caps.insert("stylesheet".to_string(), "/theme/dark.css".to_string());

    let response = negotiator.inbound(
        &request(Some(FIREFOX)),
        json_response(SAMPLE_LISTING),
        &record(caps),
    );
    let html = String::from_utf8(response.body).unwrap();

    assert!(html.contains("href=\"/theme/dark.css\""));
    assert!(!html.contains("/default.css"));
}

#[test]
fn test_inbound_malformed_json_yields_error_document() {
    let negotiator = Renegotiator::default();
    let broken = ResponseBuilder::new(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(b"{\"type\":".to_vec())
        .build();

    let response = negotiator.inbound(&request(Some(FIREFOX)), broken, &record(json_capable()));

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.header("Content-Type"), Some("text/html; charset=utf-8"));

    let html = String::from_utf8(response.body).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Listing unavailable"));
    assert!(html.trim_end().ends_with("</html>"));
}

#[test]
fn test_inbound_untouched_for_non_browser() {
    let negotiator = Renegotiator::default();
    let original = json_response(SAMPLE_LISTING);

    let response = negotiator.inbound(
        &request(Some("curl/8.5.0")),
        original.clone(),
        &record(json_capable()),
    );

    assert_eq!(response, original);
}

#[test]
fn test_inbound_untouched_for_other_media_types() {
    let negotiator = Renegotiator::default();
    let original = ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", "image/jpeg")
        .body(vec![0xff, 0xd8, 0xff])
        .build();

    let response = negotiator.inbound(&request(Some(FIREFOX)), original.clone(), &record(json_capable()));

    assert_eq!(response, original);
}

#[test]
fn test_failure_for_browser_is_html_with_same_status() {
    let negotiator = Renegotiator::default();

    let response = negotiator.failure(
        &request(Some(FIREFOX)),
        &record(json_capable()),
        ProxyError::BackendUnreachable("connection refused".to_string()),
    );

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.header("Content-Type"), Some("text/html; charset=utf-8"));
}

#[test]
fn test_failure_for_non_browser_is_plain() {
    let negotiator = Renegotiator::default();

    let response = negotiator.failure(
        &request(Some("curl/8.5.0")),
        &record(json_capable()),
        ProxyError::BackendUnreachable("connection refused".to_string()),
    );

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.header("Content-Type"), Some("text/plain; charset=utf-8"));
}

#[test]
fn test_inbound_leaves_bodiless_statuses_alone() {
    let negotiator = Renegotiator::default();

    for code in [204, 304] {
        let original = ResponseBuilder::new(StatusCode::from_u16(code).unwrap())
            .header("Content-Type", "application/json")
            .header("Content-Length", "0")
            .build();

        let response = negotiator.inbound(&request(Some(FIREFOX)), original.clone(), &record(json_capable()));

        assert_eq!(response, original);
        assert!(response.body.is_empty());
    }
}

#[test]
fn test_not_modified_is_serialized_without_body() {
    let original = ResponseBuilder::new(StatusCode::NOT_MODIFIED)
        .header("Content-Type", "application/json")
        .header("ETag", "\"v1\"")
        .build();

    let response = rewrite_response(original, true, &json_capable(), "/s.css");
    let text = String::from_utf8(serialize_response(&response)).unwrap();

    assert!(text.starts_with("HTTP/1.1 304 Not Modified\r\n"));
    assert!(text.ends_with("\r\n\r\n"));
    assert!(!text.contains("text/html"));
}

#[test]
fn test_inbound_passes_head_reply_through() {
    let negotiator = Renegotiator::default();
    let head = RequestBuilder::new()
        .method(Method::HEAD)
        .path("/a/")
        .header("User-Agent", FIREFOX)
        .build()
        .unwrap();
    let original = ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Content-Length", "158")
        .build();

    let response = negotiator.inbound(&head, original.clone(), &record(json_capable()));

    assert_eq!(response, original);
    assert_eq!(response.header("Content-Length"), Some("158"));
}

#[test]
fn test_failure_for_head_is_plain() {
    let negotiator = Renegotiator::default();
    let head = RequestBuilder::new()
        .method(Method::HEAD)
        .path("/a/")
        .header("User-Agent", FIREFOX)
        .build()
        .unwrap();

    let response = negotiator.failure(
        &head,
        &record(json_capable()),
        ProxyError::BackendUnreachable("connection refused".to_string()),
    );

    assert_eq!(response.header("Content-Type"), Some("text/plain; charset=utf-8"));
}
