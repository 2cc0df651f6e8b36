use vhost_proxy::http::headers::HeaderMap;
use vhost_proxy::http::request::{Method, Request, RequestBuilder};

fn request_with(headers: HeaderMap) -> Request {
    Request {
        method: Method::GET,
        path: "/".to_string(),
        version: "HTTP/1.1".to_string(),
        headers,
        body: vec![],
    }
}

#[test]
fn test_request_header_retrieval() {
    let headers: HeaderMap = [("Host", "example.com"), ("Content-Type", "application/json")]
        .into_iter()
        .collect();
    let req = request_with(headers);

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_host_ignores_blank_value() {
    let req = request_with([("Host", "  ")].into_iter().collect());
    assert_eq!(req.host(), None);

    let req = request_with([("host", "files.local:8080")].into_iter().collect());
    assert_eq!(req.host(), Some("files.local:8080"));
}

#[test]
fn test_request_with_header_leaves_original_untouched() {
    let original = request_with([("Accept", "text/html")].into_iter().collect());
    let rewritten = original.with_header("accept", "application/json");

    assert_eq!(original.header("Accept"), Some("text/html"));
    assert_eq!(rewritten.header("Accept"), Some("application/json"));
    assert_eq!(rewritten.headers.len(), 1);
}

#[test]
fn test_request_method_from_string() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("PROPFIND"), Some(Method::PROPFIND));
    assert_eq!(Method::from_str("INVALID"), None);
    assert_eq!(Method::from_str("get"), None); // Case-sensitive
}

#[test]
fn test_request_method_from_token() {
    assert_eq!(
        Method::from_token("REPORT"),
        Some(Method::Extension("REPORT".to_string()))
    );
    assert_eq!(Method::from_token("BAD METHOD"), None);
    assert_eq!(Method::from_token(""), None);
    assert_eq!(Method::from_token("REPORT").unwrap().as_str(), "REPORT");
}

#[test]
fn test_request_builder_defaults_version() {
    let req = RequestBuilder::new()
        .method(Method::MKCOL)
        .path("/new")
        .build()
        .unwrap();

    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.method.to_string(), "MKCOL");
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
}
