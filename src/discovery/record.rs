use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use tokio::time::Instant;

/// Capability flag: the backend can answer with a JSON directory listing.
pub const CAP_JSON: &str = "json";
/// Capability value: path of the stylesheet used by rendered listings.
pub const CAP_STYLESHEET: &str = "stylesheet";

/// Network location of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendAddr {
    pub host: String,
    pub port: u16,
}

impl BackendAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]:{}", self.host, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}

impl fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

/// What discovery knows about the backend serving one hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Normalized routing key (lowercase, no port)
    pub hostname: String,
    pub backend: BackendAddr,
    /// When discovery produced this record
    pub resolved_at: Instant,
    /// Advertised capabilities; unknown keys are carried but ignored
    pub capabilities: HashMap<String, String>,
}

impl ServiceRecord {
    pub fn new(
        hostname: impl Into<String>,
        backend: BackendAddr,
        capabilities: HashMap<String, String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            backend,
            resolved_at: Instant::now(),
            capabilities,
        }
    }

    /// A record may be served from cache only while this holds.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.resolved_at.elapsed() <= ttl
    }
}

/// Turns a `Host` header value into a routing key.
///
/// Strips a trailing `:port` and the brackets around IPv6 literals, drops a
/// trailing root dot and lowercases the rest.
///
/// ```
/// # use vhost_proxy::discovery::normalize_host;
/// assert_eq!(normalize_host("Example.COM:8080"), "example.com");
/// assert_eq!(normalize_host("[::1]:8080"), "::1");
/// ```
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();

    let without_port = if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or_default()
    } else if host.matches(':').count() == 1 {
        match host.rsplit_once(':') {
            Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => host,
        }
    } else {
        host
    };

    without_port.trim_end_matches('.').to_ascii_lowercase()
}

/// Name handed to the discovery provider for a normalized hostname: the
/// first DNS label, or the whole host for IP literals.
pub fn service_name(hostname: &str) -> &str {
    if hostname.parse::<IpAddr>().is_ok() {
        return hostname;
    }
    hostname.split('.').next().unwrap_or(hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_port_and_case() {
        assert_eq!(normalize_host("Files.Local:80"), "files.local");
        assert_eq!(normalize_host("files.local."), "files.local");
        assert_eq!(normalize_host("  files  "), "files");
    }

    #[test]
    fn ipv6_literals() {
        assert_eq!(normalize_host("[FE80::1]"), "fe80::1");
        assert_eq!(normalize_host("fe80::1"), "fe80::1");
    }

    #[test]
    fn service_name_is_first_label() {
        assert_eq!(service_name("files.local"), "files");
        assert_eq!(service_name("files"), "files");
        assert_eq!(service_name("10.0.0.7"), "10.0.0.7");
    }

    #[test]
    fn ipv6_authority_is_bracketed() {
        assert_eq!(BackendAddr::new("::1", 81).authority(), "[::1]:81");
        assert_eq!(BackendAddr::new("nas", 81).authority(), "nas:81");
    }
}
