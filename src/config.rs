//! Proxy configuration.
//!
//! Loaded from a YAML file named by `VHOST_PROXY_CONFIG` (default
//! `vhost-proxy.yaml`). Every section is optional; a missing file yields the
//! defaults. `LISTEN` overrides the listen address.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_ENV: &str = "VHOST_PROXY_CONFIG";
pub const LISTEN_ENV: &str = "LISTEN";
const DEFAULT_CONFIG_PATH: &str = "vhost-proxy.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub discovery: DiscoveryConfig,
    pub renegotiation: RenegotiationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Upper bound on connections handled at once
    pub max_connections: usize,
    /// Bounds reading the request from and writing the response to a client
    pub client_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Bounds reading the complete backend response
    pub read_timeout_ms: u64,
    pub max_response_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Static,
    Mdns,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub provider: ProviderKind,
    pub ttl_secs: u64,
    pub timeout_ms: u64,
    /// DNS-SD service type browsed by the mDNS provider,
    /// e.g. `_webdav._tcp.local.`
    pub service_type: Option<String>,
    /// Entries served by the static provider, keyed by service name
    pub services: HashMap<String, StaticService>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticService {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub capabilities: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenegotiationConfig {
    /// Substrings of `User-Agent` that identify an interactive browser
    pub browser_tokens: Vec<String>,
    /// Stylesheet used when a backend does not advertise one
    pub default_stylesheet: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            client_timeout_ms: 5_000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            write_timeout_ms: 2_000,
            read_timeout_ms: 5_000,
            max_response_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Static,
            ttl_secs: 30,
            timeout_ms: 3_000,
            service_type: None,
            services: HashMap::new(),
        }
    }
}

impl Default for RenegotiationConfig {
    fn default() -> Self {
        Self {
            browser_tokens: ["Mozilla", "Chrome", "Safari", "Firefox", "Edg", "Opera"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_stylesheet: "/.proxy/style.css".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl DiscoveryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Loads the configuration named by the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&path);

        let mut cfg = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        if let Ok(listen_addr) = std::env::var(LISTEN_ENV) {
            cfg.server.listen_addr = listen_addr;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            anyhow::bail!("server.max_connections must be greater than zero");
        }

        let timeouts = [
            ("server.client_timeout_ms", self.server.client_timeout_ms),
            ("backend.connect_timeout_ms", self.backend.connect_timeout_ms),
            ("backend.write_timeout_ms", self.backend.write_timeout_ms),
            ("backend.read_timeout_ms", self.backend.read_timeout_ms),
            ("discovery.timeout_ms", self.discovery.timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            anyhow::bail!("{} must be greater than zero", name);
        }

        if self.discovery.provider == ProviderKind::Mdns
            && self.discovery.service_type.as_deref().is_none_or(str::is_empty)
        {
            anyhow::bail!("discovery.service_type is required for the mdns provider");
        }

        for (name, service) in &self.discovery.services {
            // Bare IPv6 literals are fine here; url::Host wants them bracketed
            if service.address.parse::<std::net::IpAddr>().is_ok() {
                continue;
            }
            url::Host::parse(&service.address).with_context(|| {
                format!("Invalid address for service {}: {}", name, service.address)
            })?;
        }

        Ok(())
    }
}
