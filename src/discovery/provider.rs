use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{DiscoveryConfig, ProviderKind};
use crate::discovery::mdns::MdnsProvider;
use crate::discovery::static_registry::StaticRegistry;

/// A backend as reported by a discovery mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub address: String,
    pub port: u16,
    pub capabilities: HashMap<String, String>,
}

/// Maps a service name to a live backend.
///
/// `Ok(None)` means the service is not currently known. Errors are treated
/// the same way by the cache but are logged, so providers should reserve
/// them for failures of the mechanism itself.
#[async_trait]
pub trait ServiceDiscoveryProvider: Send + Sync {
    async fn lookup(&self, service_name: &str) -> anyhow::Result<Option<Discovered>>;
}

/// Builds the provider selected in the configuration.
pub fn build_provider(cfg: &DiscoveryConfig) -> anyhow::Result<Arc<dyn ServiceDiscoveryProvider>> {
    match cfg.provider {
        ProviderKind::Static => {
            let registry = StaticRegistry::from_config(&cfg.services);
            tracing::info!(services = registry.len(), "Using static service registry");
            Ok(Arc::new(registry))
        }
        ProviderKind::Mdns => {
            let service_type = cfg
                .service_type
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("discovery.service_type is required for mdns"))?;
            Ok(Arc::new(MdnsProvider::spawn(service_type)?))
        }
    }
}
