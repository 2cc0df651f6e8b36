//! Discovery from a fixed table, typically the `discovery.services` section
//! of the configuration.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::StaticService;
use crate::discovery::provider::{Discovered, ServiceDiscoveryProvider};

#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    services: HashMap<String, Discovered>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(services: &HashMap<String, StaticService>) -> Self {
        services
            .iter()
            .fold(Self::new(), |registry, (name, service)| {
                registry.with_service(
                    name,
                    Discovered {
                        address: service.address.clone(),
                        port: service.port,
                        capabilities: service.capabilities.clone(),
                    },
                )
            })
    }

    /// Registers a service under a case-insensitive name.
    pub fn with_service(mut self, name: &str, service: Discovered) -> Self {
        self.services.insert(name.to_ascii_lowercase(), service);
        self
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl ServiceDiscoveryProvider for StaticRegistry {
    async fn lookup(&self, service_name: &str) -> anyhow::Result<Option<Discovered>> {
        Ok(self.services.get(&service_name.to_ascii_lowercase()).cloned())
    }
}
