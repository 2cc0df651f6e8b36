//! DNS-SD discovery over multicast DNS.
//!
//! A background task keeps browsing one service type and maintains a table
//! of resolved instances keyed by lowercased instance label. Lookups read
//! the table and, when the name is not there yet, wait for the browser to
//! report more instances. The caller bounds that wait.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::{Notify, RwLock};

use crate::discovery::provider::{Discovered, ServiceDiscoveryProvider};

pub struct MdnsProvider {
    table: Arc<RwLock<HashMap<String, Discovered>>>,
    updated: Arc<Notify>,
    daemon: ServiceDaemon,
    service_type: String,
}

impl MdnsProvider {
    /// Starts the daemon and the browse task. Must be called from within a
    /// tokio runtime.
    pub fn spawn(service_type: &str) -> Result<Self> {
        let service_type = fully_qualified(service_type);

        let daemon = ServiceDaemon::new().context("Failed to create mDNS daemon")?;
        let receiver = daemon
            .browse(&service_type)
            .with_context(|| format!("Failed to browse {}", service_type))?;

        let table: Arc<RwLock<HashMap<String, Discovered>>> = Arc::default();
        let updated = Arc::new(Notify::new());

        tracing::info!(service_type = %service_type, "Starting mDNS browser");

        let browse_table = table.clone();
        let browse_updated = updated.clone();
        let browse_type = service_type.clone();
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        if let Some((label, found)) = convert_service_info(&info, &browse_type) {
                            tracing::debug!(instance = %label, address = %found.address, port = found.port, "Resolved service");
                            browse_table.write().await.insert(label, found);
                            browse_updated.notify_waiters();
                        }
                    }
                    ServiceEvent::ServiceRemoved(_, fullname) => {
                        let label = instance_label(&fullname, &browse_type);
                        tracing::debug!(instance = %label, "Service removed");
                        browse_table.write().await.remove(&label);
                    }
                    _ => {}
                }
            }
            tracing::info!(service_type = %browse_type, "mDNS browser stopped");
        });

        Ok(Self {
            table,
            updated,
            daemon,
            service_type,
        })
    }
}

impl Drop for MdnsProvider {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.shutdown() {
            tracing::debug!(error = %e, service_type = %self.service_type, "mDNS daemon shutdown failed");
        }
    }
}

#[async_trait]
impl ServiceDiscoveryProvider for MdnsProvider {
    async fn lookup(&self, service_name: &str) -> Result<Option<Discovered>> {
        let key = service_name.to_ascii_lowercase();

        loop {
            // Register interest before checking so an insert in between is not missed
            let notified = self.updated.notified();

            if let Some(found) = self.table.read().await.get(&key) {
                return Ok(Some(found.clone()));
            }

            notified.await;
        }
    }
}

fn fully_qualified(service_type: &str) -> String {
    if service_type.ends_with('.') {
        service_type.to_string()
    } else {
        format!("{}.", service_type)
    }
}

/// `Files._webdav._tcp.local.` → `files`
fn instance_label(fullname: &str, service_type: &str) -> String {
    let label = fullname
        .strip_suffix(service_type)
        .map(|rest| rest.trim_end_matches('.'))
        .unwrap_or_else(|| fullname.split('.').next().unwrap_or(fullname));

    label.to_ascii_lowercase()
}

/// Convert an mdns-sd ServiceInfo to a lookup result keyed by instance label.
fn convert_service_info(info: &ServiceInfo, service_type: &str) -> Option<(String, Discovered)> {
    let addresses = info.get_addresses();

    let address = addresses
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addresses.iter().next())
        .map(IpAddr::to_string)
        .or_else(|| {
            let host = info.get_hostname().trim_end_matches('.');
            (!host.is_empty()).then(|| host.to_string())
        })?;

    // TXT records carry the capability map
    let capabilities: HashMap<String, String> = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
        .collect();

    let label = instance_label(info.get_fullname(), service_type);

    Some((
        label,
        Discovered {
            address,
            port: info.get_port(),
            capabilities,
        },
    ))
}
