//! Hostname-based backend discovery.
//!
//! The [`DiscoveryCache`] sits in front of a [`ServiceDiscoveryProvider`]
//! and answers "which backend serves this `Host`?" with a [`ServiceRecord`]
//! that stays valid for a configured TTL.

pub mod cache;
pub mod mdns;
pub mod provider;
pub mod record;
pub mod static_registry;

pub use cache::DiscoveryCache;
pub use provider::{Discovered, ServiceDiscoveryProvider, build_provider};
pub use record::{BackendAddr, ServiceRecord, normalize_host, service_name};
pub use static_registry::StaticRegistry;
