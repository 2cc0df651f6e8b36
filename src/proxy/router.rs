//! Virtual host routing.
//!
//! Resolves the backend for a request by its `Host` header, forwards it with
//! content renegotiation applied in both directions, and turns every failure
//! into a response for the client.

use crate::config::Config;
use crate::discovery::{DiscoveryCache, ServiceRecord, build_provider};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::proxy::upstream::Connector;
use crate::renegotiate::Renegotiator;

pub struct VirtualHostRouter {
    cache: DiscoveryCache,
    connector: Connector,
    negotiator: Renegotiator,
}

impl VirtualHostRouter {
    pub fn new(cache: DiscoveryCache, connector: Connector, negotiator: Renegotiator) -> Self {
        Self {
            cache,
            connector,
            negotiator,
        }
    }

    /// Builds the router and its discovery provider from configuration.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let provider = build_provider(&cfg.discovery)?;
        let cache = DiscoveryCache::new(provider, cfg.discovery.ttl(), cfg.discovery.timeout());

        Ok(Self::new(
            cache,
            Connector::from_config(&cfg.backend),
            Renegotiator::from_config(&cfg.renegotiation),
        ))
    }

    /// Finds the backend for a request, or the response explaining why
    /// there is none.
    pub async fn resolve(&self, request: &Request) -> Result<ServiceRecord, Response> {
        let Some(host) = request.host() else {
            tracing::debug!(path = %request.path, "Request without Host header");
            return Err(Response::bad_request("A Host header is required."));
        };

        self.cache.resolve(host).await.map_err(|e| {
            tracing::info!(host = %host, path = %request.path, error = %e, "Host not routable");
            e.into_response()
        })
    }

    /// Forwards a request to its resolved backend.
    pub async fn forward(&self, request: &Request, record: &ServiceRecord) -> Response {
        let outbound = self.negotiator.outbound(request, record);

        match self.connector.try_forward(&outbound, record).await {
            Ok(response) => self.negotiator.inbound(request, response, record),
            Err(e) => self.negotiator.failure(request, record, e),
        }
    }

    /// Resolves and forwards in one step.
    pub async fn handle(&self, request: Request) -> Response {
        match self.resolve(&request).await {
            Ok(record) => self.forward(&request, &record).await,
            Err(response) => response,
        }
    }
}
