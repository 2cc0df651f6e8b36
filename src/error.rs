//! Per-request failure taxonomy.
//!
//! Every variant is handled inside the request that raised it and turns into
//! a well-formed response. None of them ever reach the accept loop.

use crate::http::response::Response;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No backend is known for the requested hostname.
    #[error("no service discovered for host {0}")]
    DiscoveryMiss(String),

    /// Connecting to, writing to or reading from the backend failed or timed out.
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    /// The backend answered with bytes that are not a usable HTTP response.
    #[error("malformed backend response: {0}")]
    MalformedBackendResponse(String),

    /// A machine-readable body did not match the directory listing schema.
    #[error("payload does not match the directory listing shape: {0}")]
    PayloadShapeMismatch(String),
}

impl ProxyError {
    /// Maps the error onto the response surfaced to the client.
    ///
    /// The router renders `PayloadShapeMismatch` as an error document with
    /// the backend's status instead of calling this.
    pub fn into_response(self) -> Response {
        match self {
            ProxyError::DiscoveryMiss(host) => Response::service_unavailable(&format!(
                "No service is currently available for {}.",
                host
            )),
            ProxyError::BackendUnreachable(_) => {
                Response::bad_gateway("The backend server could not be reached.")
            }
            ProxyError::MalformedBackendResponse(_) => {
                Response::bad_gateway("The backend server sent an invalid response.")
            }
            ProxyError::PayloadShapeMismatch(_) => {
                Response::bad_gateway("The backend server sent an unexpected payload.")
            }
        }
    }
}
