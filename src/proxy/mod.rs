//! Reverse proxy functionality
//!
//! This module implements forwarding to discovered backends and the virtual
//! host routing that ties discovery, forwarding and renegotiation together.

pub mod router;
pub mod upstream;

pub use router::VirtualHostRouter;
pub use upstream::Connector;
