//! vhost-proxy - virtual host reverse proxy
//!
//! Routes each request to a backend discovered from its `Host` header and
//! renders JSON directory listings as HTML for browsers.

pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod proxy;
pub mod renegotiate;
pub mod server;
