//! HTTP/1.1 wire handling.
//!
//! # Architecture
//!
//! - **`connection`**: Per-client state machine driving one proxied exchange
//! - **`parser`**: Incremental request and response parsing from byte buffers
//! - **`headers`**: Ordered, case-insensitive header map
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serialization of requests and responses
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for a complete request (bounded)
//!        └──────┬──────┘
//!               │ Request parsed          timeout / bad request ──┐
//!               ▼                                                 │
//!        ┌─────────────┐                                          │
//!        │  Resolving  │ ← Host → backend via discovery           │
//!        └──────┬──────┘                                          │
//!               │ Backend found           no backend (503) ───────┤
//!               ▼                                                 │
//!        ┌─────────────┐                                          │
//!        │ Forwarding  │ ← Renegotiate, forward, read response    │
//!        └──────┬──────┘                                          │
//!               │ Response ready (502 on backend failure)         │
//!               ▼                                                 │
//!        ┌─────────────┐                                          │
//!        │ Responding  │ ◄────────────────────────────────────────┘
//!        └──────┬──────┘
//!               ▼
//!            Closed
//! ```
//!
//! A client that disconnects before sending a complete request goes straight
//! from `Reading` to `Closed`.

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
