//! Content renegotiation between browsers and file backends.
//!
//! Two decisions are made around each forwarded request:
//!
//! - **Outbound**: a browser talking to a backend that advertises the `json`
//!   capability gets its `Accept` header replaced so the backend answers with
//!   a JSON directory listing.
//! - **Inbound**: a JSON response going back to a browser is rendered as an
//!   HTML document, or as a small error document if it is not a valid
//!   listing.
//!
//! Clients that are not browsers never see either rewrite.

pub mod listing;
pub mod negotiate;
pub mod render;

pub use listing::{DirectoryListing, ItemKind, ListingItem};
pub use negotiate::{Renegotiator, is_browser, rewrite_request, rewrite_response, supports_json};
pub use render::{escape_html, format_size, render_error, render_listing};
