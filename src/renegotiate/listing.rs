//! JSON directory listing exchanged with the file backend.
//!
//! ```json
//! { "type": "directory_listing", "path": "/a",
//!   "items": [ { "name": "x.jpg", "type": "file", "path": "/a/x.jpg", "size": 2048 } ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    DirectoryListing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    #[serde(rename = "type")]
    pub kind: ListingKind,
    pub path: String,
    pub items: Vec<ListingItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl DirectoryListing {
    /// Parses a listing body. Invalid JSON and valid JSON of the wrong shape
    /// are both reported as [`ProxyError::PayloadShapeMismatch`].
    pub fn from_json(body: &[u8]) -> Result<Self, ProxyError> {
        serde_json::from_slice(body).map_err(|e| ProxyError::PayloadShapeMismatch(e.to_string()))
    }
}

impl ListingItem {
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}
