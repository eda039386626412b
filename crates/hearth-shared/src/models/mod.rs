//! Domain entities as the server serializes them.
//!
//! Entities reference each other by id only; resolving a reference is the
//! reader's job and an unknown id simply means "not fetched yet".

mod channel;
mod emoji;
mod member;
mod message;
mod server;
mod unread;
mod user;
mod webhook;

use serde::{Deserialize, Serialize};

pub use channel::*;
pub use emoji::*;
pub use member::*;
pub use message::*;
pub use server::*;
pub use unread::*;
pub use user::*;
pub use webhook::*;

/// Reference to an uploaded file held by the file-storage service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(rename = "_id")]
    pub id: String,
    pub tag: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Capability document served at the API root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub version: String,
    /// Real-time gateway URL.
    pub ws: String,
    #[serde(default)]
    pub app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vapid: Option<String>,
    #[serde(default)]
    pub features: serde_json::Map<String, serde_json::Value>,
}
