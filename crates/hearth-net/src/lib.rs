//! # hearth-net
//!
//! Collaborators the sync engine talks to: the REST API, the real-time
//! gateway and the file-storage service. Each is a trait so the engine can
//! be driven by in-memory fakes; the concrete implementations use `reqwest`
//! and `tokio-tungstenite`.

pub mod api;
pub mod files;
pub mod gateway;

mod error;

pub use api::{ApiClient, HistoryQuery, HttpApi, MessageHistory, SendMessage};
pub use error::{NetError, Result};
pub use files::{Attachment, FileStorage, HttpFileStorage, ATTACHMENTS_TAG};
pub use gateway::{gateway_url, Gateway, GatewayConnection, WsGateway};
