//! Types shared by every hearth crate: identifiers, domain entities, the
//! real-time wire protocol and permission resolution.

pub mod constants;
pub mod diff;
pub mod error;
pub mod models;
pub mod permissions;
pub mod protocol;
pub mod types;

pub use error::{HearthError, ProtocolError, Result};
