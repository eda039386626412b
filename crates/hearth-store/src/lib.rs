//! # hearth-store
//!
//! The entity store: a normalized, synchronous, in-memory snapshot of every
//! entity the session can see, plus its SQLite-backed durable copy.
//!
//! [`EntityStore`] holds the data, [`StoreHandle`] shares it between tasks,
//! [`Database`] persists it and [`Persister`] keeps the two in sync in the
//! background.

pub mod credentials;
pub mod database;
pub mod migrations;
pub mod persist;
pub mod snapshot;
pub mod store;

mod error;

pub use credentials::{MemoryTokenStore, TokenStore};
pub use database::{Database, DatabaseHandle};
pub use error::{Result, StoreError};
pub use persist::Persister;
pub use snapshot::Snapshot;
pub use store::{EntityStore, StoreHandle, TimelineEntry};
