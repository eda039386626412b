//! # hearth-client
//!
//! Client-side sync engine: keeps the entity store in step with the
//! gateway event stream, sends messages optimistically and manages the
//! session lifecycle around reconnects and sign-out.

pub mod backoff;
pub mod config;
pub mod error;
pub mod events;
pub mod queue;
pub mod reducer;
pub mod session;
pub mod state;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::ClientEvent;
pub use queue::{Draft, OutboundQueue};
pub use reducer::{apply_event, Change};
pub use session::{Collaborators, Session};
pub use state::ConnectionState;

/// Install the global `fmt` subscriber, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("hearth_client=debug,hearth_net=debug,hearth_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
