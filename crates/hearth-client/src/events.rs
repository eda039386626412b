use tokio::sync::broadcast;
use tracing::{trace, warn};

use hearth_shared::types::{ChannelId, MessageId};
use hearth_store::Persister;

use crate::reducer::Change;
use crate::state::ConnectionState;

/// Notifications for whatever presents the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    StateChanged(ConnectionState),
    /// The store changed; `channel` is set when one channel was affected.
    StoreUpdated { channel: Option<ChannelId> },
    MessageFailed {
        channel: ChannelId,
        nonce: MessageId,
        error: String,
    },
    SignedOut,
}

/// Fans store changes out to the persister and to event subscribers.
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    events: broadcast::Sender<ClientEvent>,
    persister: Option<Persister>,
}

impl Notifier {
    pub(crate) fn new(events: broadcast::Sender<ClientEvent>, persister: Option<Persister>) -> Self {
        Self { events, persister }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Send without caring whether anyone listens.
    pub(crate) fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            trace!("no client event subscribers");
        }
    }

    pub(crate) fn changed(&self, change: &Change) {
        if change.is_none() {
            return;
        }
        if change.is_persisted() {
            if let Some(persister) = &self.persister {
                persister.mark_dirty();
            }
        }
        self.emit(ClientEvent::StoreUpdated {
            channel: change.channel().cloned(),
        });
    }

    /// Write the store out now. Failures are logged, not returned.
    pub(crate) async fn flush(&self) {
        if let Some(persister) = &self.persister {
            if let Err(e) = persister.flush().await {
                warn!(error = %e, "failed to flush store");
            }
        }
    }
}
