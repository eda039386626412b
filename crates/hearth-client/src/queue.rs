//! Outbound message queue.
//!
//! A send shows up in the channel timeline as a [`QueuedMessage`] keyed by
//! a locally generated nonce until the server confirms it, either through
//! the REST response or through the gateway echo, whichever arrives first.
//! Failed sends are dropped and reported; nothing is retried.

use std::sync::Arc;

use tracing::{debug, info, warn};

use hearth_net::{ApiClient, Attachment, FileStorage, NetError, SendMessage, ATTACHMENTS_TAG};
use hearth_shared::models::{Message, QueuedMessage, Reply};
use hearth_shared::protocol::ServerEvent;
use hearth_shared::types::{ChannelId, IdGenerator};
use hearth_store::StoreHandle;

use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, Notifier};
use crate::reducer::{self, Change};

/// A message as composed by the user.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub content: String,
    pub replies: Vec<Reply>,
    pub attachments: Vec<Attachment>,
}

impl Draft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct OutboundQueue {
    store: StoreHandle,
    api: Arc<dyn ApiClient>,
    files: Option<Arc<dyn FileStorage>>,
    ids: Arc<IdGenerator>,
    notifier: Notifier,
}

impl OutboundQueue {
    pub(crate) fn new(
        store: StoreHandle,
        api: Arc<dyn ApiClient>,
        files: Option<Arc<dyn FileStorage>>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            api,
            files,
            ids: Arc::new(IdGenerator::new()),
            notifier,
        }
    }

    /// Upload attachments, show a placeholder and submit the message.
    /// Returns the confirmed message.
    pub async fn send(&self, channel: &ChannelId, draft: Draft) -> Result<Message> {
        let author = self
            .store
            .read(|s| s.current_user_id().cloned())?
            .ok_or(ClientError::NotAuthenticated)?;

        // ---- 1. Attachments ----
        let mut attachments = Vec::with_capacity(draft.attachments.len());
        if !draft.attachments.is_empty() {
            let files = self.files.as_ref().ok_or(NetError::NoFileStorage)?;
            for attachment in &draft.attachments {
                let id = files.upload(ATTACHMENTS_TAG, attachment).await?;
                debug!(file = %attachment.filename, id = %id, "attachment uploaded");
                attachments.push(id);
            }
        }

        // ---- 2. Placeholder ----
        let nonce = self.ids.next_message_id();
        let queued = QueuedMessage {
            nonce: nonce.clone(),
            channel: channel.clone(),
            author: author.clone(),
            content: draft.content.clone(),
            replies: draft.replies.clone(),
            attachments: attachments.clone(),
        };
        self.store.write(|s| s.push_queued(queued))?;
        self.notifier.changed(&Change::Channel(channel.clone()));
        info!(channel = %channel, nonce = %nonce, "message queued");

        // ---- 3. Submit ----
        let payload = SendMessage {
            content: draft.content,
            nonce: nonce.to_string(),
            attachments,
            replies: draft.replies,
        };

        match self.api.send_message(channel, &payload).await {
            Ok(message) => {
                let change = self.store.write(|s| {
                    s.remove_queued(channel, &nonce);
                    if s.current_user_id() != Some(&author) {
                        return None;
                    }
                    Some(reducer::apply_event(s, ServerEvent::Message(message.clone())))
                })?;
                let Some(change) = change else {
                    return Err(ClientError::SignedOut);
                };
                self.notifier
                    .changed(&change.merge(Change::Channel(channel.clone())));
                debug!(channel = %channel, id = %message.id, "message confirmed");
                Ok(message)
            }
            Err(e) => {
                warn!(channel = %channel, nonce = %nonce, error = %e, "message send failed");
                self.store.write(|s| s.remove_queued(channel, &nonce))?;
                self.notifier.changed(&Change::Channel(channel.clone()));
                self.notifier.emit(ClientEvent::MessageFailed {
                    channel: channel.clone(),
                    nonce,
                    error: e.to_string(),
                });
                Err(ClientError::SendFailed(e.to_string()))
            }
        }
    }
}
