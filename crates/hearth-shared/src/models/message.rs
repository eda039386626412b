use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::Patchable;
use crate::overlay_fields;
use crate::types::{ChannelId, EmojiId, MessageId, UserId};

use super::{File, Member, User};

/// Automatic message body posted by the server instead of user text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemMessage {
    Text { content: String },
    UserAdded { id: UserId, by: UserId },
    UserRemove { id: UserId, by: UserId },
    UserJoined { id: UserId },
    UserLeft { id: UserId },
    UserKicked { id: UserId },
    UserBanned { id: UserId },
    ChannelRenamed { name: String, by: UserId },
    ChannelDescriptionChanged { by: UserId },
    ChannelIconChanged { by: UserId },
    ChannelOwnershipChanged { from: UserId, to: UserId },
    MessagePinned { id: MessageId, by: UserId },
    MessageUnpinned { id: MessageId, by: UserId },
    CallStarted { by: UserId },
}

/// Per-message override of the author's presentation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Masquerade {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
}

/// Link preview or rich content attached to a message. Its shape varies by
/// provider and is only interpreted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embed(pub serde_json::Value);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub channel: ChannelId,
    pub author: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<File>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<MessageId>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<EmojiId, Vec<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<Masquerade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// Author snapshot delivered alongside live messages; moved into the
    /// user collection on receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<User>>,
    /// Author's membership snapshot, same treatment as `user`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Box<Member>>,
}

impl Message {
    pub fn mentions(&self, user: &UserId) -> bool {
        self.mentions
            .as_ref()
            .is_some_and(|m| m.iter().any(|id| id == user))
    }

    /// Record `user` under `emoji`; no-op if already present.
    pub fn add_reaction(&mut self, emoji: EmojiId, user: UserId) {
        let users = self.reactions.entry(emoji).or_default();
        if !users.contains(&user) {
            users.push(user);
        }
    }

    /// Remove `user` from `emoji`, dropping the key once nobody is left.
    pub fn remove_reaction(&mut self, emoji: &EmojiId, user: &UserId) {
        if let Some(users) = self.reactions.get_mut(emoji) {
            users.retain(|u| u != user);
            if users.is_empty() {
                self.reactions.remove(emoji);
            }
        }
    }

    pub fn clear_reaction(&mut self, emoji: &EmojiId) {
        self.reactions.remove(emoji);
    }
}

/// Reply reference attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: MessageId,
    /// Whether the replied-to author gets a mention.
    #[serde(default)]
    pub mention: bool,
}

/// Locally composed message waiting for server confirmation. Its id is the
/// nonce the server echoes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub nonce: MessageId,
    pub channel: ChannelId,
    pub author: UserId,
    pub content: String,
    pub replies: Vec<Reply>,
    pub attachments: Vec<String>,
}

impl QueuedMessage {
    /// Whether `message` is the server's confirmation of this placeholder.
    pub fn is_confirmed_by(&self, message: &Message) -> bool {
        message.channel == self.channel
            && (message.nonce.as_deref() == Some(self.nonce.as_str()) || message.id == self.nonce)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub edited: Option<DateTime<Utc>>,
    pub embeds: Option<Vec<Embed>>,
    pub pinned: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageField {
    Pinned,
    Embeds,
}

impl Patchable for Message {
    type Patch = MessagePatch;
    type Field = MessageField;

    fn overlay(&mut self, patch: MessagePatch) {
        overlay_fields!(self, patch; content, edited, embeds, pinned);
    }

    fn clear(&mut self, field: MessageField) {
        match field {
            MessageField::Pinned => self.pinned = None,
            MessageField::Embeds => self.embeds = None,
        }
    }
}
