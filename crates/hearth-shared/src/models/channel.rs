use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::diff::Patchable;
use crate::overlay_fields;
use crate::permissions::{Overwrite, Permissions};
use crate::types::{ChannelId, MessageId, RoleId, ServerId, UserId};

use super::File;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMessages {
    #[serde(rename = "_id")]
    pub id: ChannelId,
    pub user: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    #[serde(rename = "_id")]
    pub id: ChannelId,
    #[serde(default)]
    pub active: bool,
    pub recipients: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<MessageId>,
}

impl DirectMessage {
    /// The recipient that is not `me`.
    pub fn other_recipient(&self, me: &UserId) -> Option<&UserId> {
        self.recipients.iter().find(|r| *r != me)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChannel {
    #[serde(rename = "_id")]
    pub id: ChannelId,
    pub name: String,
    pub owner: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub recipients: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<File>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub nsfw: bool,
}

/// Shared body of text and voice channels: always owned by a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerChannel {
    #[serde(rename = "_id")]
    pub id: ChannelId,
    pub server: ServerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<File>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_permissions: Option<Overwrite>,
    #[serde(default)]
    pub role_permissions: HashMap<RoleId, Overwrite>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceInformation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoiceInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel_type")]
pub enum Channel {
    SavedMessages(SavedMessages),
    DirectMessage(DirectMessage),
    Group(GroupChannel),
    TextChannel(ServerChannel),
    VoiceChannel(ServerChannel),
}

impl Channel {
    pub fn id(&self) -> &ChannelId {
        match self {
            Channel::SavedMessages(c) => &c.id,
            Channel::DirectMessage(c) => &c.id,
            Channel::Group(c) => &c.id,
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => &c.id,
        }
    }

    /// Owning server; `None` for every DM-like variant.
    pub fn server(&self) -> Option<&ServerId> {
        self.as_server_channel().map(|c| &c.server)
    }

    pub fn as_server_channel(&self) -> Option<&ServerChannel> {
        match self {
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => Some(c),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Channel::Group(c) => Some(&c.name),
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => Some(&c.name),
            _ => None,
        }
    }

    pub fn icon(&self) -> Option<&File> {
        match self {
            Channel::Group(c) => c.icon.as_ref(),
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => c.icon.as_ref(),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Channel::Group(c) => c.description.as_deref(),
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => c.description.as_deref(),
            _ => None,
        }
    }

    pub fn nsfw(&self) -> bool {
        match self {
            Channel::Group(c) => c.nsfw,
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => c.nsfw,
            _ => false,
        }
    }

    pub fn last_message_id(&self) -> Option<&MessageId> {
        match self {
            Channel::DirectMessage(c) => c.last_message_id.as_ref(),
            Channel::Group(c) => c.last_message_id.as_ref(),
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => c.last_message_id.as_ref(),
            Channel::SavedMessages(_) => None,
        }
    }

    /// Whether the server reports a last message id for this variant.
    /// Saved notes carry none, so their cached tail cannot be checked.
    pub fn tracks_last_message(&self) -> bool {
        !matches!(self, Channel::SavedMessages(_))
    }

    pub fn set_last_message_id(&mut self, id: MessageId) {
        match self {
            Channel::DirectMessage(c) => c.last_message_id = Some(id),
            Channel::Group(c) => c.last_message_id = Some(id),
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => c.last_message_id = Some(id),
            Channel::SavedMessages(_) => {}
        }
    }

    pub fn is_dm_like(&self) -> bool {
        matches!(
            self,
            Channel::SavedMessages(_) | Channel::DirectMessage(_) | Channel::Group(_)
        )
    }

    pub fn recipients(&self) -> &[UserId] {
        match self {
            Channel::DirectMessage(c) => &c.recipients,
            Channel::Group(c) => &c.recipients,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPatch {
    pub name: Option<String>,
    pub owner: Option<UserId>,
    pub description: Option<String>,
    pub icon: Option<File>,
    pub nsfw: Option<bool>,
    pub active: Option<bool>,
    pub permissions: Option<Permissions>,
    pub role_permissions: Option<HashMap<RoleId, Overwrite>>,
    pub default_permissions: Option<Overwrite>,
    pub last_message_id: Option<MessageId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelField {
    Icon,
    Description,
    DefaultPermissions,
}

// Fields that do not exist on the variant are ignored. Identity fields
// (`_id`, `server`, `user`, `recipients`) are not patchable at all.
impl Patchable for Channel {
    type Patch = ChannelPatch;
    type Field = ChannelField;

    fn overlay(&mut self, patch: ChannelPatch) {
        match self {
            Channel::SavedMessages(_) => {}
            Channel::DirectMessage(c) => {
                overlay_fields!(c, patch; active, last_message_id);
            }
            Channel::Group(c) => {
                overlay_fields!(c, patch;
                    name, owner, description, icon, nsfw, permissions, last_message_id);
            }
            Channel::TextChannel(c) | Channel::VoiceChannel(c) => {
                overlay_fields!(c, patch;
                    name, description, icon, nsfw, role_permissions, default_permissions,
                    last_message_id);
            }
        }
    }

    fn clear(&mut self, field: ChannelField) {
        match (self, field) {
            (Channel::Group(c), ChannelField::Icon) => c.icon = None,
            (Channel::Group(c), ChannelField::Description) => c.description = None,
            (Channel::TextChannel(c) | Channel::VoiceChannel(c), ChannelField::Icon) => {
                c.icon = None
            }
            (Channel::TextChannel(c) | Channel::VoiceChannel(c), ChannelField::Description) => {
                c.description = None
            }
            (
                Channel::TextChannel(c) | Channel::VoiceChannel(c),
                ChannelField::DefaultPermissions,
            ) => c.default_permissions = None,
            _ => {}
        }
    }
}
