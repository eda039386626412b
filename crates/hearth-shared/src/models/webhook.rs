use serde::{Deserialize, Serialize};

use crate::diff::Patchable;
use crate::overlay_fields;
use crate::permissions::Permissions;
use crate::types::{ChannelId, WebhookId};

use super::File;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<File>,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPatch {
    pub name: Option<String>,
    pub avatar: Option<File>,
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookField {
    Avatar,
}

impl Patchable for Webhook {
    type Patch = WebhookPatch;
    type Field = WebhookField;

    fn overlay(&mut self, patch: WebhookPatch) {
        overlay_fields!(self, patch; name, avatar, permissions);
    }

    fn clear(&mut self, field: WebhookField) {
        match field {
            WebhookField::Avatar => self.avatar = None,
        }
    }
}
