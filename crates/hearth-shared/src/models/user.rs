use serde::{Deserialize, Serialize};

use crate::diff::Patchable;
use crate::overlay_fields;
use crate::types::UserId;

use super::File;

/// Online presence chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Online,
    Idle,
    Focus,
    Busy,
    Invisible,
}

/// Relationship of a user as seen from the signed-in account. `User` marks
/// the signed-in account itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelationshipStatus {
    #[default]
    None,
    User,
    Friend,
    Outgoing,
    Incoming,
    Blocked,
    BlockedOther,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<File>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInformation {
    pub owner: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub discriminator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<File>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationshipStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<BotInformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub online: bool,
}

impl User {
    pub fn is_self(&self) -> bool {
        self.relationship == Some(RelationshipStatus::User)
    }

    pub fn is_bot(&self) -> bool {
        self.bot.is_some()
    }

    pub fn relationship(&self) -> RelationshipStatus {
        self.relationship.unwrap_or_default()
    }

    /// Name to render: display name if set, otherwise the username.
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub discriminator: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<File>,
    pub status: Option<UserStatus>,
    pub relationship: Option<RelationshipStatus>,
    pub profile: Option<UserProfile>,
    pub privileged: Option<bool>,
    pub online: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserField {
    Avatar,
    StatusText,
    StatusPresence,
    ProfileContent,
    ProfileBackground,
    DisplayName,
}

impl Patchable for User {
    type Patch = UserPatch;
    type Field = UserField;

    fn overlay(&mut self, patch: UserPatch) {
        overlay_fields!(self, patch;
            username, discriminator, display_name, avatar, relationship, privileged, online);

        // Status and profile arrive as partial sub-objects.
        if let Some(status) = patch.status {
            let current = self.status.get_or_insert_with(UserStatus::default);
            if status.text.is_some() {
                current.text = status.text;
            }
            if status.presence.is_some() {
                current.presence = status.presence;
            }
        }
        if let Some(profile) = patch.profile {
            let current = self.profile.get_or_insert_with(UserProfile::default);
            if profile.content.is_some() {
                current.content = profile.content;
            }
            if profile.background.is_some() {
                current.background = profile.background;
            }
        }
    }

    fn clear(&mut self, field: UserField) {
        match field {
            UserField::Avatar => self.avatar = None,
            UserField::DisplayName => self.display_name = None,
            UserField::StatusText => {
                if let Some(status) = self.status.as_mut() {
                    status.text = None;
                }
            }
            UserField::StatusPresence => {
                if let Some(status) = self.status.as_mut() {
                    status.presence = None;
                }
            }
            UserField::ProfileContent => {
                if let Some(profile) = self.profile.as_mut() {
                    profile.content = None;
                }
            }
            UserField::ProfileBackground => {
                if let Some(profile) = self.profile.as_mut() {
                    profile.background = None;
                }
            }
        }
    }
}
