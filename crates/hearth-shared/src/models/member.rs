use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::Patchable;
use crate::overlay_fields;
use crate::types::{MemberId, RoleId};

use super::File;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: MemberId,
    pub joined_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<File>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DateTime<Utc>>,
}

impl Member {
    /// Whether a timeout is recorded. The server clears the field when the
    /// timeout lapses, so presence alone decides.
    pub fn is_timed_out(&self) -> bool {
        self.timeout.is_some()
    }

    pub fn role_ids(&self) -> &[RoleId] {
        self.roles.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberPatch {
    pub nickname: Option<String>,
    pub avatar: Option<File>,
    pub roles: Option<Vec<RoleId>>,
    pub timeout: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberField {
    Nickname,
    Avatar,
    Roles,
    Timeout,
}

impl Patchable for Member {
    type Patch = MemberPatch;
    type Field = MemberField;

    fn overlay(&mut self, patch: MemberPatch) {
        overlay_fields!(self, patch; nickname, avatar, roles, timeout);
    }

    fn clear(&mut self, field: MemberField) {
        match field {
            MemberField::Nickname => self.nickname = None,
            MemberField::Avatar => self.avatar = None,
            MemberField::Roles => self.roles = None,
            MemberField::Timeout => self.timeout = None,
        }
    }
}
