use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::diff::Patchable;
use crate::overlay_fields;
use crate::permissions::{Overwrite, Permissions};
use crate::types::{ChannelId, RoleId, ServerId, UserId};

use super::File;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub channels: Vec<ChannelId>,
}

/// Where the server posts automatic join/leave/kick/ban notices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemMessageChannels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_joined: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_left: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_kicked: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_banned: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(rename = "permissions")]
    pub overwrite: Overwrite,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    #[serde(default)]
    pub hoist: bool,
    /// Lower rank applies later and therefore wins conflicts.
    #[serde(default)]
    pub rank: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    #[serde(rename = "permissions")]
    pub overwrite: Option<Overwrite>,
    pub colour: Option<String>,
    pub hoist: Option<bool>,
    pub rank: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleField {
    Colour,
}

impl Role {
    /// Build a role from a patch, for `ServerRoleUpdate` on a role not yet known.
    pub fn from_patch(patch: RolePatch) -> Self {
        let mut role = Self {
            name: String::new(),
            overwrite: Overwrite::default(),
            colour: None,
            hoist: false,
            rank: 0,
        };
        role.overlay(patch);
        role
    }
}

impl Patchable for Role {
    type Patch = RolePatch;
    type Field = RoleField;

    fn overlay(&mut self, patch: RolePatch) {
        overlay_fields!(self, patch; name, overwrite, colour, hoist, rank);
    }

    fn clear(&mut self, field: RoleField) {
        match field {
            RoleField::Colour => self.colour = None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    #[serde(rename = "_id")]
    pub id: ServerId,
    pub owner: UserId,
    pub name: String,
    #[serde(default)]
    pub channels: Vec<ChannelId>,
    #[serde(default)]
    pub default_permissions: Permissions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<File>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<File>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_messages: Option<SystemMessageChannels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<HashMap<RoleId, Role>>,
    #[serde(default)]
    pub nsfw: bool,
}

impl Server {
    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.as_ref()?.get(id)
    }

    /// Resolve role ids to roles in application order: highest rank number
    /// first, so the lowest rank is applied last and wins conflicts. Unknown
    /// ids are skipped; equal ranks fall back to id order.
    pub fn ranked_roles<'a>(
        &'a self,
        ids: impl IntoIterator<Item = &'a RoleId>,
    ) -> Vec<(&'a RoleId, &'a Role)> {
        let mut roles: Vec<(&RoleId, &Role)> = ids
            .into_iter()
            .filter_map(|id| self.role(id).map(|role| (id, role)))
            .collect();
        roles.sort_by(|(a_id, a), (b_id, b)| b.rank.cmp(&a.rank).then_with(|| a_id.cmp(b_id)));
        roles
    }

    /// Drop a channel from the channel list and from every category.
    pub fn remove_channel(&mut self, channel: &ChannelId) {
        self.channels.retain(|c| c != channel);
        if let Some(categories) = self.categories.as_mut() {
            for category in categories {
                category.channels.retain(|c| c != channel);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerPatch {
    pub owner: Option<UserId>,
    pub name: Option<String>,
    pub channels: Option<Vec<ChannelId>>,
    pub default_permissions: Option<Permissions>,
    pub description: Option<String>,
    pub icon: Option<File>,
    pub banner: Option<File>,
    pub categories: Option<Vec<Category>>,
    pub system_messages: Option<SystemMessageChannels>,
    pub nsfw: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerField {
    Description,
    Categories,
    SystemMessages,
    Icon,
    Banner,
}

impl Patchable for Server {
    type Patch = ServerPatch;
    type Field = ServerField;

    fn overlay(&mut self, patch: ServerPatch) {
        overlay_fields!(self, patch;
            owner, name, channels, default_permissions, description, icon, banner,
            categories, system_messages, nsfw);
    }

    fn clear(&mut self, field: ServerField) {
        match field {
            ServerField::Description => self.description = None,
            ServerField::Categories => self.categories = None,
            ServerField::SystemMessages => self.system_messages = None,
            ServerField::Icon => self.icon = None,
            ServerField::Banner => self.banner = None,
        }
    }
}
