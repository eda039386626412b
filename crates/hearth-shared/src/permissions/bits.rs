//! Permission bitsets and the overwrite pair applied over them.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Server and channel permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u64 {
        // Management
        const MANAGE_CHANNEL = 1 << 0;
        const MANAGE_SERVER = 1 << 1;
        const MANAGE_PERMISSIONS = 1 << 2;
        const MANAGE_ROLE = 1 << 3;
        const MANAGE_CUSTOMISATION = 1 << 4;

        // Moderation
        const KICK_MEMBERS = 1 << 6;
        const BAN_MEMBERS = 1 << 7;
        const TIMEOUT_MEMBERS = 1 << 8;
        const ASSIGN_ROLES = 1 << 9;
        const CHANGE_NICKNAME = 1 << 10;
        const MANAGE_NICKNAMES = 1 << 11;
        const CHANGE_AVATAR = 1 << 12;
        const REMOVE_AVATARS = 1 << 13;

        // Channel
        const VIEW_CHANNEL = 1 << 20;
        const READ_MESSAGE_HISTORY = 1 << 21;
        const SEND_MESSAGE = 1 << 22;
        const MANAGE_MESSAGES = 1 << 23;
        const MANAGE_WEBHOOKS = 1 << 24;
        const INVITE_OTHERS = 1 << 25;
        const SEND_EMBEDS = 1 << 26;
        const UPLOAD_FILES = 1 << 27;
        const MASQUERADE = 1 << 28;
        const REACT = 1 << 29;

        // Voice
        const CONNECT = 1 << 30;
        const SPEAK = 1 << 31;
        const VIDEO = 1 << 32;
        const MUTE_MEMBERS = 1 << 33;
        const DEAFEN_MEMBERS = 1 << 34;
        const MOVE_MEMBERS = 1 << 35;

        // Mentions
        const MENTION_EVERYONE = 1 << 37;
        const MENTION_ROLES = 1 << 38;
    }
}

bitflags! {
    /// What one user may do towards another user, outside any server.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UserPermissions: u8 {
        const ACCESS = 1 << 0;
        const VIEW_PROFILE = 1 << 1;
        const SEND_MESSAGE = 1 << 2;
        const INVITE = 1 << 3;
    }
}

// The wire carries raw integers; unknown bits are kept so newer servers
// round-trip cleanly.
macro_rules! numeric_serde {
    ($name:ident, $repr:ty) => {
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.bits().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                <$repr>::deserialize(deserializer).map(Self::from_bits_retain)
            }
        }
    };
}

numeric_serde!(Permissions, u64);
numeric_serde!(UserPermissions, u8);

impl Permissions {
    /// The only bits a timed-out member keeps.
    pub const ALLOW_IN_TIMEOUT: Self = Self::VIEW_CHANNEL.union(Self::READ_MESSAGE_HISTORY);

    pub const VIEW_ONLY: Self = Self::VIEW_CHANNEL.union(Self::READ_MESSAGE_HISTORY);

    pub const DEFAULT: Self = Self::VIEW_ONLY
        .union(Self::SEND_MESSAGE)
        .union(Self::INVITE_OTHERS)
        .union(Self::SEND_EMBEDS)
        .union(Self::UPLOAD_FILES)
        .union(Self::CONNECT)
        .union(Self::SPEAK);

    pub const DEFAULT_DIRECT_MESSAGE: Self = Self::DEFAULT
        .union(Self::MANAGE_CHANNEL)
        .union(Self::REACT);

    pub const DEFAULT_SERVER: Self = Self::DEFAULT
        .union(Self::REACT)
        .union(Self::CHANGE_NICKNAME)
        .union(Self::CHANGE_AVATAR);

    /// Apply one overwrite: grant `allow`, then revoke `deny`.
    pub fn apply(self, overwrite: Overwrite) -> Self {
        (self | overwrite.allow) - overwrite.deny
    }

    /// Display name and description for each set bit, in bit order.
    pub fn describe(self) -> impl Iterator<Item = &'static PermissionInfo> {
        PERMISSION_TABLE
            .iter()
            .filter(move |info| self.contains(info.bit))
    }
}

/// An (allow, deny) pair applied on top of an existing permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Overwrite {
    #[serde(rename = "a")]
    pub allow: Permissions,
    #[serde(rename = "d")]
    pub deny: Permissions,
}

impl Overwrite {
    pub fn new(allow: Permissions, deny: Permissions) -> Self {
        Self { allow, deny }
    }
}

pub struct PermissionInfo {
    pub bit: Permissions,
    pub name: &'static str,
    pub description: &'static str,
}

const fn info(bit: Permissions, name: &'static str, description: &'static str) -> PermissionInfo {
    PermissionInfo {
        bit,
        name,
        description,
    }
}

pub static PERMISSION_TABLE: &[PermissionInfo] = &[
    info(Permissions::MANAGE_CHANNEL, "Manage Channel", "Edit or delete the channel."),
    info(Permissions::MANAGE_SERVER, "Manage Server", "Edit the server name, icon and settings."),
    info(Permissions::MANAGE_PERMISSIONS, "Manage Permissions", "Change permission overwrites on channels and roles."),
    info(Permissions::MANAGE_ROLE, "Manage Roles", "Create, edit and delete roles ranked below their own."),
    info(Permissions::MANAGE_CUSTOMISATION, "Manage Customisation", "Add and remove custom emojis."),
    info(Permissions::KICK_MEMBERS, "Kick Members", "Remove members from the server."),
    info(Permissions::BAN_MEMBERS, "Ban Members", "Permanently remove members from the server."),
    info(Permissions::TIMEOUT_MEMBERS, "Timeout Members", "Temporarily restrict members to read-only access."),
    info(Permissions::ASSIGN_ROLES, "Assign Roles", "Give and take roles ranked below their own."),
    info(Permissions::CHANGE_NICKNAME, "Change Nickname", "Set their own nickname."),
    info(Permissions::MANAGE_NICKNAMES, "Manage Nicknames", "Change other members' nicknames."),
    info(Permissions::CHANGE_AVATAR, "Change Avatar", "Set their own server avatar."),
    info(Permissions::REMOVE_AVATARS, "Remove Avatars", "Remove other members' server avatars."),
    info(Permissions::VIEW_CHANNEL, "View Channel", "See the channel and its name."),
    info(Permissions::READ_MESSAGE_HISTORY, "Read Message History", "Read messages sent before they joined."),
    info(Permissions::SEND_MESSAGE, "Send Messages", "Post messages in the channel."),
    info(Permissions::MANAGE_MESSAGES, "Manage Messages", "Delete and pin other members' messages."),
    info(Permissions::MANAGE_WEBHOOKS, "Manage Webhooks", "Create, edit and delete webhooks."),
    info(Permissions::INVITE_OTHERS, "Invite Others", "Create invites to the server or group."),
    info(Permissions::SEND_EMBEDS, "Send Embeds", "Show link previews for their messages."),
    info(Permissions::UPLOAD_FILES, "Upload Files", "Attach files to messages."),
    info(Permissions::MASQUERADE, "Masquerade", "Override name and avatar on individual messages."),
    info(Permissions::REACT, "React", "Add reactions to messages."),
    info(Permissions::CONNECT, "Connect", "Join voice channels."),
    info(Permissions::SPEAK, "Speak", "Talk in voice channels."),
    info(Permissions::VIDEO, "Video", "Share camera or screen in voice channels."),
    info(Permissions::MUTE_MEMBERS, "Mute Members", "Mute other members in voice channels."),
    info(Permissions::DEAFEN_MEMBERS, "Deafen Members", "Deafen other members in voice channels."),
    info(Permissions::MOVE_MEMBERS, "Move Members", "Move members between voice channels."),
    info(Permissions::MENTION_EVERYONE, "Mention Everyone", "Mention every member of the server at once."),
    info(Permissions::MENTION_ROLES, "Mention Roles", "Mention every member holding a role."),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_allow_then_deny() {
        let base = Permissions::VIEW_CHANNEL;
        let ow = Overwrite::new(
            Permissions::SEND_MESSAGE | Permissions::REACT,
            Permissions::REACT,
        );
        assert_eq!(
            base.apply(ow),
            Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGE
        );
    }

    #[test]
    fn test_table_covers_every_bit() {
        let covered = PERMISSION_TABLE
            .iter()
            .fold(Permissions::empty(), |acc, i| acc | i.bit);
        assert_eq!(covered, Permissions::all());
        assert_eq!(Permissions::all().describe().count(), PERMISSION_TABLE.len());
    }

    #[test]
    fn test_overwrite_wire_shape() {
        let ow: Overwrite = serde_json::from_str(r#"{"a":4194304,"d":0}"#).unwrap();
        assert_eq!(ow.allow, Permissions::SEND_MESSAGE);
        assert!(ow.deny.is_empty());
    }

    #[test]
    fn test_unknown_bits_survive_deserialization() {
        let p: Permissions = serde_json::from_str(&format!("{}", 1u64 << 50)).unwrap();
        assert_eq!(p.bits(), 1u64 << 50);
    }
}
