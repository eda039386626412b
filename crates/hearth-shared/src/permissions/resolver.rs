//! Effective permission computation.
//!
//! Everything here is a pure function of the entities passed in. Callers look
//! the entities up; server-scoped channels cannot be resolved without their
//! server and the target's membership, which the signatures enforce.

use crate::models::{
    Channel, DirectMessage, GroupChannel, Member, RelationshipStatus, SavedMessages, Server,
    ServerChannel, User,
};

use super::bits::{Permissions, UserPermissions};

/// What one user may do towards another.
///
/// Relationship data on `target` is as seen by the signed-in account, which
/// is always `from` or the party `from` acts for.
pub fn resolve_user_permissions(from: &User, target: &User) -> UserPermissions {
    if from.privileged || from.id == target.id {
        return UserPermissions::all();
    }

    let mut permissions = match target.relationship() {
        RelationshipStatus::Blocked | RelationshipStatus::BlockedOther => UserPermissions::ACCESS,
        RelationshipStatus::Friend | RelationshipStatus::User => UserPermissions::all(),
        RelationshipStatus::Incoming | RelationshipStatus::Outgoing => {
            UserPermissions::ACCESS | UserPermissions::VIEW_PROFILE
        }
        RelationshipStatus::None => UserPermissions::empty(),
    };

    if from.is_bot() || target.is_bot() {
        permissions |= UserPermissions::SEND_MESSAGE;
    }

    permissions
}

/// Server-wide permissions of a member, before any channel overwrite.
pub fn resolve_server_permissions(user: &User, member: &Member, server: &Server) -> Permissions {
    if user.privileged || user.id == server.owner {
        return Permissions::all();
    }

    let mut permissions = server.default_permissions;
    for (_, role) in server.ranked_roles(member.role_ids()) {
        permissions = permissions.apply(role.overwrite);
    }

    if member.is_timed_out() {
        permissions &= Permissions::ALLOW_IN_TIMEOUT;
    }

    permissions
}

/// Everything needed to resolve one channel, split by scope.
#[derive(Debug, Clone, Copy)]
pub enum ChannelContext<'a> {
    SavedMessages(&'a SavedMessages),
    /// `other` is the second recipient, if known.
    DirectMessage {
        channel: &'a DirectMessage,
        other: Option<&'a User>,
    },
    Group(&'a GroupChannel),
    Server {
        channel: &'a ServerChannel,
        server: &'a Server,
        member: &'a Member,
    },
}

impl<'a> ChannelContext<'a> {
    /// Build the context for a DM-like channel. Server channels need
    /// [`ChannelContext::Server`] directly and yield `None` here.
    pub fn private(channel: &'a Channel, other: Option<&'a User>) -> Option<Self> {
        match channel {
            Channel::SavedMessages(c) => Some(Self::SavedMessages(c)),
            Channel::DirectMessage(c) => Some(Self::DirectMessage { channel: c, other }),
            Channel::Group(c) => Some(Self::Group(c)),
            Channel::TextChannel(_) | Channel::VoiceChannel(_) => None,
        }
    }
}

/// Effective permissions of `target` in a channel.
pub fn resolve_channel_permissions(target: &User, context: ChannelContext<'_>) -> Permissions {
    if target.privileged {
        return Permissions::all();
    }

    match context {
        ChannelContext::SavedMessages(channel) => resolve_saved_messages(target, channel),
        ChannelContext::DirectMessage { channel, other } => {
            resolve_direct_message(target, channel, other)
        }
        ChannelContext::Group(channel) => resolve_group(target, channel),
        ChannelContext::Server {
            channel,
            server,
            member,
        } => resolve_server_channel(target, member, channel, server),
    }
}

pub fn resolve_saved_messages(target: &User, channel: &SavedMessages) -> Permissions {
    if channel.user == target.id {
        Permissions::all()
    } else {
        Permissions::empty()
    }
}

pub fn resolve_direct_message(
    target: &User,
    channel: &DirectMessage,
    other: Option<&User>,
) -> Permissions {
    if !channel.recipients.contains(&target.id) {
        return Permissions::empty();
    }

    let can_message = other.is_some_and(|other| {
        resolve_user_permissions(target, other).contains(UserPermissions::SEND_MESSAGE)
    });

    if can_message {
        Permissions::DEFAULT_DIRECT_MESSAGE
    } else {
        Permissions::VIEW_ONLY
    }
}

pub fn resolve_group(target: &User, channel: &GroupChannel) -> Permissions {
    if channel.owner == target.id {
        Permissions::all()
    } else if channel.recipients.contains(&target.id) {
        Permissions::VIEW_ONLY | channel.permissions.unwrap_or_default()
    } else {
        Permissions::empty()
    }
}

/// Text and voice channels: server permissions, then the channel default
/// overwrite, then role overwrites in rank order (lowest rank last). A
/// result without `VIEW_CHANNEL` is empty.
pub fn resolve_server_channel(
    target: &User,
    member: &Member,
    channel: &ServerChannel,
    server: &Server,
) -> Permissions {
    if target.privileged || server.owner == target.id {
        return Permissions::all();
    }

    let mut permissions = resolve_server_permissions(target, member, server);

    if let Some(default) = channel.default_permissions {
        permissions = permissions.apply(default);
    }

    for (role_id, _) in server.ranked_roles(member.role_ids()) {
        if let Some(overwrite) = channel.role_permissions.get(role_id) {
            permissions = permissions.apply(*overwrite);
        }
    }

    if member.is_timed_out() {
        permissions &= Permissions::ALLOW_IN_TIMEOUT;
    }

    if !permissions.contains(Permissions::VIEW_CHANNEL) {
        return Permissions::empty();
    }

    permissions
}
