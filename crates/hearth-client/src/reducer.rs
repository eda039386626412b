//! Event reducer: one deterministic store mutation per gateway event.
//!
//! Events are applied strictly in the order they are handed in. Nothing
//! here performs I/O; the `Ready` follow-up fetches are driven by the
//! session, which calls [`seed_ready`] and [`merge_bootstrap`] around them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, trace, warn};

use hearth_shared::diff::apply_diff;
use hearth_shared::models::{Channel, ChannelUnread, Member, Message, Role, RolePatch};
use hearth_shared::protocol::{ReadyPayload, ServerEvent};
use hearth_shared::types::{ChannelId, MemberId, ServerId, UserId};
use hearth_store::EntityStore;

/// What an applied event touched, for change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Nothing in the store changed.
    None,
    /// Something outside a single channel timeline changed.
    Store,
    /// The timeline or state of one channel changed.
    Channel(ChannelId),
    /// Only unpersisted state of one channel changed, such as typing.
    Ephemeral(ChannelId),
}

impl Change {
    pub fn merge(self, other: Change) -> Change {
        match (self, other) {
            (Change::None, other) => other,
            (this, Change::None) => this,
            (Change::Ephemeral(a), Change::Ephemeral(b)) if a == b => Change::Ephemeral(a),
            (
                Change::Channel(a) | Change::Ephemeral(a),
                Change::Channel(b) | Change::Ephemeral(b),
            ) if a == b => Change::Channel(a),
            _ => Change::Store,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Change::None)
    }

    /// Whether the durable copy needs rewriting.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Change::None | Change::Ephemeral(_))
    }

    pub fn channel(&self) -> Option<&ChannelId> {
        match self {
            Change::Channel(id) | Change::Ephemeral(id) => Some(id),
            _ => None,
        }
    }
}

/// Apply one event to the store.
pub fn apply_event(store: &mut EntityStore, event: ServerEvent) -> Change {
    match event {
        // Control frames are handled by the session.
        ServerEvent::Error { .. }
        | ServerEvent::Authenticated
        | ServerEvent::InvalidSession
        | ServerEvent::Logout
        | ServerEvent::Pong { .. } => Change::None,

        ServerEvent::Bulk { v } => {
            let mut change = Change::None;
            for child in v {
                match ServerEvent::from_value(child) {
                    Ok(event) => change = change.merge(apply_event(store, event)),
                    Err(e) => warn!(error = %e, "dropping malformed bulk child"),
                }
            }
            change
        }

        ServerEvent::Ready(ready) => {
            seed_ready(store, ready);
            Change::Store
        }

        // ---- Messages ----
        ServerEvent::Message(message) => on_message(store, message),

        ServerEvent::MessageUpdate {
            id,
            channel,
            data,
            clear,
        } => match store.message_mut(&id) {
            Some(message) => {
                apply_diff(message, data, &clear);
                Change::Channel(channel)
            }
            None => Change::None,
        },

        ServerEvent::MessageAppend {
            id,
            channel,
            append,
        } => match store.message_mut(&id) {
            Some(message) => {
                message
                    .embeds
                    .get_or_insert_with(Vec::new)
                    .extend(append.embeds);
                Change::Channel(channel)
            }
            None => Change::None,
        },

        ServerEvent::MessageDelete { id, channel } => {
            store.delete_message(&channel, &id);
            Change::Channel(channel)
        }

        ServerEvent::BulkMessageDelete { channel, ids } => {
            for id in &ids {
                store.delete_message(&channel, id);
            }
            Change::Channel(channel)
        }

        ServerEvent::MessageReact {
            id,
            channel_id,
            user_id,
            emoji_id,
        } => match store.message_mut(&id) {
            Some(message) => {
                message.add_reaction(emoji_id, user_id);
                Change::Channel(channel_id)
            }
            None => Change::None,
        },

        ServerEvent::MessageUnreact {
            id,
            channel_id,
            user_id,
            emoji_id,
        } => match store.message_mut(&id) {
            Some(message) => {
                message.remove_reaction(&emoji_id, &user_id);
                Change::Channel(channel_id)
            }
            None => Change::None,
        },

        ServerEvent::MessageRemoveReaction {
            id,
            channel_id,
            emoji_id,
        } => match store.message_mut(&id) {
            Some(message) => {
                message.clear_reaction(&emoji_id);
                Change::Channel(channel_id)
            }
            None => Change::None,
        },

        // ---- Channels ----
        ServerEvent::ChannelCreate(channel) => on_channel_create(store, channel),

        ServerEvent::ChannelUpdate { id, data, clear } => match store.channel_mut(&id) {
            Some(channel) => {
                apply_diff(channel, data, &clear);
                Change::Channel(id)
            }
            None => Change::None,
        },

        ServerEvent::ChannelDelete { id } => match store.delete_channel(&id) {
            Some(_) => Change::Store,
            None => Change::None,
        },

        ServerEvent::ChannelGroupJoin { id, user } => {
            if let Some(Channel::Group(group)) = store.channel_mut(&id) {
                if !group.recipients.contains(&user) {
                    group.recipients.push(user);
                }
                return Change::Channel(id);
            }
            Change::None
        }

        ServerEvent::ChannelGroupLeave { id, user } => {
            if store.current_user_id() == Some(&user) {
                store.delete_channel(&id);
                return Change::Store;
            }
            if let Some(Channel::Group(group)) = store.channel_mut(&id) {
                group.recipients.retain(|r| r != &user);
                return Change::Channel(id);
            }
            Change::None
        }

        ServerEvent::ChannelStartTyping { id, user } => {
            if store.start_typing(&id, user) {
                Change::Ephemeral(id)
            } else {
                Change::None
            }
        }

        ServerEvent::ChannelStopTyping { id, user } => {
            if store.stop_typing(&id, &user) {
                Change::Ephemeral(id)
            } else {
                Change::None
            }
        }

        ServerEvent::ChannelAck {
            id,
            user,
            message_id,
        } => {
            if store.ack(&id, &user, &message_id) {
                Change::Channel(id)
            } else {
                trace!(channel = %id, "ignoring stale ack");
                Change::None
            }
        }

        // ---- Servers ----
        ServerEvent::ServerCreate {
            id,
            server,
            channels,
            emojis,
        } => {
            if server.id != id {
                warn!(event_id = %id, server_id = %server.id, "ServerCreate id mismatch");
            }
            store.put_server(server);
            for channel in channels {
                let channel_id = channel.id().clone();
                if store.put_channel(channel) {
                    store.ensure_message_list(&channel_id);
                }
            }
            for emoji in emojis {
                store.put_emoji(emoji);
            }
            Change::Store
        }

        ServerEvent::ServerUpdate { id, data, clear } => match store.server_mut(&id) {
            Some(server) => {
                apply_diff(server, data, &clear);
                Change::Store
            }
            None => Change::None,
        },

        ServerEvent::ServerDelete { id } => match store.delete_server(&id) {
            Some(_) => Change::Store,
            None => Change::None,
        },

        ServerEvent::ServerMemberUpdate { id, data, clear } => match store.member_mut(&id) {
            Some(member) => {
                apply_diff(member, data, &clear);
                Change::Store
            }
            None => Change::None,
        },

        ServerEvent::ServerMemberJoin { id, user, member } => {
            let member = member.unwrap_or_else(|| fresh_member(id, user));
            if store.put_member(member) {
                Change::Store
            } else {
                Change::None
            }
        }

        ServerEvent::ServerMemberLeave { id, user } => {
            if store.current_user_id() == Some(&user) {
                store.delete_server(&id);
                return Change::Store;
            }
            match store.remove_member(&MemberId { server: id, user }) {
                Some(_) => Change::Store,
                None => Change::None,
            }
        }

        ServerEvent::ServerRoleUpdate {
            id,
            role_id,
            data,
            clear,
        } => {
            let Some(server) = store.server_mut(&id) else {
                return Change::None;
            };
            let roles = server.roles.get_or_insert_with(HashMap::new);
            match roles.entry(role_id) {
                Entry::Occupied(mut entry) => apply_diff(entry.get_mut(), data, &clear),
                Entry::Vacant(entry) => {
                    let role = entry.insert(Role::from_patch(RolePatch::default()));
                    apply_diff(role, data, &clear);
                }
            }
            Change::Store
        }

        ServerEvent::ServerRoleDelete { id, role_id } => {
            let removed = store
                .server_mut(&id)
                .and_then(|s| s.roles.as_mut())
                .and_then(|roles| roles.remove(&role_id));
            if removed.is_none() {
                return Change::None;
            }
            let channels: Vec<ChannelId> = store
                .channels_of_server(&id)
                .into_iter()
                .map(|c| c.id().clone())
                .collect();
            for channel in channels {
                if let Some(Channel::TextChannel(c) | Channel::VoiceChannel(c)) =
                    store.channel_mut(&channel)
                {
                    c.role_permissions.remove(&role_id);
                }
            }
            Change::Store
        }

        // ---- Users ----
        ServerEvent::UserUpdate { id, data, clear } => match store.user_mut(&id) {
            Some(user) => {
                apply_diff(user, data, &clear);
                Change::Store
            }
            None => Change::None,
        },

        ServerEvent::UserRelationship { id, mut user, status } => {
            if user.id != id {
                debug!(event_id = %id, user_id = %user.id, "relationship event for other id");
            }
            if let Some(status) = status {
                user.relationship = Some(status);
            }
            store.put_user(user);
            Change::Store
        }

        ServerEvent::UserPlatformWipe { user_id, .. } => {
            store.wipe_user(&user_id);
            Change::Store
        }

        // ---- Emojis and webhooks ----
        ServerEvent::EmojiCreate(emoji) => {
            store.put_emoji(emoji);
            Change::Store
        }

        ServerEvent::EmojiDelete { id } => match store.remove_emoji(&id) {
            Some(_) => Change::Store,
            None => Change::None,
        },

        ServerEvent::WebhookCreate(webhook) => {
            store.put_webhook(webhook);
            Change::Store
        }

        ServerEvent::WebhookUpdate { id, data, remove } => match store.webhook_mut(&id) {
            Some(webhook) => {
                apply_diff(webhook, data, &remove);
                Change::Store
            }
            None => Change::None,
        },

        ServerEvent::WebhookDelete { id } => match store.remove_webhook(&id) {
            Some(_) => Change::Store,
            None => Change::None,
        },
    }
}

fn on_message(store: &mut EntityStore, mut message: Message) -> Change {
    let channel = message.channel.clone();

    if let Some(user) = message.user.take() {
        store.put_user(*user);
    }
    if let Some(member) = message.member.take() {
        store.put_member(*member);
    }

    store.reconcile_queued(&message);

    let id = message.id.clone();
    let author = message.author.clone();
    let me = store.current_user_id().cloned();
    let mentions_me = me.as_ref().is_some_and(|me| message.mentions(me));
    let previous_tail = store.tail_message_id(&channel).cloned();

    if !store.insert_message(message) {
        return Change::Channel(channel);
    }
    store.trim_channel(&channel);

    if let Some(c) = store.channel_mut(&channel) {
        if c.last_message_id().map_or(true, |last| last < &id) {
            c.set_last_message_id(id.clone());
        }
    }

    if let Some(me) = me {
        if author == me {
            store.ack(&channel, &me, &id);
        } else {
            let marker = store.unread_entry(&channel, &me);
            if marker.last_id.is_none() {
                marker.last_id = previous_tail;
            }
            if mentions_me && !marker.mentions.contains(&id) {
                marker.mentions.push(id);
            }
        }
    }

    Change::Channel(channel)
}

fn on_channel_create(store: &mut EntityStore, channel: Channel) -> Change {
    let id = channel.id().clone();
    let server = channel.server().cloned();
    if !store.put_channel(channel) {
        return Change::None;
    }
    store.ensure_message_list(&id);
    if let Some(server) = server.and_then(|s| store.server_mut(&s)) {
        if !server.channels.contains(&id) {
            server.channels.push(id);
        }
    }
    Change::Store
}

fn fresh_member(server: ServerId, user: UserId) -> Member {
    Member {
        id: MemberId { server, user },
        joined_at: Utc::now(),
        nickname: None,
        avatar: None,
        roles: None,
        timeout: None,
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Replace the pushed entity kinds with a `Ready` snapshot and record the
/// signed-in user.
pub fn seed_ready(store: &mut EntityStore, ready: ReadyPayload) {
    store.reset_for_bootstrap();

    for user in ready.users {
        if user.is_self() {
            store.set_current_user(user.id.clone());
        }
        store.put_user(user);
    }
    for server in ready.servers {
        store.put_server(server);
    }
    for channel in ready.channels {
        store.put_channel(channel);
    }
    for member in ready.members {
        store.put_member(member);
    }
    for emoji in ready.emojis {
        store.put_emoji(emoji);
    }
}

/// Merge the DM list and read markers fetched after `Ready`, then drop the
/// cached history of every channel whose tail disagrees with the server.
/// Returns the invalidated channels.
pub fn merge_bootstrap(
    store: &mut EntityStore,
    dms: Vec<Channel>,
    unreads: Vec<ChannelUnread>,
) -> Vec<ChannelId> {
    for dm in dms {
        store.put_channel(dm);
    }
    store.replace_unreads(unreads);
    store.prune_orphans();

    let stale: Vec<ChannelId> = store
        .channels()
        .filter(|c| c.tracks_last_message())
        .filter(|c| match store.channel_message_ids(c.id()) {
            Some(ids) => c.last_message_id() != ids.last(),
            None => false,
        })
        .map(|c| c.id().clone())
        .collect();
    for channel in &stale {
        debug!(channel = %channel, "cached tail is stale, invalidating history");
        store.clear_channel_messages(channel);
    }

    let fresh: Vec<ChannelId> = store
        .channels()
        .filter(|c| c.tracks_last_message() && c.last_message_id().is_none())
        .map(|c| c.id().clone())
        .collect();
    for channel in &fresh {
        store.ensure_message_list(channel);
    }

    stale
}
