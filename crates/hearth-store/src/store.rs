//! Normalized in-memory snapshot of every entity the session can see.
//!
//! One collection per entity kind, keyed by id. Entities reference each
//! other by id only and an unknown id is a normal "not fetched yet" state,
//! so every lookup returns an `Option`. Cascading deletes keep dependent
//! collections from growing without bound.
//!
//! All operations are synchronous and never touch I/O. Concurrent access
//! goes through [`StoreHandle`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use hearth_shared::constants::MAX_CACHED_MESSAGES_PER_CHANNEL;
use hearth_shared::models::{
    Channel, ChannelUnread, Emoji, Member, Message, QueuedMessage, Server, User, Webhook,
};
use hearth_shared::permissions::{
    resolve_channel_permissions, resolve_server_permissions, ChannelContext, Permissions,
};
use hearth_shared::types::{
    ChannelId, EmojiId, MemberId, MessageId, ServerId, UnreadId, UserId, WebhookId,
};

use crate::error::{Result, StoreError};

/// One row of a channel timeline: confirmed messages first, then local
/// placeholders still waiting for the server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineEntry<'a> {
    Message(&'a Message),
    Queued(&'a QueuedMessage),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntityStore {
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) servers: HashMap<ServerId, Server>,
    pub(crate) channels: HashMap<ChannelId, Channel>,
    pub(crate) members: HashMap<MemberId, Member>,
    pub(crate) messages: HashMap<MessageId, Message>,
    /// Cached message ids per channel, ascending.
    pub(crate) channel_messages: HashMap<ChannelId, Vec<MessageId>>,
    pub(crate) emojis: HashMap<EmojiId, Emoji>,
    pub(crate) webhooks: HashMap<WebhookId, Webhook>,
    pub(crate) unreads: HashMap<UnreadId, ChannelUnread>,
    pub(crate) current_user: Option<UserId>,

    // Ephemeral, never persisted.
    queued: HashMap<ChannelId, Vec<QueuedMessage>>,
    typing: HashMap<ChannelId, Vec<UserId>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, ephemeral state included.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Drop everything except ephemeral state, keeping the persisted
    /// collections equal to a freshly loaded store.
    pub fn without_ephemeral(&self) -> Self {
        Self {
            queued: HashMap::new(),
            typing: HashMap::new(),
            ..self.clone()
        }
    }

    /// Drop every entity kind a `Ready` snapshot delivers in full. Cached
    /// history, read markers, webhooks and pending sends are kept.
    pub fn reset_for_bootstrap(&mut self) {
        self.users.clear();
        self.servers.clear();
        self.channels.clear();
        self.members.clear();
        self.emojis.clear();
        self.typing.clear();
        self.current_user = None;
    }

    /// Forget history, webhooks and markers of channels that no longer exist.
    pub fn prune_orphans(&mut self) {
        let channels = &self.channels;
        let orphaned: Vec<ChannelId> = self
            .channel_messages
            .keys()
            .filter(|id| !channels.contains_key(*id))
            .cloned()
            .collect();
        for id in orphaned {
            self.clear_channel_messages(&id);
        }
        let channels = &self.channels;
        self.messages.retain(|_, m| channels.contains_key(&m.channel));
        self.webhooks.retain(|_, w| channels.contains_key(&w.channel_id));
        self.unreads.retain(|id, _| channels.contains_key(&id.channel));
        self.queued.retain(|id, _| channels.contains_key(id));
    }

    // ---- Users ----

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.get_mut(id)
    }

    pub fn put_user(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn current_user_id(&self) -> Option<&UserId> {
        self.current_user.as_ref()
    }

    pub fn set_current_user(&mut self, id: UserId) {
        self.current_user = Some(id);
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref().and_then(|id| self.users.get(id))
    }

    /// Forget a user whose data was taken down: the entity, their
    /// memberships and every cached message they wrote.
    pub fn wipe_user(&mut self, id: &UserId) {
        self.users.remove(id);
        self.members.retain(|member_id, _| &member_id.user != id);

        let wiped: Vec<(ChannelId, MessageId)> = self
            .messages
            .values()
            .filter(|m| &m.author == id)
            .map(|m| (m.channel.clone(), m.id.clone()))
            .collect();
        for (channel, message) in wiped {
            self.delete_message(&channel, &message);
        }
        for typing in self.typing.values_mut() {
            typing.retain(|u| u != id);
        }
    }

    // ---- Servers ----

    pub fn server(&self, id: &ServerId) -> Option<&Server> {
        self.servers.get(id)
    }

    pub fn server_mut(&mut self, id: &ServerId) -> Option<&mut Server> {
        self.servers.get_mut(id)
    }

    pub fn put_server(&mut self, server: Server) {
        self.servers.insert(server.id.clone(), server);
    }

    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.servers.values()
    }

    /// Remove a server together with its channels, members and emojis.
    pub fn delete_server(&mut self, id: &ServerId) -> Option<Server> {
        let server = self.servers.remove(id);

        let channels: Vec<ChannelId> = self
            .channels
            .values()
            .filter(|c| c.server() == Some(id))
            .map(|c| c.id().clone())
            .collect();
        for channel in channels {
            self.delete_channel(&channel);
        }

        self.members.retain(|member_id, _| &member_id.server != id);
        self.emojis.retain(|_, emoji| emoji.server() != Some(id));
        server
    }

    /// Channels of a server in the server's own order. Ids the store has not
    /// seen yet are skipped.
    pub fn channels_of_server(&self, id: &ServerId) -> Vec<&Channel> {
        let Some(server) = self.servers.get(id) else {
            return Vec::new();
        };
        server
            .channels
            .iter()
            .filter_map(|c| self.channels.get(c))
            .collect()
    }

    /// Members of a server, ordered by user id.
    pub fn members_of_server(&self, id: &ServerId) -> Vec<&Member> {
        let mut members: Vec<&Member> = self
            .members
            .values()
            .filter(|m| &m.id.server == id)
            .collect();
        members.sort_by(|a, b| a.id.user.cmp(&b.id.user));
        members
    }

    pub fn emojis_of_server(&self, id: &ServerId) -> Vec<&Emoji> {
        let mut emojis: Vec<&Emoji> = self
            .emojis
            .values()
            .filter(|e| e.server() == Some(id))
            .collect();
        emojis.sort_by(|a, b| a.id.cmp(&b.id));
        emojis
    }

    // ---- Channels ----

    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn channel_mut(&mut self, id: &ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    /// Insert or replace a channel. A replacement that would move the
    /// channel to a different server is refused and returns `false`.
    pub fn put_channel(&mut self, channel: Channel) -> bool {
        if let Some(existing) = self.channels.get(channel.id()) {
            if existing.server().is_some() && existing.server() != channel.server() {
                tracing::warn!(
                    channel = %channel.id(),
                    "refusing to move channel to another server"
                );
                return false;
            }
        }
        self.channels.insert(channel.id().clone(), channel);
        true
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Remove a channel and everything scoped to it: its place in the
    /// server's channel list, cached messages, webhooks, read markers and
    /// ephemeral state.
    pub fn delete_channel(&mut self, id: &ChannelId) -> Option<Channel> {
        let channel = self.channels.remove(id);

        if let Some(server_id) = channel.as_ref().and_then(|c| c.server()) {
            if let Some(server) = self.servers.get_mut(server_id) {
                server.remove_channel(id);
            }
        }

        self.clear_channel_messages(id);
        self.channel_messages.remove(id);
        self.webhooks.retain(|_, w| &w.channel_id != id);
        self.unreads.retain(|unread_id, _| &unread_id.channel != id);
        self.queued.remove(id);
        self.typing.remove(id);
        channel
    }

    /// Direct messages and groups, most recent activity first. Inactive
    /// DMs are hidden; channels without messages sort last.
    pub fn dm_channels(&self) -> Vec<&Channel> {
        let mut dms: Vec<&Channel> = self
            .channels
            .values()
            .filter(|c| match c {
                Channel::DirectMessage(dm) => dm.active,
                Channel::Group(_) => true,
                _ => false,
            })
            .collect();
        dms.sort_by(|a, b| {
            b.last_message_id()
                .cmp(&a.last_message_id())
                .then_with(|| a.id().cmp(b.id()))
        });
        dms
    }

    // ---- Members ----

    pub fn member(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    pub fn member_mut(&mut self, id: &MemberId) -> Option<&mut Member> {
        self.members.get_mut(id)
    }

    /// Insert or replace a member. Members of servers the store does not
    /// know are dropped and `false` is returned.
    pub fn put_member(&mut self, member: Member) -> bool {
        if !self.servers.contains_key(&member.id.server) {
            tracing::debug!(
                server = %member.id.server,
                user = %member.id.user,
                "dropping member of unknown server"
            );
            return false;
        }
        self.members.insert(member.id.clone(), member);
        true
    }

    pub fn remove_member(&mut self, id: &MemberId) -> Option<Member> {
        self.members.remove(id)
    }

    // ---- Messages ----

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.get_mut(id)
    }

    /// Cached ids of a channel, ascending. `None` means the channel's
    /// history was never loaded or was invalidated.
    pub fn channel_message_ids(&self, channel: &ChannelId) -> Option<&[MessageId]> {
        self.channel_messages.get(channel).map(Vec::as_slice)
    }

    pub fn tail_message_id(&self, channel: &ChannelId) -> Option<&MessageId> {
        self.channel_messages.get(channel).and_then(|ids| ids.last())
    }

    /// Make sure a (possibly empty) id list exists for `channel`.
    pub fn ensure_message_list(&mut self, channel: &ChannelId) {
        self.channel_messages.entry(channel.clone()).or_default();
    }

    /// Upsert a message and place its id in the channel list. Returns
    /// `true` if the id was not listed before.
    pub fn insert_message(&mut self, message: Message) -> bool {
        let ids = self
            .channel_messages
            .entry(message.channel.clone())
            .or_default();
        let inserted = match ids.last() {
            Some(last) if last < &message.id => {
                ids.push(message.id.clone());
                true
            }
            None => {
                ids.push(message.id.clone());
                true
            }
            Some(_) => match ids.binary_search(&message.id) {
                Ok(_) => false,
                Err(pos) => {
                    ids.insert(pos, message.id.clone());
                    true
                }
            },
        };
        self.messages.insert(message.id.clone(), message);
        inserted
    }

    /// Drop the oldest cached messages of a channel beyond the cache bound.
    pub fn trim_channel(&mut self, channel: &ChannelId) {
        let Some(ids) = self.channel_messages.get_mut(channel) else {
            return;
        };
        if ids.len() <= MAX_CACHED_MESSAGES_PER_CHANNEL {
            return;
        }
        let excess = ids.len() - MAX_CACHED_MESSAGES_PER_CHANNEL;
        for id in ids.drain(..excess) {
            self.messages.remove(&id);
        }
    }

    /// Remove a message from its channel list and from the cache.
    pub fn delete_message(&mut self, channel: &ChannelId, id: &MessageId) -> Option<Message> {
        if let Some(ids) = self.channel_messages.get_mut(channel) {
            ids.retain(|m| m != id);
        }
        self.messages.remove(id)
    }

    /// Forget the cached history of a channel. The list itself is dropped so
    /// readers see "not loaded" and refetch.
    pub fn clear_channel_messages(&mut self, channel: &ChannelId) {
        if let Some(ids) = self.channel_messages.remove(channel) {
            for id in ids {
                self.messages.remove(&id);
            }
        }
    }

    /// Confirmed messages followed by queued placeholders.
    pub fn channel_messages(&self, channel: &ChannelId) -> Vec<TimelineEntry<'_>> {
        let confirmed = self
            .channel_messages
            .get(channel)
            .into_iter()
            .flatten()
            .filter_map(|id| self.messages.get(id))
            .map(TimelineEntry::Message);
        let queued = self
            .queued
            .get(channel)
            .into_iter()
            .flatten()
            .map(TimelineEntry::Queued);
        confirmed.chain(queued).collect()
    }

    // ---- Queued messages ----

    pub fn push_queued(&mut self, message: QueuedMessage) {
        self.queued
            .entry(message.channel.clone())
            .or_default()
            .push(message);
    }

    pub fn queued(&self, channel: &ChannelId) -> &[QueuedMessage] {
        self.queued.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn remove_queued(&mut self, channel: &ChannelId, nonce: &MessageId) -> Option<QueuedMessage> {
        let queue = self.queued.get_mut(channel)?;
        let pos = queue.iter().position(|q| &q.nonce == nonce)?;
        let removed = queue.remove(pos);
        if queue.is_empty() {
            self.queued.remove(channel);
        }
        Some(removed)
    }

    /// Drop the placeholder that `message` confirms, if any.
    pub fn reconcile_queued(&mut self, message: &Message) -> Option<QueuedMessage> {
        let nonce = self
            .queued
            .get(&message.channel)?
            .iter()
            .find(|q| q.is_confirmed_by(message))?
            .nonce
            .clone();
        self.remove_queued(&message.channel, &nonce)
    }

    // ---- Emojis ----

    pub fn emoji(&self, id: &EmojiId) -> Option<&Emoji> {
        self.emojis.get(id)
    }

    pub fn put_emoji(&mut self, emoji: Emoji) {
        self.emojis.insert(emoji.id.clone(), emoji);
    }

    pub fn remove_emoji(&mut self, id: &EmojiId) -> Option<Emoji> {
        self.emojis.remove(id)
    }

    // ---- Webhooks ----

    pub fn webhook(&self, id: &WebhookId) -> Option<&Webhook> {
        self.webhooks.get(id)
    }

    pub fn webhook_mut(&mut self, id: &WebhookId) -> Option<&mut Webhook> {
        self.webhooks.get_mut(id)
    }

    pub fn put_webhook(&mut self, webhook: Webhook) {
        self.webhooks.insert(webhook.id.clone(), webhook);
    }

    pub fn remove_webhook(&mut self, id: &WebhookId) -> Option<Webhook> {
        self.webhooks.remove(id)
    }

    // ---- Unread markers ----

    pub fn unread_marker(&self, channel: &ChannelId, user: &UserId) -> Option<&ChannelUnread> {
        self.unreads.get(&UnreadId {
            channel: channel.clone(),
            user: user.clone(),
        })
    }

    /// Marker of the signed-in user on `channel`.
    pub fn unread(&self, channel: &ChannelId) -> Option<&ChannelUnread> {
        let user = self.current_user.as_ref()?;
        self.unread_marker(channel, user)
    }

    pub fn put_unread(&mut self, unread: ChannelUnread) {
        self.unreads.insert(unread.id.clone(), unread);
    }

    /// Replace every marker with a server-delivered snapshot.
    pub fn replace_unreads(&mut self, unreads: Vec<ChannelUnread>) {
        self.unreads = unreads.into_iter().map(|u| (u.id.clone(), u)).collect();
    }

    /// Marker for `(channel, user)`, created empty if missing.
    pub fn unread_entry(&mut self, channel: &ChannelId, user: &UserId) -> &mut ChannelUnread {
        let id = UnreadId {
            channel: channel.clone(),
            user: user.clone(),
        };
        self.unreads
            .entry(id.clone())
            .or_insert_with(|| ChannelUnread::new(id))
    }

    /// Move a read marker forward. Returns `false` if `message` is older
    /// than the current position.
    pub fn ack(&mut self, channel: &ChannelId, user: &UserId, message: &MessageId) -> bool {
        self.unread_entry(channel, user).advance(message)
    }

    /// Whether the channel's newest message is past the signed-in user's
    /// read position.
    pub fn is_unread(&self, channel: &ChannelId) -> bool {
        let Some(last) = self.channels.get(channel).and_then(|c| c.last_message_id()) else {
            return false;
        };
        self.unread(channel).map_or(true, |u| u.is_unread(last))
    }

    /// Cached messages past the read position.
    pub fn unread_count(&self, channel: &ChannelId) -> usize {
        let Some(ids) = self.channel_messages.get(channel) else {
            return 0;
        };
        match self.unread(channel) {
            Some(marker) => ids.iter().filter(|id| marker.is_unread(id)).count(),
            None => ids.len(),
        }
    }

    pub fn mention_count(&self, channel: &ChannelId) -> usize {
        self.unread(channel).map_or(0, |u| u.mentions.len())
    }

    // ---- Typing ----

    /// Returns `true` if the user was not already typing.
    pub fn start_typing(&mut self, channel: &ChannelId, user: UserId) -> bool {
        let users = self.typing.entry(channel.clone()).or_default();
        if users.contains(&user) {
            return false;
        }
        users.push(user);
        true
    }

    pub fn stop_typing(&mut self, channel: &ChannelId, user: &UserId) -> bool {
        let Some(users) = self.typing.get_mut(channel) else {
            return false;
        };
        let before = users.len();
        users.retain(|u| u != user);
        let removed = users.len() != before;
        if users.is_empty() {
            self.typing.remove(channel);
        }
        removed
    }

    pub fn typing_users(&self, channel: &ChannelId) -> &[UserId] {
        self.typing.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    // ---- Permissions ----

    /// Server-wide permissions of `user`; empty if the user, server or
    /// membership is unknown.
    pub fn server_permissions(&self, user: &UserId, server: &ServerId) -> Permissions {
        let (Some(u), Some(s)) = (self.users.get(user), self.servers.get(server)) else {
            return Permissions::empty();
        };
        let member_id = MemberId {
            server: server.clone(),
            user: user.clone(),
        };
        match self.members.get(&member_id) {
            Some(member) => resolve_server_permissions(u, member, s),
            None if u.privileged || u.id == s.owner => Permissions::all(),
            None => Permissions::empty(),
        }
    }

    /// Effective permissions of `user` in `channel`; empty whenever an
    /// entity the resolution needs is not in the store.
    pub fn channel_permissions(&self, user: &UserId, channel: &ChannelId) -> Permissions {
        let (Some(target), Some(channel)) = (self.users.get(user), self.channels.get(channel))
        else {
            return Permissions::empty();
        };

        let context = match channel.as_server_channel() {
            Some(server_channel) => {
                let Some(server) = self.servers.get(&server_channel.server) else {
                    return Permissions::empty();
                };
                let member_id = MemberId {
                    server: server.id.clone(),
                    user: user.clone(),
                };
                let Some(member) = self.members.get(&member_id) else {
                    return if target.privileged || server.owner == target.id {
                        Permissions::all()
                    } else {
                        Permissions::empty()
                    };
                };
                ChannelContext::Server {
                    channel: server_channel,
                    server,
                    member,
                }
            }
            None => {
                let other = match channel {
                    Channel::DirectMessage(dm) => dm
                        .other_recipient(user)
                        .and_then(|other| self.users.get(other)),
                    _ => None,
                };
                match ChannelContext::private(channel, other) {
                    Some(context) => context,
                    None => return Permissions::empty(),
                }
            }
        };
        resolve_channel_permissions(target, context)
    }
}

/// Shared, lock-protected store. Closures keep guards from living across
/// `.await` points.
#[derive(Clone, Default)]
pub struct StoreHandle {
    inner: Arc<RwLock<EntityStore>>,
}

impl StoreHandle {
    pub fn new(store: EntityStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn read<T>(&self, f: impl FnOnce(&EntityStore) -> T) -> Result<T> {
        let guard = self
            .inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(f(&guard))
    }

    pub fn write<T>(&self, f: impl FnOnce(&mut EntityStore) -> T) -> Result<T> {
        let mut guard = self
            .inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(f(&mut guard))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use hearth_shared::models::{DirectMessage, EmojiParent, ServerChannel};
    use hearth_shared::permissions::Permissions;

    use super::*;

    pub(crate) fn user(id: &str) -> User {
        serde_json::from_value(serde_json::json!({
            "_id": id,
            "username": id,
            "discriminator": "0001"
        }))
        .unwrap()
    }

    pub(crate) fn server(id: &str, owner: &str, channels: &[&str]) -> Server {
        serde_json::from_value(serde_json::json!({
            "_id": id,
            "owner": owner,
            "name": id,
            "channels": channels,
            "default_permissions": Permissions::DEFAULT_SERVER.bits()
        }))
        .unwrap()
    }

    pub(crate) fn text_channel(id: &str, server: &str) -> Channel {
        Channel::TextChannel(ServerChannel {
            id: ChannelId::from(id),
            server: ServerId::from(server),
            name: id.into(),
            description: None,
            icon: None,
            last_message_id: None,
            default_permissions: None,
            role_permissions: HashMap::new(),
            nsfw: false,
            voice: None,
        })
    }

    pub(crate) fn member(server: &str, user: &str) -> Member {
        Member {
            id: MemberId {
                server: ServerId::from(server),
                user: UserId::from(user),
            },
            joined_at: Utc::now(),
            nickname: None,
            avatar: None,
            roles: None,
            timeout: None,
        }
    }

    pub(crate) fn message(id: &str, channel: &str, author: &str) -> Message {
        serde_json::from_value(serde_json::json!({
            "_id": id,
            "channel": channel,
            "author": author,
            "content": format!("message {id}")
        }))
        .unwrap()
    }

    fn populated() -> EntityStore {
        let mut store = EntityStore::new();
        store.put_user(user("me"));
        store.set_current_user(UserId::from("me"));
        store.put_server(server("s1", "owner", &["c1", "c2"]));
        store.put_channel(text_channel("c1", "s1"));
        store.put_channel(text_channel("c2", "s1"));
        assert!(store.put_member(member("s1", "me")));
        store.put_emoji(Emoji {
            id: EmojiId::from("e1"),
            parent: EmojiParent::Server {
                id: ServerId::from("s1"),
            },
            creator_id: UserId::from("me"),
            name: "wave".into(),
            animated: false,
            nsfw: false,
        });
        store
    }

    #[test]
    fn test_insert_message_is_idempotent_and_sorted() {
        let mut store = populated();
        assert!(store.insert_message(message("03", "c1", "me")));
        assert!(store.insert_message(message("01", "c1", "me")));
        assert!(!store.insert_message(message("03", "c1", "me")));
        assert!(store.insert_message(message("02", "c1", "me")));

        let ids: Vec<&str> = store
            .channel_message_ids(&ChannelId::from("c1"))
            .unwrap()
            .iter()
            .map(MessageId::as_str)
            .collect();
        assert_eq!(ids, vec!["01", "02", "03"]);
    }

    #[test]
    fn test_delete_channel_prunes_server_list_and_messages() {
        let mut store = populated();
        store.insert_message(message("01", "c1", "me"));
        store.delete_channel(&ChannelId::from("c1"));

        let server = store.server(&ServerId::from("s1")).unwrap();
        assert_eq!(server.channels, vec![ChannelId::from("c2")]);
        assert!(store.message(&MessageId::from("01")).is_none());
        assert!(store.channel_message_ids(&ChannelId::from("c1")).is_none());
    }

    #[test]
    fn test_delete_server_cascades() {
        let mut store = populated();
        store.delete_server(&ServerId::from("s1"));

        assert!(store.channel(&ChannelId::from("c1")).is_none());
        assert!(store.members_of_server(&ServerId::from("s1")).is_empty());
        assert!(store.emoji(&EmojiId::from("e1")).is_none());
    }

    #[test]
    fn test_member_of_unknown_server_is_dropped() {
        let mut store = populated();
        assert!(!store.put_member(member("nowhere", "me")));
    }

    #[test]
    fn test_channel_cannot_change_server() {
        let mut store = populated();
        assert!(!store.put_channel(text_channel("c1", "s2")));
        assert_eq!(
            store.channel(&ChannelId::from("c1")).unwrap().server(),
            Some(&ServerId::from("s1"))
        );
    }

    #[test]
    fn test_trim_channel_drops_oldest() {
        let mut store = populated();
        for i in 0..MAX_CACHED_MESSAGES_PER_CHANNEL + 5 {
            store.insert_message(message(&format!("{i:06}"), "c1", "me"));
        }
        store.trim_channel(&ChannelId::from("c1"));

        let ids = store.channel_message_ids(&ChannelId::from("c1")).unwrap();
        assert_eq!(ids.len(), MAX_CACHED_MESSAGES_PER_CHANNEL);
        assert_eq!(ids[0].as_str(), "000005");
        assert!(store.message(&MessageId::from("000000")).is_none());
    }

    #[test]
    fn test_timeline_lists_queued_after_confirmed() {
        let mut store = populated();
        store.insert_message(message("01", "c1", "me"));
        store.push_queued(QueuedMessage {
            nonce: MessageId::from("02"),
            channel: ChannelId::from("c1"),
            author: UserId::from("me"),
            content: "pending".into(),
            replies: Vec::new(),
            attachments: Vec::new(),
        });

        let timeline = store.channel_messages(&ChannelId::from("c1"));
        assert_eq!(timeline.len(), 2);
        assert!(matches!(timeline[0], TimelineEntry::Message(_)));
        assert!(matches!(timeline[1], TimelineEntry::Queued(_)));

        let mut confirmed = message("02", "c1", "me");
        confirmed.nonce = Some("02".into());
        assert!(store.reconcile_queued(&confirmed).is_some());
        assert!(store.queued(&ChannelId::from("c1")).is_empty());
    }

    #[test]
    fn test_unread_counts_follow_marker() {
        let mut store = populated();
        for id in ["01", "02", "03"] {
            store.insert_message(message(id, "c1", "other"));
        }
        if let Some(c) = store.channel_mut(&ChannelId::from("c1")) {
            c.set_last_message_id(MessageId::from("03"));
        }
        let c1 = ChannelId::from("c1");
        assert!(store.is_unread(&c1));
        assert_eq!(store.unread_count(&c1), 3);

        store.ack(&c1, &UserId::from("me"), &MessageId::from("02"));
        assert_eq!(store.unread_count(&c1), 1);

        assert!(!store.ack(&c1, &UserId::from("me"), &MessageId::from("01")));
        store.ack(&c1, &UserId::from("me"), &MessageId::from("03"));
        assert!(!store.is_unread(&c1));
    }

    #[test]
    fn test_typing_set_has_no_duplicates() {
        let mut store = populated();
        let c1 = ChannelId::from("c1");
        assert!(store.start_typing(&c1, UserId::from("a")));
        assert!(!store.start_typing(&c1, UserId::from("a")));
        assert!(store.stop_typing(&c1, &UserId::from("a")));
        assert!(store.typing_users(&c1).is_empty());
    }

    #[test]
    fn test_dm_channels_sorted_by_activity() {
        let mut store = populated();
        for (id, last) in [("d1", Some("05")), ("d2", Some("09")), ("d3", None)] {
            store.put_channel(Channel::DirectMessage(DirectMessage {
                id: ChannelId::from(id),
                active: true,
                recipients: vec![UserId::from("me"), UserId::from("x")],
                last_message_id: last.map(MessageId::from),
            }));
        }
        let order: Vec<&str> = store.dm_channels().iter().map(|c| c.id().as_str()).collect();
        assert_eq!(order, vec!["d2", "d1", "d3"]);
    }

    #[test]
    fn test_channel_permissions_need_membership() {
        let mut store = populated();
        let c1 = ChannelId::from("c1");
        assert!(store
            .channel_permissions(&UserId::from("me"), &c1)
            .contains(Permissions::SEND_MESSAGE));

        store.remove_member(&MemberId {
            server: ServerId::from("s1"),
            user: UserId::from("me"),
        });
        assert_eq!(
            store.channel_permissions(&UserId::from("me"), &c1),
            Permissions::empty()
        );
        assert_eq!(
            store.channel_permissions(&UserId::from("ghost"), &c1),
            Permissions::empty()
        );
    }

    #[test]
    fn test_wipe_user_removes_their_messages() {
        let mut store = populated();
        store.put_user(user("spammer"));
        store.insert_message(message("01", "c1", "spammer"));
        store.insert_message(message("02", "c1", "me"));
        store.wipe_user(&UserId::from("spammer"));

        assert!(store.user(&UserId::from("spammer")).is_none());
        assert_eq!(
            store.channel_message_ids(&ChannelId::from("c1")).unwrap(),
            &[MessageId::from("02")]
        );
    }

    #[test]
    fn test_bootstrap_reset_keeps_history_until_pruned() {
        let mut store = populated();
        store.insert_message(message("01", "c1", "me"));
        store.insert_message(message("02", "c2", "me"));
        store.ack(&ChannelId::from("c2"), &UserId::from("me"), &MessageId::from("02"));

        store.reset_for_bootstrap();
        assert!(store.current_user_id().is_none());
        assert!(store.channel(&ChannelId::from("c1")).is_none());
        assert!(store.message(&MessageId::from("01")).is_some());

        store.put_channel(text_channel("c1", "s1"));
        store.prune_orphans();
        assert!(store.message(&MessageId::from("01")).is_some());
        assert!(store.message(&MessageId::from("02")).is_none());
        assert!(store.channel_message_ids(&ChannelId::from("c2")).is_none());
        assert!(store
            .unread_marker(&ChannelId::from("c2"), &UserId::from("me"))
            .is_none());
    }
}
