//! Durable copy of the persisted store collections.
//!
//! Every top-level collection becomes one row of the `collections` table,
//! holding a JSON array sorted by id.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use hearth_shared::models::{Channel, ChannelUnread, Emoji, Member, Message, Server, User, Webhook};
use hearth_shared::types::{ChannelId, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::store::EntityStore;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub channel_messages: Vec<(ChannelId, Vec<MessageId>)>,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
    #[serde(default)]
    pub webhooks: Vec<Webhook>,
    #[serde(default)]
    pub unreads: Vec<ChannelUnread>,
    #[serde(default)]
    pub current_user: Option<UserId>,
}

fn sorted<K: Ord, V: Clone>(map: &HashMap<K, V>) -> Vec<V> {
    let mut entries: Vec<(&K, &V)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, v)| v.clone()).collect()
}

impl EntityStore {
    /// Copy of the persisted collections. Typing state and queued messages
    /// are left out.
    pub fn to_snapshot(&self) -> Snapshot {
        let mut channel_messages: Vec<(ChannelId, Vec<MessageId>)> = self
            .channel_messages
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        channel_messages.sort_by(|a, b| a.0.cmp(&b.0));

        Snapshot {
            users: sorted(&self.users),
            servers: sorted(&self.servers),
            channels: sorted(&self.channels),
            members: sorted(&self.members),
            messages: sorted(&self.messages),
            channel_messages,
            emojis: sorted(&self.emojis),
            webhooks: sorted(&self.webhooks),
            unreads: sorted(&self.unreads),
            current_user: self.current_user.clone(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = EntityStore::new();
        store.users = snapshot.users.into_iter().map(|u| (u.id.clone(), u)).collect();
        store.servers = snapshot.servers.into_iter().map(|s| (s.id.clone(), s)).collect();
        store.channels = snapshot
            .channels
            .into_iter()
            .map(|c| (c.id().clone(), c))
            .collect();
        store.members = snapshot.members.into_iter().map(|m| (m.id.clone(), m)).collect();
        store.messages = snapshot.messages.into_iter().map(|m| (m.id.clone(), m)).collect();
        store.channel_messages = snapshot.channel_messages.into_iter().collect();
        store.emojis = snapshot.emojis.into_iter().map(|e| (e.id.clone(), e)).collect();
        store.webhooks = snapshot.webhooks.into_iter().map(|w| (w.id.clone(), w)).collect();
        store.unreads = snapshot.unreads.into_iter().map(|u| (u.id.clone(), u)).collect();
        store.current_user = snapshot.current_user;
        store
    }
}

impl Database {
    /// Write every collection of `snapshot` in one transaction.
    pub fn save_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        let collections = match serde_json::to_value(snapshot)? {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(StoreError::Json(serde::ser::Error::custom(
                    "snapshot is not a JSON object",
                )))
            }
        };
        let now = Utc::now().to_rfc3339();

        let tx = self.conn_mut().transaction()?;
        for (name, value) in &collections {
            tx.execute(
                "INSERT INTO collections (name, json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET json = excluded.json,
                                                 updated_at = excluded.updated_at",
                params![name, serde_json::to_string(value)?, now],
            )?;
        }
        tx.commit()?;

        tracing::debug!(collections = collections.len(), "snapshot saved");
        Ok(())
    }

    /// Read the persisted collections back. Missing rows become empty
    /// collections; a row that fails to decode is an error.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let mut stmt = self.conn().prepare("SELECT name, json FROM collections")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut collections = serde_json::Map::new();
        for row in rows {
            let (name, json) = row?;
            collections.insert(name, serde_json::from_str(&json)?);
        }
        Ok(serde_json::from_value(serde_json::Value::Object(collections))?)
    }

    /// Load the last saved store, or an empty one if nothing usable is on
    /// disk. Never fails.
    pub fn load_store(&self) -> EntityStore {
        match self.load_snapshot() {
            Ok(snapshot) => {
                tracing::info!(
                    users = snapshot.users.len(),
                    servers = snapshot.servers.len(),
                    channels = snapshot.channels.len(),
                    messages = snapshot.messages.len(),
                    "restored cached store"
                );
                EntityStore::from_snapshot(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, "cached store unreadable, starting empty");
                EntityStore::new()
            }
        }
    }

    pub fn clear_snapshot(&self) -> Result<()> {
        self.conn().execute("DELETE FROM collections", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hearth_shared::models::{Presence, Role, SystemMessage, UserStatus};
    use hearth_shared::permissions::{Overwrite, Permissions};
    use hearth_shared::types::{EmojiId, RoleId, ServerId};

    use super::*;
    use crate::store::tests::{member, message, server, text_channel, user};

    fn populated() -> EntityStore {
        let mut store = EntityStore::new();
        let mut me = user("me");
        me.display_name = Some("Me".into());
        me.status = Some(UserStatus {
            text: Some("around".into()),
            presence: Some(Presence::Idle),
        });
        store.put_user(me);
        store.set_current_user(UserId::from("me"));

        let mut s = server("s1", "me", &["c1"]);
        s.roles = Some(HashMap::from([(
            RoleId::from("r1"),
            Role {
                name: "mod".into(),
                overwrite: Overwrite::new(Permissions::MANAGE_MESSAGES, Permissions::empty()),
                colour: Some("#ff0000".into()),
                hoist: true,
                rank: 1,
            },
        )]));
        store.put_server(s);
        store.put_channel(text_channel("c1", "s1"));
        let mut m = member("s1", "me");
        m.roles = Some(vec![RoleId::from("r1")]);
        store.put_member(m);

        let mut msg = message("01", "c1", "me");
        msg.add_reaction(EmojiId::from("e1"), UserId::from("me"));
        msg.system = Some(SystemMessage::UserJoined {
            id: UserId::from("me"),
        });
        store.insert_message(msg);
        store.ack(&ChannelId::from("c1"), &UserId::from("me"), &MessageId::from("01"));
        store
    }

    #[test]
    fn test_round_trip_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_in(dir.path()).unwrap();
        let store = populated();

        db.save_snapshot(&store.to_snapshot()).unwrap();
        drop(db);

        let db = Database::open_in(dir.path()).unwrap();
        let restored = db.load_store();
        assert_eq!(restored, store.without_ephemeral());
        assert_eq!(
            restored
                .server(&ServerId::from("s1"))
                .and_then(|s| s.role(&RoleId::from("r1")))
                .and_then(|r| r.colour.as_deref()),
            Some("#ff0000")
        );
    }

    #[test]
    fn test_corrupt_collection_fails_soft() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_snapshot(&populated().to_snapshot()).unwrap();
        db.conn()
            .execute(
                "UPDATE collections SET json = '{not json' WHERE name = 'users'",
                [],
            )
            .unwrap();

        assert!(db.load_snapshot().is_err());
        assert_eq!(db.load_store(), EntityStore::new());
    }

    #[test]
    fn test_empty_database_loads_empty_store() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_store(), EntityStore::new());
    }

    #[test]
    fn test_clear_snapshot_removes_rows() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_snapshot(&populated().to_snapshot()).unwrap();
        db.clear_snapshot().unwrap();
        assert_eq!(db.load_store(), EntityStore::new());
    }
}
