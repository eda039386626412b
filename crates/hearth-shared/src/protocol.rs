//! Real-time gateway protocol: JSON envelopes tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::{
    Channel, ChannelField, ChannelPatch, Embed, Emoji, Member, MemberField, MemberPatch,
    Message, MessageField, MessagePatch, RelationshipStatus, RoleField, RolePatch, Server,
    ServerField, ServerPatch, User, UserField, UserPatch, Webhook, WebhookField, WebhookPatch,
};
use crate::types::{
    ChannelId, EmojiId, MemberId, MessageId, RoleId, ServerId, UserId, WebhookId,
};

/// Initial snapshot sent once per connection after authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadyPayload {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub emojis: Vec<Emoji>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppendMessage {
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

/// Every event the gateway can deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // Control
    Error {
        error: String,
    },
    Authenticated,
    InvalidSession,
    Logout,
    /// Children stay undecoded so one bad child cannot take the rest down.
    Bulk {
        v: Vec<serde_json::Value>,
    },
    Pong {
        #[serde(default)]
        data: serde_json::Value,
    },
    Ready(ReadyPayload),

    // Messages
    Message(Message),
    MessageUpdate {
        id: MessageId,
        channel: ChannelId,
        #[serde(default)]
        data: MessagePatch,
        #[serde(default)]
        clear: Vec<MessageField>,
    },
    MessageAppend {
        id: MessageId,
        channel: ChannelId,
        append: AppendMessage,
    },
    MessageDelete {
        id: MessageId,
        channel: ChannelId,
    },
    BulkMessageDelete {
        channel: ChannelId,
        ids: Vec<MessageId>,
    },
    MessageReact {
        id: MessageId,
        channel_id: ChannelId,
        user_id: UserId,
        emoji_id: EmojiId,
    },
    MessageUnreact {
        id: MessageId,
        channel_id: ChannelId,
        user_id: UserId,
        emoji_id: EmojiId,
    },
    MessageRemoveReaction {
        id: MessageId,
        channel_id: ChannelId,
        emoji_id: EmojiId,
    },

    // Channels
    ChannelCreate(Channel),
    ChannelUpdate {
        id: ChannelId,
        #[serde(default)]
        data: ChannelPatch,
        #[serde(default)]
        clear: Vec<ChannelField>,
    },
    ChannelDelete {
        id: ChannelId,
    },
    ChannelGroupJoin {
        id: ChannelId,
        user: UserId,
    },
    ChannelGroupLeave {
        id: ChannelId,
        user: UserId,
    },
    ChannelStartTyping {
        id: ChannelId,
        user: UserId,
    },
    ChannelStopTyping {
        id: ChannelId,
        user: UserId,
    },
    ChannelAck {
        id: ChannelId,
        user: UserId,
        message_id: MessageId,
    },

    // Servers
    ServerCreate {
        id: ServerId,
        server: Server,
        #[serde(default)]
        channels: Vec<Channel>,
        #[serde(default)]
        emojis: Vec<Emoji>,
    },
    ServerUpdate {
        id: ServerId,
        #[serde(default)]
        data: ServerPatch,
        #[serde(default)]
        clear: Vec<ServerField>,
    },
    ServerDelete {
        id: ServerId,
    },
    ServerMemberUpdate {
        id: MemberId,
        #[serde(default)]
        data: MemberPatch,
        #[serde(default)]
        clear: Vec<MemberField>,
    },
    ServerMemberJoin {
        id: ServerId,
        user: UserId,
        #[serde(default)]
        member: Option<Member>,
    },
    ServerMemberLeave {
        id: ServerId,
        user: UserId,
    },
    ServerRoleUpdate {
        id: ServerId,
        role_id: RoleId,
        #[serde(default)]
        data: RolePatch,
        #[serde(default)]
        clear: Vec<RoleField>,
    },
    ServerRoleDelete {
        id: ServerId,
        role_id: RoleId,
    },

    // Users
    UserUpdate {
        id: UserId,
        #[serde(default)]
        data: UserPatch,
        #[serde(default)]
        clear: Vec<UserField>,
    },
    UserRelationship {
        id: UserId,
        user: User,
        #[serde(default)]
        status: Option<RelationshipStatus>,
    },
    UserPlatformWipe {
        user_id: UserId,
        #[serde(default)]
        flags: u32,
    },

    // Emojis and webhooks
    EmojiCreate(Emoji),
    EmojiDelete {
        id: EmojiId,
    },
    WebhookCreate(Webhook),
    WebhookUpdate {
        id: WebhookId,
        #[serde(default)]
        data: WebhookPatch,
        #[serde(default)]
        remove: Vec<WebhookField>,
    },
    WebhookDelete {
        id: WebhookId,
    },
}

impl ServerEvent {
    /// Decode one gateway frame.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedEvent)
    }

    /// Decode one already-parsed event, e.g. a `Bulk` child.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProtocolError> {
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        if value.get("type").and_then(|t| t.as_str()).is_none() {
            return Err(ProtocolError::MissingType);
        }
        serde_json::from_value(value).map_err(ProtocolError::MalformedEvent)
    }
}

/// Messages the client sends over the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Authenticate { token: String },
    BeginTyping { channel: ChannelId },
    EndTyping { channel: ChannelId },
    Ping { data: u64 },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authenticate_wire_shape() {
        let msg = ClientMessage::Authenticate {
            token: "secret".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "Authenticate", "token": "secret"}));
    }

    #[test]
    fn test_decode_message_event() {
        let raw = json!({
            "type": "Message",
            "_id": "01HMSG0000000000000000000A",
            "channel": "01HCHAN000000000000000000A",
            "author": "01HUSER000000000000000000A",
            "content": "hi",
            "nonce": "01HNONCE00000000000000000A"
        })
        .to_string();
        match ServerEvent::from_json(&raw).unwrap() {
            ServerEvent::Message(m) => {
                assert_eq!(m.content.as_deref(), Some("hi"));
                assert_eq!(m.nonce.as_deref(), Some("01HNONCE00000000000000000A"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_decode_channel_create_keeps_variant() {
        let raw = json!({
            "type": "ChannelCreate",
            "channel_type": "TextChannel",
            "_id": "c1",
            "server": "s1",
            "name": "general"
        })
        .to_string();
        match ServerEvent::from_json(&raw).unwrap() {
            ServerEvent::ChannelCreate(Channel::TextChannel(c)) => {
                assert_eq!(c.server, ServerId::from("s1"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_decode_update_with_clear() {
        let raw = json!({
            "type": "MessageUpdate",
            "id": "m1",
            "channel": "c1",
            "data": {"content": "edited"},
            "clear": ["Pinned"]
        })
        .to_string();
        match ServerEvent::from_json(&raw).unwrap() {
            ServerEvent::MessageUpdate { data, clear, .. } => {
                assert_eq!(data.content.as_deref(), Some("edited"));
                assert_eq!(clear, vec![MessageField::Pinned]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let err = ServerEvent::from_json(r#"{"type":"Teleport"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedEvent(_)));
    }

    #[test]
    fn test_bulk_children_decode_independently() {
        let raw = json!({
            "type": "Bulk",
            "v": [
                {"type": "ChannelDelete", "id": "c1"},
                {"type": "ChannelDelete"},
                "garbage",
                {"type": "ServerDelete", "id": "s1"}
            ]
        })
        .to_string();
        let ServerEvent::Bulk { v } = ServerEvent::from_json(&raw).unwrap() else {
            panic!("expected bulk");
        };
        let decoded: Vec<_> = v.into_iter().map(ServerEvent::from_value).collect();
        assert!(decoded[0].is_ok());
        assert!(decoded[1].is_err());
        assert!(matches!(decoded[2], Err(ProtocolError::NotAnObject)));
        assert!(decoded[3].is_ok());
    }

    #[test]
    fn test_ready_defaults_missing_lists() {
        let ready = ServerEvent::from_json(r#"{"type":"Ready","users":[]}"#).unwrap();
        assert_eq!(ready, ServerEvent::Ready(ReadyPayload::default()));
    }
}
