use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

// Every entity id is a 26-character ULID carried as an opaque string. The
// derived `Ord` is plain string ordering, which for ULIDs is creation order.
macro_rules! entity_id {
    ($($(#[$attr:meta])* $name:ident;)*) => {
        $(
            $(#[$attr])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub String);

            impl $name {
                pub fn new(id: impl Into<String>) -> Self {
                    Self(id.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }

                /// Creation time encoded in the identifier, if it is a valid ULID.
                pub fn created_at(&self) -> Option<DateTime<Utc>> {
                    created_at(&self.0)
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(s: &str) -> Self {
                    Self(s.to_string())
                }
            }

            impl From<Ulid> for $name {
                fn from(u: Ulid) -> Self {
                    Self(u.to_string())
                }
            }
        )*
    };
}

entity_id! {
    /// Identifies a user account.
    UserId;
    /// Identifies a server (guild).
    ServerId;
    /// Identifies any channel variant, including DMs and saved messages.
    ChannelId;
    /// Identifies a message, or a locally generated nonce before confirmation.
    MessageId;
    /// Identifies a role within a server.
    RoleId;
    /// Identifies a custom emoji.
    EmojiId;
    /// Identifies a channel webhook.
    WebhookId;
}

/// Decode the millisecond timestamp at the front of a ULID string.
pub fn created_at(id: &str) -> Option<DateTime<Utc>> {
    let ulid = Ulid::from_string(id).ok()?;
    let millis = i64::try_from(ulid.timestamp_ms()).ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Composite key of a server member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId {
    pub server: ServerId,
    pub user: UserId,
}

/// Composite key of a per-user read marker on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnreadId {
    pub channel: ChannelId,
    pub user: UserId,
}

/// Process-wide monotonic ULID source for local nonces.
///
/// `ulid::Generator` increments the random part when two ids fall in the
/// same millisecond, so ids from one generator always sort in generation
/// order.
#[derive(Default)]
pub struct IdGenerator {
    inner: Mutex<Generator>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    pub fn next_ulid(&self) -> Ulid {
        let mut gen = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Overflow of the 80-bit random part within one millisecond is not
        // reachable in practice; fall back to a fresh id rather than fail.
        gen.generate().unwrap_or_else(|_| Ulid::new())
    }

    pub fn next_message_id(&self) -> MessageId {
        MessageId::from(self.next_ulid())
    }
}
