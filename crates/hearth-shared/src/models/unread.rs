use serde::{Deserialize, Serialize};

use crate::types::{MessageId, UnreadId};

/// Read position of one user in one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUnread {
    #[serde(rename = "_id")]
    pub id: UnreadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<MessageId>,
    #[serde(default)]
    pub mentions: Vec<MessageId>,
}

impl ChannelUnread {
    pub fn new(id: UnreadId) -> Self {
        Self {
            id,
            last_id: None,
            mentions: Vec::new(),
        }
    }

    /// Move the read position forward to `message`. Returns `false` and
    /// leaves the marker untouched if that would move it backwards.
    pub fn advance(&mut self, message: &MessageId) -> bool {
        if self.last_id.as_ref().is_some_and(|last| last > message) {
            return false;
        }
        self.last_id = Some(message.clone());
        self.mentions.retain(|m| m > message);
        true
    }

    /// Whether `message` sorts after the read position.
    pub fn is_unread(&self, message: &MessageId) -> bool {
        self.last_id.as_ref().map_or(true, |last| message > last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelId, UserId};

    fn unread() -> ChannelUnread {
        ChannelUnread::new(UnreadId {
            channel: ChannelId::from("c"),
            user: UserId::from("u"),
        })
    }

    #[test]
    fn test_advance_never_regresses() {
        let mut u = unread();
        assert!(u.advance(&MessageId::from("05")));
        assert!(!u.advance(&MessageId::from("03")));
        assert_eq!(u.last_id, Some(MessageId::from("05")));
    }

    #[test]
    fn test_advance_drops_covered_mentions() {
        let mut u = unread();
        u.mentions = vec![MessageId::from("02"), MessageId::from("04"), MessageId::from("07")];
        u.advance(&MessageId::from("04"));
        assert_eq!(u.mentions, vec![MessageId::from("07")]);
    }
}
