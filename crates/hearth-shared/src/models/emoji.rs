use serde::{Deserialize, Serialize};

use crate::types::{EmojiId, ServerId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EmojiParent {
    Server { id: ServerId },
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    #[serde(rename = "_id")]
    pub id: EmojiId,
    pub parent: EmojiParent,
    pub creator_id: UserId,
    pub name: String,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub nsfw: bool,
}

impl Emoji {
    pub fn server(&self) -> Option<&ServerId> {
        match &self.parent {
            EmojiParent::Server { id } => Some(id),
            EmojiParent::Detached => None,
        }
    }
}
