use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type used for primary keys in the document store.
pub type PrimaryKey = u32;

/// Alias for keys referring to room records.
pub type RoomId = PrimaryKey;

/// The reserved identity AI replies are authored with.
///
/// Id 0 is never assigned to a real user by any store implementation,
/// so messages from the AI participant are always distinguishable.
pub struct AiSender {
    pub id: PrimaryKey,
    pub name: &'static str,
}

pub const AI_SENDER: AiSender = AiSender {
    id: 0,
    name: "Gemini",
};

/// The role of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

/// A parley account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
    pub personal_api_key: Option<String>,
    /// Rooms containing a mention this user hasn't acknowledged yet.
    /// Set semantics: a room id appears at most once.
    pub unread_mentions: Vec<RoomId>,
}

impl UserData {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// The visibility partition a room belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomCategory {
    Private,
    Study,
    Fun,
}

impl RoomCategory {
    /// Shared categories are readable and writable by every authenticated user.
    pub fn is_shared(&self) -> bool {
        !matches!(self, RoomCategory::Private)
    }
}

/// A parley chat room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomData {
    pub id: RoomId,
    #[serde(rename = "user_id")]
    pub creator_id: PrimaryKey,
    pub category: RoomCategory,
    pub title: String,
    /// Assigned by the store on write. `None` while the store hasn't
    /// materialized the timestamp yet.
    pub created_at: Option<DateTime<Utc>>,
    /// Users granted access to a private room. Ignored for shared
    /// categories. The creator has access regardless of this set.
    pub participants: Vec<PrimaryKey>,
}

/// A single message in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageData {
    pub id: PrimaryKey,
    #[serde(rename = "chat_id")]
    pub room_id: RoomId,
    pub sender_id: PrimaryKey,
    pub sender_name: String,
    pub content: String,
    pub is_ai: bool,
    /// The only field that may change after creation.
    pub is_important: bool,
    /// Assigned by the store on write, like [RoomData::created_at].
    pub timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod test {
    use super::*;

    // The on-disk field names must stay compatible with the documents the
    // original deployment wrote, so records can be read back from the same
    // store.
    #[test]
    fn test_record_field_names() {
        let room = RoomData {
            id: 4,
            creator_id: 2,
            category: RoomCategory::Private,
            title: "Math".to_string(),
            created_at: None,
            participants: vec![3],
        };

        let value = serde_json::to_value(&room).unwrap();
        assert_eq!(value["user_id"], 2);
        assert_eq!(value["category"], "Private");

        let message = MessageData {
            id: 9,
            room_id: 4,
            sender_id: AI_SENDER.id,
            sender_name: AI_SENDER.name.to_string(),
            content: "hello".to_string(),
            is_ai: true,
            is_important: false,
            timestamp: None,
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["chat_id"], 4);
        assert_eq!(value["sender_id"], 0);

        let user: UserData = serde_json::from_value(serde_json::json!({
            "id": 2,
            "username": "alice",
            "password_hash": "digest",
            "role": "admin",
            "personal_api_key": null,
            "unread_mentions": [4],
        }))
        .unwrap();

        assert_eq!(user.role, UserRole::Admin);
        assert_eq!(user.unread_mentions, vec![4]);
    }
}
