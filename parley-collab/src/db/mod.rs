use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The backing store is unreachable or failed internally.
    /// Dependent operations halt and surface this as retryable.
    #[error(transparent)]
    Unavailable(Box<dyn std::error::Error + Send + Sync>),
    /// A record already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The record kind in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A record in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can store and fetch parley records.
///
/// This is the contract a schemaless document store has to satisfy: every
/// operation targets a single record, set-valued fields (`participants`,
/// `unread_mentions`) support atomic idempotent add/remove, and timestamps
/// are assigned by the store on write. No transactions are assumed.
#[async_trait]
pub trait Database: Send + Sync {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    /// Exact, case-sensitive username lookup.
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    async fn list_users(&self) -> Result<Vec<UserData>>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    /// Sets or clears the user's personal API key. An empty key clears it.
    async fn update_user_key(&self, user_id: PrimaryKey, key: &str) -> Result<UserData>;
    async fn promote_user(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn delete_user(&self, user_id: PrimaryKey) -> Result<()>;

    async fn add_unread_mention(&self, user_id: PrimaryKey, room_id: RoomId) -> Result<()>;
    async fn remove_unread_mention(&self, user_id: PrimaryKey, room_id: RoomId) -> Result<()>;
    async fn unread_mentions(&self, user_id: PrimaryKey) -> Result<Vec<RoomId>>;

    async fn system_api_key(&self) -> Result<Option<String>>;
    async fn set_system_api_key(&self, key: &str) -> Result<()>;

    async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData>;
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    async fn rooms_by_category(&self, category: RoomCategory) -> Result<Vec<RoomData>>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    /// Deletes the room and every message in it.
    async fn delete_room(&self, room_id: RoomId) -> Result<()>;
    async fn add_participant(&self, room_id: RoomId, user_id: PrimaryKey) -> Result<RoomData>;
    async fn remove_participant(&self, room_id: RoomId, user_id: PrimaryKey) -> Result<RoomData>;

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData>;
    async fn message_by_id(&self, message_id: PrimaryKey) -> Result<MessageData>;
    /// Messages of a room in no particular order. Callers sort.
    async fn messages_by_room(&self, room_id: RoomId) -> Result<Vec<MessageData>>;
    async fn set_message_importance(
        &self,
        message_id: PrimaryKey,
        important: bool,
    ) -> Result<MessageData>;
    /// Every message flagged important, across all rooms and unfiltered.
    /// Access filtering happens in the core, not here.
    async fn important_messages(&self) -> Result<Vec<MessageData>>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    /// Already digested, never plaintext
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(Debug)]
pub struct NewRoom {
    /// The creator of the new room
    pub creator_id: PrimaryKey,
    pub category: RoomCategory,
    pub title: String,
}

#[derive(Debug)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub sender_id: PrimaryKey,
    pub sender_name: String,
    pub content: String,
    pub is_ai: bool,
}
