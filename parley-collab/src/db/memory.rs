use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::Result;
use crate::{
    Database, DatabaseError, DatabaseResult, MessageData, NewMessage, NewRoom, NewUser, PrimaryKey,
    RoomCategory, RoomData, RoomId, UserData, UserRole, AI_SENDER,
};

const GLOBAL_API_KEY_SETTING: &str = "global_api_key";

/// An in-memory document store implementation for parley.
///
/// Used by the bootstrap binary and tests. Mirrors the semantics a hosted
/// document store provides: per-record mutation, idempotent set add/remove
/// on array fields, and store-assigned timestamps.
pub struct MemoryDatabase {
    inner: RwLock<Inner>,
}

struct Inner {
    next_id: PrimaryKey,
    users: HashMap<PrimaryKey, UserData>,
    rooms: HashMap<RoomId, RoomData>,
    messages: HashMap<PrimaryKey, MessageData>,
    settings: HashMap<String, String>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                // Keys start above the reserved AI sender id
                next_id: AI_SENDER.id + 1,
                users: HashMap::new(),
                rooms: HashMap::new(),
                messages: HashMap::new(),
                settings: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn assign_id(&mut self) -> PrimaryKey {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn not_found(resource: &'static str, identifier: &'static str) -> DatabaseError {
    DatabaseError::NotFound {
        resource,
        identifier,
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.inner
            .read()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| not_found("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.inner
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| not_found("user", "username"))
    }

    async fn list_users(&self) -> Result<Vec<UserData>> {
        let mut users: Vec<_> = self.inner.read().users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        // Uniqueness check and insert share the write lock, so two
        // concurrent registrations can't both pass the check
        let mut inner = self.inner.write();

        inner
            .users
            .values()
            .find(|u| u.username == new_user.username)
            .map(|_| ())
            .ok_or_else(|| not_found("user", "username"))
            .conflict_or_ok("user", "username", &new_user.username)?;

        let user = UserData {
            id: inner.assign_id(),
            username: new_user.username,
            password_hash: new_user.password_hash,
            role: new_user.role,
            personal_api_key: None,
            unread_mentions: vec![],
        };

        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user_key(&self, user_id: PrimaryKey, key: &str) -> Result<UserData> {
        let mut inner = self.inner.write();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("user", "id"))?;

        user.personal_api_key = if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        };

        Ok(user.clone())
    }

    async fn promote_user(&self, user_id: PrimaryKey) -> Result<UserData> {
        let mut inner = self.inner.write();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("user", "id"))?;

        user.role = UserRole::Admin;
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: PrimaryKey) -> Result<()> {
        self.inner
            .write()
            .users
            .remove(&user_id)
            .map(|_| ())
            .ok_or_else(|| not_found("user", "id"))
    }

    async fn add_unread_mention(&self, user_id: PrimaryKey, room_id: RoomId) -> Result<()> {
        let mut inner = self.inner.write();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("user", "id"))?;

        if !user.unread_mentions.contains(&room_id) {
            user.unread_mentions.push(room_id);
        }

        Ok(())
    }

    async fn remove_unread_mention(&self, user_id: PrimaryKey, room_id: RoomId) -> Result<()> {
        let mut inner = self.inner.write();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("user", "id"))?;

        user.unread_mentions.retain(|id| *id != room_id);
        Ok(())
    }

    async fn unread_mentions(&self, user_id: PrimaryKey) -> Result<Vec<RoomId>> {
        self.user_by_id(user_id).await.map(|u| u.unread_mentions)
    }

    async fn system_api_key(&self) -> Result<Option<String>> {
        Ok(self
            .inner
            .read()
            .settings
            .get(GLOBAL_API_KEY_SETTING)
            .filter(|key| !key.is_empty())
            .cloned())
    }

    async fn set_system_api_key(&self, key: &str) -> Result<()> {
        self.inner
            .write()
            .settings
            .insert(GLOBAL_API_KEY_SETTING.to_string(), key.to_string());

        Ok(())
    }

    async fn room_by_id(&self, room_id: RoomId) -> Result<RoomData> {
        self.inner
            .read()
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or_else(|| not_found("room", "id"))
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        Ok(self.inner.read().rooms.values().cloned().collect())
    }

    async fn rooms_by_category(&self, category: RoomCategory) -> Result<Vec<RoomData>> {
        Ok(self
            .inner
            .read()
            .rooms
            .values()
            .filter(|r| r.category == category)
            .cloned()
            .collect())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        // Ensure the creator exists
        let _ = self.user_by_id(new_room.creator_id).await?;

        let mut inner = self.inner.write();
        let room = RoomData {
            id: inner.assign_id(),
            creator_id: new_room.creator_id,
            category: new_room.category,
            title: new_room.title,
            created_at: Some(Utc::now()),
            participants: vec![],
        };

        inner.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<()> {
        let mut inner = self.inner.write();

        inner
            .rooms
            .remove(&room_id)
            .ok_or_else(|| not_found("room", "id"))?;

        inner.messages.retain(|_, m| m.room_id != room_id);
        Ok(())
    }

    async fn add_participant(&self, room_id: RoomId, user_id: PrimaryKey) -> Result<RoomData> {
        let mut inner = self.inner.write();
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| not_found("room", "id"))?;

        if !room.participants.contains(&user_id) {
            room.participants.push(user_id);
        }

        Ok(room.clone())
    }

    async fn remove_participant(&self, room_id: RoomId, user_id: PrimaryKey) -> Result<RoomData> {
        let mut inner = self.inner.write();
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| not_found("room", "id"))?;

        room.participants.retain(|id| *id != user_id);
        Ok(room.clone())
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        // Ensure the room exists so messages can't dangle
        let _ = self.room_by_id(new_message.room_id).await?;

        let mut inner = self.inner.write();
        let message = MessageData {
            id: inner.assign_id(),
            room_id: new_message.room_id,
            sender_id: new_message.sender_id,
            sender_name: new_message.sender_name,
            content: new_message.content,
            is_ai: new_message.is_ai,
            is_important: false,
            timestamp: Some(Utc::now()),
        };

        inner.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn message_by_id(&self, message_id: PrimaryKey) -> Result<MessageData> {
        self.inner
            .read()
            .messages
            .get(&message_id)
            .cloned()
            .ok_or_else(|| not_found("message", "id"))
    }

    async fn messages_by_room(&self, room_id: RoomId) -> Result<Vec<MessageData>> {
        Ok(self
            .inner
            .read()
            .messages
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn set_message_importance(
        &self,
        message_id: PrimaryKey,
        important: bool,
    ) -> Result<MessageData> {
        let mut inner = self.inner.write();
        let message = inner
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| not_found("message", "id"))?;

        message.is_important = important;
        Ok(message.clone())
    }

    async fn important_messages(&self) -> Result<Vec<MessageData>> {
        Ok(self
            .inner
            .read()
            .messages
            .values()
            .filter(|m| m.is_important)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "digest".to_string(),
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let db = MemoryDatabase::new();

        db.create_user(new_user("alice")).await.unwrap();
        let result = db.create_user(new_user("alice")).await;

        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_registrations_create_one_account() {
        use std::sync::Arc;

        for i in 0..100 {
            let db = Arc::new(MemoryDatabase::new());
            let username = format!("user-{i}");

            let first = tokio::spawn({
                let db = db.clone();
                let user = new_user(&username);
                async move { db.create_user(user).await }
            });
            let second = tokio::spawn({
                let db = db.clone();
                let user = new_user(&username);
                async move { db.create_user(user).await }
            });

            let (first, second) = (first.await.unwrap(), second.await.unwrap());
            assert!(first.is_ok() ^ second.is_ok());

            let matching = db
                .list_users()
                .await
                .unwrap()
                .into_iter()
                .filter(|u| u.username == username)
                .count();
            assert_eq!(matching, 1);
        }
    }

    #[tokio::test]
    async fn test_ids_never_collide_with_ai_sender() {
        let db = MemoryDatabase::new();

        let user = db.create_user(new_user("alice")).await.unwrap();
        assert_ne!(user.id, AI_SENDER.id);
    }

    #[tokio::test]
    async fn test_participant_set_semantics() {
        let db = MemoryDatabase::new();

        let alice = db.create_user(new_user("alice")).await.unwrap();
        let bob = db.create_user(new_user("bob")).await.unwrap();
        let room = db
            .create_room(NewRoom {
                creator_id: alice.id,
                category: RoomCategory::Private,
                title: "Math".to_string(),
            })
            .await
            .unwrap();

        db.add_participant(room.id, bob.id).await.unwrap();
        let room = db.add_participant(room.id, bob.id).await.unwrap();
        assert_eq!(room.participants, vec![bob.id]);

        db.remove_participant(room.id, bob.id).await.unwrap();
        let room = db.remove_participant(room.id, bob.id).await.unwrap();
        assert!(room.participants.is_empty());
    }

    #[tokio::test]
    async fn test_unread_mention_set_semantics() {
        let db = MemoryDatabase::new();

        let alice = db.create_user(new_user("alice")).await.unwrap();
        db.add_unread_mention(alice.id, 7).await.unwrap();
        db.add_unread_mention(alice.id, 7).await.unwrap();

        assert_eq!(db.unread_mentions(alice.id).await.unwrap(), vec![7]);

        db.remove_unread_mention(alice.id, 7).await.unwrap();
        db.remove_unread_mention(alice.id, 7).await.unwrap();

        assert!(db.unread_mentions(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_a_room_removes_its_messages() {
        let db = MemoryDatabase::new();

        let alice = db.create_user(new_user("alice")).await.unwrap();
        let room = db
            .create_room(NewRoom {
                creator_id: alice.id,
                category: RoomCategory::Study,
                title: "Physics".to_string(),
            })
            .await
            .unwrap();

        let message = db
            .create_message(NewMessage {
                room_id: room.id,
                sender_id: alice.id,
                sender_name: alice.username.clone(),
                content: "hello".to_string(),
                is_ai: false,
            })
            .await
            .unwrap();

        db.delete_room(room.id).await.unwrap();

        assert!(db.message_by_id(message.id).await.is_err());
        assert!(db.messages_by_room(room.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_system_key_reads_as_absent() {
        let db = MemoryDatabase::new();

        assert_eq!(db.system_api_key().await.unwrap(), None);

        db.set_system_api_key("").await.unwrap();
        assert_eq!(db.system_api_key().await.unwrap(), None);

        db.set_system_api_key("key-123").await.unwrap();
        assert_eq!(
            db.system_api_key().await.unwrap(),
            Some("key-123".to_string())
        );
    }
}
