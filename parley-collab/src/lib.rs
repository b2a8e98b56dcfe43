mod auth;
mod db;
mod messages;

pub mod ai;
pub mod rooms;

use std::sync::Arc;

use log::warn;
use thiserror::Error;

pub use ai::{should_reply, AiError, AiGateway, AiResponder, HistoryEntry, HistoryRole, ResponderError};
pub use auth::*;
// The one-parameter `db::Result` alias stays internal to the store layer;
// re-exporting it here would shadow the prelude `Result` for this module.
pub use db::{
    AiSender, Database, DatabaseError, DatabaseResult, MemoryDatabase, MessageData, NewMessage,
    NewRoom, NewUser, PrimaryKey, RoomCategory, RoomData, RoomId, UserData, UserRole, AI_SENDER,
};
pub use messages::*;
pub use rooms::{RoomError, RoomManager};

/// The parley collab system: identity, rooms, messages, mentions, and the
/// AI participant, over a document store and a responder implementation.
pub struct Collab<Db, R> {
    pub database: Arc<Db>,
    pub responder: Arc<R>,

    pub auth: Auth<Db>,
    pub rooms: RoomManager<Db, R>,
    pub messages: MessageManager<Db, R>,
    pub gateway: AiGateway<Db, R>,
}

/// A type passed to the components of the collab system to access the
/// store and the responder.
pub struct CollabContext<Db, R> {
    pub database: Arc<Db>,
    pub responder: Arc<R>,
}

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("Operation requires a role or membership the user doesn't have")]
    PermissionDenied,
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// The result of submitting a message to a room
#[derive(Debug)]
pub struct SendOutcome {
    /// The user's own message, always appended
    pub message: MessageData,
    /// The AI turn, if one was triggered and succeeded
    pub ai_reply: Option<MessageData>,
    /// The AI failure, if a turn was triggered and failed. The user's
    /// message is unaffected.
    pub ai_error: Option<AiError>,
}

/// A room opened for display: the room, its ordered history, and any
/// unread mention acknowledged.
#[derive(Debug)]
pub struct RoomView {
    pub room: RoomData,
    pub messages: Vec<MessageData>,
}

impl<Db, R> Collab<Db, R>
where
    Db: Database,
    R: AiResponder,
{
    pub fn new(database: Db, responder: R) -> Self {
        let database = Arc::new(database);
        let responder = Arc::new(responder);

        let context = CollabContext {
            database: database.clone(),
            responder: responder.clone(),
        };

        Self {
            auth: Auth::new(&database),
            rooms: RoomManager::new(&context),
            messages: MessageManager::new(&context),
            gateway: AiGateway::new(&context),
            database,
            responder,
        }
    }

    /// Submits a message to a room on behalf of a user.
    ///
    /// Appends the message, notifies mentioned users, then runs an AI turn
    /// when the trigger condition holds. A failed AI turn is reported in
    /// the outcome and never disturbs the already-appended message.
    pub async fn send_message(
        &self,
        sender: &UserData,
        room_id: RoomId,
        content: &str,
        ai_mode: bool,
    ) -> Result<SendOutcome, CollabError> {
        let room = self.rooms.room_for_user(sender, room_id).await?;

        let message = self
            .messages
            .append(&room, sender.id, &sender.username, content, false)
            .await?;

        let mut outcome = SendOutcome {
            message,
            ai_reply: None,
            ai_error: None,
        };

        if should_reply(content, ai_mode) {
            match self.gateway.reply(sender, &room, &outcome.message).await {
                Ok(reply) => outcome.ai_reply = Some(reply),
                Err(e) => {
                    warn!("AI turn failed in room {}: {e}", room.title);
                    outcome.ai_error = Some(e);
                }
            }
        }

        Ok(outcome)
    }

    /// Opens a room for a user: enforces access, acknowledges any unread
    /// mention, and returns the ordered history.
    pub async fn open_room(&self, user: &UserData, room_id: RoomId) -> Result<RoomView, CollabError> {
        let room = self.rooms.room_for_user(user, room_id).await?;

        self.auth.clear_unread(user.id, room.id).await?;
        let messages = self.messages.list(&room).await?;

        Ok(RoomView { room, messages })
    }

    /// Sets the system-wide fallback API key. Admin only.
    pub async fn set_system_api_key(
        &self,
        caller: &UserData,
        key: &str,
    ) -> Result<(), CollabError> {
        if !caller.is_admin() {
            return Err(CollabError::PermissionDenied);
        }

        self.database.set_system_api_key(key).await?;
        Ok(())
    }

    /// Promotes a user to admin. Admin only.
    pub async fn promote_user(
        &self,
        caller: &UserData,
        user_id: PrimaryKey,
    ) -> Result<UserData, CollabError> {
        if !caller.is_admin() {
            return Err(CollabError::PermissionDenied);
        }

        Ok(self.auth.promote(user_id).await?)
    }

    /// Deletes a user account. Admin only.
    pub async fn delete_user(
        &self,
        caller: &UserData,
        user_id: PrimaryKey,
    ) -> Result<(), CollabError> {
        if !caller.is_admin() {
            return Err(CollabError::PermissionDenied);
        }

        Ok(self.auth.delete_user(user_id).await?)
    }
}

impl<Db, R> Clone for CollabContext<Db, R> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            responder: self.responder.clone(),
        }
    }
}
