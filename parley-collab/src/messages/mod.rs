pub mod mentions;

use chrono::{DateTime, Utc};
use log::info;

use crate::{
    rooms::access, AiResponder, CollabContext, Database, DatabaseError, MessageData, NewMessage,
    PrimaryKey, RoomData, UserData,
};

/// The append-only message log, plus importance curation
pub struct MessageManager<Db, R> {
    context: CollabContext<Db, R>,
}

impl<Db, R> MessageManager<Db, R>
where
    Db: Database,
    R: AiResponder,
{
    pub fn new(context: &CollabContext<Db, R>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Appends a message to a room and notifies mentioned users.
    ///
    /// Write permission is the caller's responsibility: the room passed in
    /// here has already been resolved through the access rules.
    pub async fn append(
        &self,
        room: &RoomData,
        sender_id: PrimaryKey,
        sender_name: &str,
        content: &str,
        is_ai: bool,
    ) -> Result<MessageData, DatabaseError> {
        let message = self
            .context
            .database
            .create_message(NewMessage {
                room_id: room.id,
                sender_id,
                sender_name: sender_name.to_string(),
                content: content.to_string(),
                is_ai,
            })
            .await?;

        mentions::notify_mentions(&*self.context.database, &message).await?;

        info!("{} sent a message in room {}", sender_name, room.title);
        Ok(message)
    }

    /// All messages of a room in chronological order.
    ///
    /// Messages whose timestamp the store hasn't materialized yet sort
    /// first instead of being dropped; ties break by creation order.
    pub async fn list(&self, room: &RoomData) -> Result<Vec<MessageData>, DatabaseError> {
        let mut messages = self.context.database.messages_by_room(room.id).await?;
        sort_chronological(&mut messages);

        Ok(messages)
    }

    /// Flips a message's importance flag, returning the new state.
    /// Deliberately unchecked: any room member may curate.
    pub async fn toggle_important(&self, message_id: PrimaryKey) -> Result<bool, DatabaseError> {
        let message = self.context.database.message_by_id(message_id).await?;

        let updated = self
            .context
            .database
            .set_message_importance(message.id, !message.is_important)
            .await?;

        Ok(updated.is_important)
    }

    /// Every important message in rooms the user may read, chronological.
    ///
    /// Messages in rooms that no longer exist are skipped.
    pub async fn important_for(&self, user: &UserData) -> Result<Vec<MessageData>, DatabaseError> {
        let mut visible = vec![];

        for message in self.context.database.important_messages().await? {
            let room = match self.context.database.room_by_id(message.room_id).await {
                Ok(room) => room,
                Err(DatabaseError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };

            if access::can_read(user, &room) {
                visible.push(message);
            }
        }

        sort_chronological(&mut visible);
        Ok(visible)
    }
}

fn sort_chronological(messages: &mut [MessageData]) {
    messages.sort_by_key(|m| (m.timestamp.unwrap_or(DateTime::<Utc>::MIN_UTC), m.id));
}
