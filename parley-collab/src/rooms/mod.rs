pub mod access;

use chrono::{DateTime, Utc};
use log::info;
use thiserror::Error;

use crate::{
    AiResponder, CollabContext, Database, DatabaseError, NewRoom, PrimaryKey, RoomCategory,
    RoomData, RoomId, UserData,
};

pub struct RoomManager<Db, R> {
    context: CollabContext<Db, R>,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("User does not have access to this room")]
    PermissionDenied,
    #[error(transparent)]
    Db(DatabaseError),
}

impl<Db, R> RoomManager<Db, R>
where
    Db: Database,
    R: AiResponder,
{
    pub fn new(context: &CollabContext<Db, R>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new room. Titles are not unique, only the id is authoritative.
    pub async fn create_room(
        &self,
        creator: &UserData,
        category: RoomCategory,
        title: &str,
    ) -> Result<RoomData, DatabaseError> {
        let room = self
            .context
            .database
            .create_room(NewRoom {
                creator_id: creator.id,
                category,
                title: title.to_string(),
            })
            .await?;

        info!(
            "User {} created {:?} room {}",
            creator.username, category, room.title
        );

        Ok(room)
    }

    /// Rooms in a category the user may see, newest first.
    ///
    /// The store can't express "creator OR participant" in one query, so
    /// this fetches the category superset and filters through the access
    /// rules in-process.
    pub async fn list_rooms(
        &self,
        user: &UserData,
        category: RoomCategory,
    ) -> Result<Vec<RoomData>, DatabaseError> {
        let mut rooms: Vec<_> = self
            .context
            .database
            .rooms_by_category(category)
            .await?
            .into_iter()
            .filter(|room| access::can_read(user, room))
            .collect();

        // Missing timestamps sort as minimum, which puts them last here
        rooms.sort_by_key(|room| std::cmp::Reverse(creation_time(room)));

        Ok(rooms)
    }

    /// Fetches a room, enforcing read access
    pub async fn room_for_user(
        &self,
        user: &UserData,
        room_id: RoomId,
    ) -> Result<RoomData, RoomError> {
        let room = self
            .context
            .database
            .room_by_id(room_id)
            .await
            .map_err(RoomError::Db)?;

        if !access::can_read(user, &room) {
            return Err(RoomError::PermissionDenied);
        }

        Ok(room)
    }

    /// Grants a user access to a private room. Idempotent.
    pub async fn add_participant(
        &self,
        caller: &UserData,
        room_id: RoomId,
        user_id: PrimaryKey,
    ) -> Result<RoomData, RoomError> {
        let room = self.managed_room(caller, room_id).await?;

        // The participant has to be a real account
        let user = self
            .context
            .database
            .user_by_id(user_id)
            .await
            .map_err(RoomError::Db)?;

        let room = self
            .context
            .database
            .add_participant(room.id, user.id)
            .await
            .map_err(RoomError::Db)?;

        info!("User {} was added to room {}", user.username, room.title);
        Ok(room)
    }

    /// Revokes a user's access to a private room. Removing a non-member is a no-op.
    pub async fn remove_participant(
        &self,
        caller: &UserData,
        room_id: RoomId,
        user_id: PrimaryKey,
    ) -> Result<RoomData, RoomError> {
        let room = self.managed_room(caller, room_id).await?;

        self.context
            .database
            .remove_participant(room.id, user_id)
            .await
            .map_err(RoomError::Db)
    }

    /// Deletes a room and its messages
    pub async fn delete_room(&self, caller: &UserData, room_id: RoomId) -> Result<(), RoomError> {
        let room = self.managed_room(caller, room_id).await?;

        self.context
            .database
            .delete_room(room.id)
            .await
            .map_err(RoomError::Db)?;

        info!("User {} deleted room {}", caller.username, room.title);
        Ok(())
    }

    async fn managed_room(
        &self,
        caller: &UserData,
        room_id: RoomId,
    ) -> Result<RoomData, RoomError> {
        let room = self
            .context
            .database
            .room_by_id(room_id)
            .await
            .map_err(RoomError::Db)?;

        if !access::can_manage(caller, &room) {
            return Err(RoomError::PermissionDenied);
        }

        Ok(room)
    }
}

fn creation_time(room: &RoomData) -> DateTime<Utc> {
    room.created_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
}
