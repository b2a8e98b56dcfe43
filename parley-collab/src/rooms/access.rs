//! The permission rules, in one place.
//!
//! Shared categories are open to every authenticated user. Private rooms
//! are visible to the creator and listed participants only; the creator's
//! access is derived from `creator_id` at every check, so removing the
//! creator from the participant set never locks them out. Admins get no
//! read/write bypass on private rooms, only the manage bypass used for
//! administrative deletion.

use crate::{RoomData, UserData};

pub fn can_read(user: &UserData, room: &RoomData) -> bool {
    if room.category.is_shared() {
        return true;
    }

    room.creator_id == user.id || room.participants.contains(&user.id)
}

pub fn can_write(user: &UserData, room: &RoomData) -> bool {
    can_read(user, room)
}

/// Whether the user may manage the room: participant changes and deletion.
pub fn can_manage(user: &UserData, room: &RoomData) -> bool {
    if room.category.is_shared() {
        return user.is_admin();
    }

    room.creator_id == user.id || user.is_admin()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{RoomCategory, UserRole};

    fn user(id: u32, role: UserRole) -> UserData {
        UserData {
            id,
            username: format!("user{id}"),
            password_hash: "digest".to_string(),
            role,
            personal_api_key: None,
            unread_mentions: vec![],
        }
    }

    fn room(creator_id: u32, category: RoomCategory, participants: Vec<u32>) -> RoomData {
        RoomData {
            id: 100,
            creator_id,
            category,
            title: "room".to_string(),
            created_at: None,
            participants,
        }
    }

    #[test]
    fn test_private_room_is_creator_or_participant_only() {
        let creator = user(1, UserRole::User);
        let member = user(2, UserRole::User);
        let outsider = user(3, UserRole::User);

        let private = room(creator.id, RoomCategory::Private, vec![member.id]);

        assert!(can_read(&creator, &private));
        assert!(can_read(&member, &private));
        assert!(!can_read(&outsider, &private));
        assert!(can_write(&member, &private));
        assert!(!can_write(&outsider, &private));
    }

    #[test]
    fn test_admin_has_no_read_bypass_on_private_rooms() {
        let admin = user(9, UserRole::Admin);
        let private = room(1, RoomCategory::Private, vec![]);

        assert!(!can_read(&admin, &private));
        assert!(can_manage(&admin, &private));
    }

    #[test]
    fn test_shared_rooms_are_open_to_everyone() {
        let outsider = user(3, UserRole::User);

        for category in [RoomCategory::Study, RoomCategory::Fun] {
            let shared = room(1, category, vec![]);
            assert!(can_read(&outsider, &shared));
            assert!(can_write(&outsider, &shared));
            assert!(!can_manage(&outsider, &shared));
        }
    }

    #[test]
    fn test_creator_keeps_access_without_participant_entry() {
        let creator = user(1, UserRole::User);
        let private = room(creator.id, RoomCategory::Private, vec![]);

        assert!(can_read(&creator, &private));
        assert!(can_manage(&creator, &private));
    }
}
