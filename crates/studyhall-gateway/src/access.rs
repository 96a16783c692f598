use studyhall_types::models::Room;

use crate::auth::Identity;
use crate::error::ChatError;

/// Room authorization shared by every handler that reads or writes a chat room.
pub trait RoomAccess {
    fn can_access(&self, room: &Room) -> bool;

    fn authorize(&self, room: &Room) -> Result<(), ChatError> {
        if self.can_access(room) {
            Ok(())
        } else {
            Err(ChatError::RoomForbidden)
        }
    }

    /// Parse a client-supplied room name and authorize it. Unknown names are
    /// reported as forbidden so a client cannot tell which rooms exist.
    fn authorize_raw(&self, raw: &str) -> Result<Room, ChatError> {
        let room: Room = raw.parse().map_err(|_| ChatError::RoomForbidden)?;
        self.authorize(&room)?;
        Ok(room)
    }
}

/// A user may use `general` and the room of their own profile semester.
/// Private user rooms are never chat rooms.
impl RoomAccess for Identity {
    fn can_access(&self, room: &Room) -> bool {
        match room {
            Room::General => true,
            Room::Semester(s) => *s == self.semester,
            Room::User(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyhall_types::models::{Role, Semester};
    use uuid::Uuid;

    fn student(semester: u8) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            name: "ana".into(),
            semester: Semester::new(semester).unwrap(),
            role: Role::Student,
            profile_picture: None,
        }
    }

    #[test]
    fn only_general_and_own_semester() {
        for s in Semester::MIN..=Semester::MAX {
            let user = student(s);
            assert!(user.authorize(&Room::General).is_ok());
            for t in Semester::MIN..=Semester::MAX {
                let room = Room::Semester(Semester::new(t).unwrap());
                assert_eq!(user.can_access(&room), s == t, "user in {} -> room {}", s, room);
            }
        }
    }

    #[test]
    fn admins_get_no_extra_rooms() {
        let admin = Identity {
            role: Role::Admin,
            ..student(2)
        };
        assert!(admin.authorize_raw("semester-5").is_err());
        assert!(admin.authorize_raw("2").is_ok());
    }

    #[test]
    fn private_and_unknown_rooms_are_forbidden() {
        let user = student(3);
        assert!(matches!(
            user.authorize(&user.private_room()),
            Err(ChatError::RoomForbidden)
        ));
        assert!(matches!(user.authorize_raw("lounge"), Err(ChatError::RoomForbidden)));
        assert_eq!(user.authorize_raw("3").unwrap(), user.semester_room());
    }
}
