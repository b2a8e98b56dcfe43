use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::{Database, DatabaseError, MessageData, PrimaryKey};

lazy_static! {
    static ref MENTION_REGEX: Regex = Regex::new(r"@(\w+)").expect("mention regex compiles");
}

/// Distinct `@username` tokens in a message, in order of first appearance
pub fn extract_mentions(content: &str) -> Vec<&str> {
    let mut seen = vec![];

    for capture in MENTION_REGEX.captures_iter(content) {
        let username = capture.get(1).expect("capture group exists").as_str();

        if !seen.contains(&username) {
            seen.push(username);
        }
    }

    seen
}

/// Marks the message's room unread for every mentioned user.
///
/// Usernames resolve exactly and case-sensitively. Tokens that don't match
/// an account are ignored, and the sender never notifies itself. Returns
/// the ids of the users that were notified.
pub async fn notify_mentions<Db>(
    db: &Db,
    message: &MessageData,
) -> Result<Vec<PrimaryKey>, DatabaseError>
where
    Db: Database,
{
    let mut notified = vec![];

    for username in extract_mentions(&message.content) {
        let user = match db.user_by_username(username).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound { .. }) => continue,
            Err(e) => return Err(e),
        };

        if user.id == message.sender_id {
            continue;
        }

        db.add_unread_mention(user.id, message.room_id).await?;
        debug!(
            "User {} has an unread mention in room {}",
            user.username, message.room_id
        );

        notified.push(user.id);
    }

    Ok(notified)
}
