use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use thiserror::Error;
use tokio::time::timeout;

use crate::{
    CollabContext, Database, DatabaseError, MessageData, MessageManager, RoomData, UserData,
    AI_SENDER,
};

/// Represents a type that can produce an AI completion for a conversation.
/// Treated as an opaque, possibly slow, possibly failing remote call.
#[async_trait]
pub trait AiResponder: Send + Sync {
    /// Produces a completion for `prompt`, given the prior conversation.
    /// A single blocking call, no streaming of partial tokens.
    async fn respond(
        &self,
        prompt: &str,
        history: &[HistoryEntry],
        api_key: &str,
    ) -> Result<String, ResponderError>;
}

/// The literal token that summons the AI participant, matched
/// case-insensitively anywhere in a message.
pub const TRIGGER_MENTION: &str = "@gemini";

#[derive(Debug, Error)]
pub enum AiError {
    /// Neither a personal nor a system-wide key is configured
    #[error("No API key found. Please add one in settings.")]
    MissingApiKey,
    /// The external responder call failed. The room is left untouched.
    #[error(transparent)]
    Gateway(ResponderError),
    #[error(transparent)]
    Db(DatabaseError),
}

/// Errors from an external responder implementation
#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("Request to responder failed: {0}")]
    Request(String),
    #[error("Responder returned a malformed response: {0}")]
    Malformed(String),
    #[error("Responder did not reply in time")]
    TimedOut,
}

/// One turn of a linear conversation, as handed to a responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRole {
    User,
    Assistant,
}

/// Whether a user-submitted message should trigger an AI turn.
/// Never evaluated for AI-authored messages, so the AI can't summon itself.
pub fn should_reply(content: &str, ai_mode: bool) -> bool {
    ai_mode || content.to_lowercase().contains(TRIGGER_MENTION)
}

/// Decides when the AI participant takes a turn, assembles its context,
/// and appends its reply under the reserved identity.
pub struct AiGateway<Db, R> {
    context: CollabContext<Db, R>,
    messages: MessageManager<Db, R>,
}

impl<Db, R> AiGateway<Db, R>
where
    Db: Database,
    R: AiResponder,
{
    /// Upper bound on a single responder call. A timeout counts as a
    /// gateway failure like any other responder error.
    const RESPONDER_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(context: &CollabContext<Db, R>) -> Self {
        Self {
            context: context.clone(),
            messages: MessageManager::new(context),
        }
    }

    /// Runs one AI turn for a just-appended message.
    ///
    /// The room history is re-read fresh, so concurrent triggers in the
    /// same room each see a complete context. Calls are deliberately not
    /// serialized per room. On any failure nothing is appended.
    pub async fn reply(
        &self,
        sender: &UserData,
        room: &RoomData,
        prompt_message: &MessageData,
    ) -> Result<MessageData, AiError> {
        let api_key = self.resolve_key(sender).await?;

        let history: Vec<_> = self
            .messages
            .list(room)
            .await
            .map_err(AiError::Db)?
            .into_iter()
            .filter(|m| m.id != prompt_message.id)
            .map(|m| HistoryEntry {
                role: if m.is_ai {
                    HistoryRole::Assistant
                } else {
                    HistoryRole::User
                },
                text: m.content,
            })
            .collect();

        let call = self
            .context
            .responder
            .respond(&prompt_message.content, &history, &api_key);

        let text = match timeout(Self::RESPONDER_TIMEOUT, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("AI responder failed in room {}: {e}", room.title);
                return Err(AiError::Gateway(e));
            }
            Err(_) => {
                warn!("AI responder timed out in room {}", room.title);
                return Err(AiError::Gateway(ResponderError::TimedOut));
            }
        };

        let reply = self
            .messages
            .append(room, AI_SENDER.id, AI_SENDER.name, &text, true)
            .await
            .map_err(AiError::Db)?;

        info!("{} replied in room {}", AI_SENDER.name, room.title);
        Ok(reply)
    }

    /// The sender's personal key wins; the system-wide key is the fallback.
    async fn resolve_key(&self, sender: &UserData) -> Result<String, AiError> {
        if let Some(key) = sender
            .personal_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
        {
            return Ok(key.clone());
        }

        self.context
            .database
            .system_api_key()
            .await
            .map_err(AiError::Db)?
            .ok_or(AiError::MissingApiKey)
    }
}

#[cfg(test)]
pub mod test_util {
    use super::*;
    use parking_lot::Mutex;

    /// A responder that must never be called
    pub struct SilentResponder;

    #[async_trait]
    impl AiResponder for SilentResponder {
        async fn respond(
            &self,
            _prompt: &str,
            _history: &[HistoryEntry],
            _api_key: &str,
        ) -> Result<String, ResponderError> {
            panic!("responder was invoked unexpectedly");
        }
    }

    /// A scripted responder that records what it was asked
    pub struct ScriptedResponder {
        reply: Result<String, String>,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub prompt: String,
        pub history: Vec<HistoryEntry>,
        pub api_key: String,
    }

    impl ScriptedResponder {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(vec![]),
            }
        }

        pub fn failing(error: &str) -> Self {
            Self {
                reply: Err(error.to_string()),
                calls: Mutex::new(vec![]),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl AiResponder for ScriptedResponder {
        async fn respond(
            &self,
            prompt: &str,
            history: &[HistoryEntry],
            api_key: &str,
        ) -> Result<String, ResponderError> {
            self.calls.lock().push(RecordedCall {
                prompt: prompt.to_string(),
                history: history.to_vec(),
                api_key: api_key.to_string(),
            });

            self.reply
                .clone()
                .map_err(ResponderError::Request)
        }
    }
}
