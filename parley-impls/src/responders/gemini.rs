use async_trait::async_trait;
use log::debug;
use parley_collab::{AiResponder, HistoryEntry, HistoryRole, ResponderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-flash-latest";

/// An [AiResponder] backed by the Gemini generateContent REST API
pub struct GeminiResponder {
    client: Client,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

impl GeminiResponder {
    pub fn new() -> Self {
        Self::with_model(DEFAULT_MODEL)
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            client: Client::new(),
            model: model.to_string(),
        }
    }

    fn to_content(entry: &HistoryEntry) -> Content {
        let role = match entry.role {
            HistoryRole::User => "user",
            // The API calls the assistant side "model"
            HistoryRole::Assistant => "model",
        };

        Content {
            role: role.to_string(),
            parts: vec![Part {
                text: entry.text.clone(),
            }],
        }
    }
}

impl Default for GeminiResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiResponder for GeminiResponder {
    async fn respond(
        &self,
        prompt: &str,
        history: &[HistoryEntry],
        api_key: &str,
    ) -> Result<String, ResponderError> {
        let mut contents: Vec<_> = history.iter().map(Self::to_content).collect();
        contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        });

        let url = format!(
            "{API_BASE}/models/{}:generateContent?key={api_key}",
            self.model
        );

        debug!(
            "Requesting completion from {} with {} history entries",
            self.model,
            history.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest { contents })
            .send()
            .await
            .map_err(|e| ResponderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResponderError::Request(format!("{status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ResponderError::Malformed(e.to_string()))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ResponderError::Malformed("no candidates returned".to_string()))?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(ResponderError::Malformed(
                "candidate contained no text".to_string(),
            ));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_history_maps_to_api_roles() {
        let user_turn = GeminiResponder::to_content(&HistoryEntry {
            role: HistoryRole::User,
            text: "hello".to_string(),
        });
        let ai_turn = GeminiResponder::to_content(&HistoryEntry {
            role: HistoryRole::Assistant,
            text: "hi".to_string(),
        });

        assert_eq!(user_turn.role, "user");
        assert_eq!(ai_turn.role, "model");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{
                "candidates": [
                    {"content": {"role": "model", "parts": [{"text": "The answer "}, {"text": "is 42."}]}}
                ]
            }"#,
        )
        .unwrap();

        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.clone())
            .collect();

        assert_eq!(text, "The answer is 42.");
    }
}
