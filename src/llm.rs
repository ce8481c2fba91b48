//! Client for the hosted LLM completion API (OpenAI-compatible).
//!
//! The model choice and prompt content live with the callers; this module
//! only knows how to send a chat completion and map failures to the
//! human-readable detail strings surfaced to users.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize, Debug, Clone)]
pub struct CompletionMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Either plain text or a list of vision parts (text + image data URL).
#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug, Clone)]
pub struct ImageUrl {
    pub url: String,
}

impl CompletionMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LlmError {
    /// API key missing or rejected by the provider.
    Auth,
    /// Provider rate limit or quota exhausted.
    RateLimited,
    /// Content blocked by the provider's safety filters.
    Blocked,
    /// Could not reach the service at all.
    Unreachable,
    /// The provider answered but the reply was unusable.
    BadResponse(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Auth => {
                write!(f, "AI service API key is invalid or missing.")
            }
            LlmError::RateLimited => write!(
                f,
                "AI service rate limit reached. Please wait a moment and try again."
            ),
            LlmError::Blocked => write!(
                f,
                "Image was blocked by AI safety filters. Try a clearer screenshot."
            ),
            LlmError::Unreachable => {
                write!(f, "Cannot reach AI service. Check your internet connection.")
            }
            LlmError::BadResponse(_) => {
                write!(f, "AI returned an unreadable response. Try a clearer image.")
            }
        }
    }
}

impl std::error::Error for LlmError {}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    api_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            api_url,
        }
    }

    /// Run one chat completion and return the assistant's text.
    pub async fn chat(
        &self,
        model: &str,
        messages: Vec<CompletionMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                tracing::error!("LLM request failed: {}", err);
                if err.is_connect() || err.is_timeout() {
                    LlmError::Unreachable
                } else {
                    LlmError::BadResponse(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!("LLM responded {}: {}", status, detail);
            return Err(match status.as_u16() {
                401 | 403 => LlmError::Auth,
                429 => LlmError::RateLimited,
                _ if detail.contains("content_filter") || detail.contains("SAFETY") => {
                    LlmError::Blocked
                }
                _ => LlmError::BadResponse(detail),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| LlmError::BadResponse(err.to_string()))?;

        let text = payload
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LlmError::BadResponse("empty completion".to_string()))?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_serializes_plain_text() {
        let message = CompletionMessage::user("hello");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn message_content_serializes_vision_parts() {
        let message = CompletionMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "extract".to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,AAAA".to_string(),
                    },
                },
            ]),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }
}
