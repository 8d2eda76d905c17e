use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::config::{Config, SamplingConfig};
use crate::error::{CommunicationError, CompletionResult, ConfigurationError};
use crate::events::{Role, Turn};
use crate::prompts::{FALLBACK_REPLY, SYSTEM_INSTRUCTION};

/// Something that turns a transcript plus a new question into a reply.
///
/// Implementations keep no conversation state of their own; the whole
/// history travels with every call.
pub trait CompletionBackend: Send + Sync {
    fn complete<'a>(
        &'a self,
        prior_turns: &'a [Turn],
        new_user_text: &'a str,
    ) -> BoxFuture<'a, CompletionResult>;
}

/// Speaker tag of the Gemini wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
}

impl From<Role> for Speaker {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Speaker::User,
            Role::Assistant => Speaker::Model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Speaker>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn from_text(role: Speaker, text: &str) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl From<&SamplingConfig> for GenerationConfig {
    fn from(sampling: &SamplingConfig) -> Self {
        Self {
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            top_k: sampling.top_k,
        }
    }
}

/// Body of `models/{model}:generateContent`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined; `None` when there is none
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    sampling: SamplingConfig,
}

impl GeminiClient {
    /// Fails when no API key is configured, so a widget without credentials
    /// never becomes operational.
    pub fn new(config: &Config) -> Result<Self, ConfigurationError> {
        Self::with_key_lookup(config, |name| std::env::var(name).ok())
    }

    /// Like `new`, with the environment lookup for the API key supplied
    pub(crate) fn with_key_lookup<F>(config: &Config, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = config.resolve_api_key(lookup)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(ConfigurationError::HttpClient)?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            sampling: config.sampling.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Every prior turn in order, then the new question as the last user entry
    pub fn build_request(&self, prior_turns: &[Turn], new_user_text: &str) -> GenerateContentRequest {
        let mut contents: Vec<Content> = prior_turns
            .iter()
            .map(|turn| Content::from_text(turn.role().into(), turn.content()))
            .collect();
        contents.push(Content::from_text(Speaker::User, new_user_text));

        GenerateContentRequest {
            contents,
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(SYSTEM_INSTRUCTION.to_string()),
                }],
            },
            generation_config: GenerationConfig::from(&self.sampling),
        }
    }

    async fn generate(&self, request: &GenerateContentRequest) -> CompletionResult {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|error| {
                tracing::error!(model = %self.model, error = %error, "completion request failed to send");
                CommunicationError::generic()
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                model = %self.model,
                status = status.as_u16(),
                body = %body,
                "completion service returned an error status"
            );
            return Err(CommunicationError::generic());
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|error| {
            tracing::error!(model = %self.model, error = %error, "completion response could not be decoded");
            CommunicationError::generic()
        })?;

        Ok(reply_or_fallback(&payload))
    }
}

/// Successful responses without text degrade to a fixed apology
pub fn reply_or_fallback(payload: &GenerateContentResponse) -> String {
    payload.text().unwrap_or_else(|| {
        tracing::warn!("completion service returned no text, using fallback reply");
        FALLBACK_REPLY.to_string()
    })
}

impl CompletionBackend for GeminiClient {
    fn complete<'a>(
        &'a self,
        prior_turns: &'a [Turn],
        new_user_text: &'a str,
    ) -> BoxFuture<'a, CompletionResult> {
        Box::pin(async move {
            let request = self.build_request(prior_turns, new_user_text);
            tracing::debug!(
                model = %self.model,
                history_len = prior_turns.len(),
                "sending completion request"
            );
            self.generate(&request).await
        })
    }
}
