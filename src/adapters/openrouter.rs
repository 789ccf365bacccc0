use crate::adapters::content::parse_model_content;
use crate::domain::model::{FileInput, InferenceParams};
use crate::domain::ports::VisionModel;
use crate::utils::error::{InferenceError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_REFERER: &str = "http://localhost:8000";
pub const DEFAULT_TITLE: &str = "Bulk Image Processor";

#[derive(Debug, Clone)]
pub struct OpenRouterSettings {
    pub endpoint: String,
    pub api_key: String,
    pub referer: String,
    pub title: String,
    /// Per-call timeout. `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
}

impl OpenRouterSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
            timeout: None,
        }
    }
}

/// Chat-completions client for OpenRouter-compatible providers.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    settings: OpenRouterSettings,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenRouterClient {
    pub fn new(settings: OpenRouterSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            settings,
        })
    }

    pub fn settings(&self) -> &OpenRouterSettings {
        &self.settings
    }

    fn data_uri(image: &FileInput) -> String {
        format!("data:{};base64,{}", image.content_type, STANDARD.encode(&image.data))
    }

    /// `error.message` from a provider error body, when there is one.
    fn provider_message(body: &str) -> Option<String> {
        let value: Value = serde_json::from_str(body).ok()?;
        value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl VisionModel for OpenRouterClient {
    async fn invoke(
        &self,
        image: Option<&FileInput>,
        prompt: &str,
        params: &InferenceParams,
    ) -> std::result::Result<Value, InferenceError> {
        let image = image
            .filter(|img| !img.is_empty())
            .ok_or(InferenceError::MissingImage)?;
        let params = params.clamped();

        let request = ChatRequest {
            model: &params.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: Self::data_uri(image),
                        },
                    },
                ],
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
        };

        tracing::debug!(
            model = %params.model,
            file = %image.filename,
            bytes = image.data.len(),
            "Sending chat completion request to {}",
            self.settings.endpoint
        );

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .header("HTTP-Referer", &self.settings.referer)
            .header("X-Title", &self.settings.title)
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = response.status();
        tracing::debug!("Provider response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = Self::provider_message(&body)
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
            tracing::error!(status = status.as_u16(), "Provider rejected request: {}", message);
            return Err(InferenceError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| "{}".to_string());

        Ok(parse_model_content(&content))
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
