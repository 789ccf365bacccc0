use crate::domain::model::{is_truthy, FileInput, InferenceParams};
use crate::domain::ports::VisionModel;
use crate::utils::error::{InferenceError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const PROCESS_IMAGE_PATH: &str = "/api/process-image";

/// Everything except an unparsable success body surfaces as a network error.
fn network_error(detail: impl std::fmt::Display) -> String {
    format!("Network error: {}", detail)
}

/// Calls a running `vision-server` instead of the provider, the same way the
/// upload page does.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    success: bool,
    result: Option<Value>,
    error: Option<String>,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, PROCESS_IMAGE_PATH)
    }

    fn form(image: &FileInput, prompt: &str, params: &InferenceParams) -> std::result::Result<Form, InferenceError> {
        let part = Part::bytes(image.data.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.content_type)
            .map_err(|e| InferenceError::Transport(network_error(e)))?;

        Ok(Form::new()
            .part("image", part)
            .text("prompt", prompt.to_string())
            .text("temperature", params.temperature.to_string())
            .text("model", params.model.clone())
            .text("max_tokens", params.max_tokens.to_string())
            .text("top_p", params.top_p.to_string()))
    }
}

#[async_trait]
impl VisionModel for ProxyClient {
    async fn invoke(
        &self,
        image: Option<&FileInput>,
        prompt: &str,
        params: &InferenceParams,
    ) -> std::result::Result<Value, InferenceError> {
        let image = image
            .filter(|img| !img.is_empty())
            .ok_or(InferenceError::MissingImage)?;

        tracing::debug!(file = %image.filename, "Posting image to {}", self.url());

        let response = self
            .client
            .post(self.url())
            .multipart(Self::form(image, prompt, params)?)
            .send()
            .await
            .map_err(|e| InferenceError::Transport(network_error(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(network_error(e)))?;
        let parsed = serde_json::from_str::<ProxyResponse>(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|p| p.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| {
                    format!(
                        "Server error: {} {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("")
                    )
                    .trim_end()
                    .to_string()
                });
            return Err(InferenceError::Provider {
                status: status.as_u16(),
                message: network_error(message),
            });
        }

        match parsed {
            Some(ProxyResponse {
                success: true,
                result: Some(result),
                ..
            }) if is_truthy(&result) => Ok(result),
            Some(_) => Err(InferenceError::InvalidResponse(network_error(
                "Invalid response from server",
            ))),
            None => Err(InferenceError::InvalidResponse(
                "Server returned an invalid response. Please check the server logs.".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "proxy"
    }
}
