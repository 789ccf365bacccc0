use crate::domain::model::{FileInput, InferenceParams};
use crate::utils::error::{InferenceError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Destination for exported artifacts.
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Human-readable location of `path`, for log and console output.
    fn location(&self, path: &str) -> String;
}

/// One call to a hosted vision-language model.
///
/// A parse failure of the model's own text is not an error: implementations
/// return the repair payload instead. Only missing input, transport
/// problems and non-2xx responses surface as `InferenceError`.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn invoke(
        &self,
        image: Option<&FileInput>,
        prompt: &str,
        params: &InferenceParams,
    ) -> std::result::Result<Value, InferenceError>;

    fn name(&self) -> &str;
}
