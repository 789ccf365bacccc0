use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionEtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("No input images found: {message}")]
    EmptyInputError { message: String },

    #[error("Cannot read input '{path}': {message}")]
    InputReadError { path: String, message: String },

    #[error("Export failed: {message}")]
    ExportError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl VisionEtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigValidationError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::HttpError(_) => ErrorCategory::Network,
            Self::EmptyInputError { .. } | Self::InputReadError { .. } => ErrorCategory::Input,
            Self::ZipError(_)
            | Self::CsvError(_)
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::ExportError { .. } => ErrorCategory::Output,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Output => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the command-line flags or the TOML configuration file"
            }
            ErrorCategory::Network => "Check network connectivity and the provider endpoint",
            ErrorCategory::Input => "Pass at least one readable image file or directory",
            ErrorCategory::Output => "Check that the output directory exists and is writable",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingConfigError { field } => format!("Missing setting: {}", field),
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            Self::EmptyInputError { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Failure of a single inference call. Recorded on the file's result,
/// never propagated past the batch loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("No image file provided")]
    MissingImage,

    #[error("{0}")]
    Transport(String),

    #[error("{message}")]
    Provider { status: u16, message: String },

    #[error("{0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, VisionEtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_messages_are_bare() {
        assert_eq!(InferenceError::MissingImage.to_string(), "No image file provided");
        assert_eq!(InferenceError::Transport("timeout".into()).to_string(), "timeout");
        let provider = InferenceError::Provider {
            status: 429,
            message: "Rate limit exceeded".into(),
        };
        assert_eq!(provider.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn test_severity_follows_category() {
        let err = VisionEtlError::MissingConfigError {
            field: "api_key".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.user_friendly_message(), "Missing setting: api_key");

        let err = VisionEtlError::EmptyInputError {
            message: "nothing to do".into(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_input_read_error_points_at_inputs() {
        let err = VisionEtlError::InputReadError {
            path: "scans/".into(),
            message: "Permission denied".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.to_string(), "Cannot read input 'scans/': Permission denied");
        assert_eq!(
            err.recovery_suggestion(),
            "Pass at least one readable image file or directory"
        );
    }
}
