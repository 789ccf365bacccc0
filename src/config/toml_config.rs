use crate::adapters::openrouter::{
    OpenRouterSettings, DEFAULT_ENDPOINT, DEFAULT_REFERER, DEFAULT_TITLE,
};
use crate::utils::error::{Result, VisionEtlError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 20;

/// Settings of the `vision-server` proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub provider: ProviderSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// Browser origins allowed to call the API. Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub max_upload_mb: u64,
    pub log_json: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            log_json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub referer: String,
    pub title: String,
    pub timeout_seconds: Option<u64>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
            timeout_seconds: None,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| VisionEtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are
    /// left in place so validation can report them.
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    /// `PORT` rebinds the listener on all interfaces; `OPENROUTER_API_KEY`
    /// fills in a key the file did not provide.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if port.trim().parse::<u16>().is_ok() {
                self.server.bind = format!("0.0.0.0:{}", port.trim());
            } else {
                tracing::warn!("Ignoring invalid PORT value '{}'", port);
            }
        }

        let key_missing = self
            .provider
            .api_key
            .as_deref()
            .map(|k| k.trim().is_empty() || k.starts_with("${"))
            .unwrap_or(true);
        if key_missing {
            if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
                self.provider.api_key = Some(key);
            }
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.server.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    pub fn openrouter_settings(&self) -> Result<OpenRouterSettings> {
        let api_key = validation::validate_required_field("provider.api_key", &self.provider.api_key)?;
        Ok(OpenRouterSettings {
            endpoint: self.provider.endpoint.clone(),
            api_key: api_key.clone(),
            referer: self.provider.referer.clone(),
            title: self.provider.title.clone(),
            timeout: self.provider.timeout_seconds.map(Duration::from_secs),
        })
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("server.bind", &self.server.bind)?;
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(VisionEtlError::InvalidConfigValueError {
                field: "server.bind".to_string(),
                value: self.server.bind.clone(),
                reason: "Expected a socket address such as 0.0.0.0:3000".to_string(),
            });
        }
        for origin in &self.server.allowed_origins {
            validation::validate_url("server.allowed_origins", origin)?;
        }
        validation::validate_positive_number("server.max_upload_mb", self.server.max_upload_mb, 1)?;

        validation::validate_url("provider.endpoint", &self.provider.endpoint)?;
        let api_key = validation::validate_required_field("provider.api_key", &self.provider.api_key)?;
        validation::validate_non_empty_string("provider.api_key", api_key)?;
        if api_key.starts_with("${") {
            return Err(VisionEtlError::InvalidConfigValueError {
                field: "provider.api_key".to_string(),
                value: api_key.clone(),
                reason: "Environment variable is not set".to_string(),
            });
        }
        if let Some(timeout) = self.provider.timeout_seconds {
            validation::validate_positive_number("provider.timeout_seconds", timeout, 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_file() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.server.allowed_origins.len(), 2);
        assert_eq!(config.provider.endpoint, DEFAULT_ENDPOINT);
        assert!(config.provider.api_key.is_none());
        assert_eq!(config.max_upload_bytes(), 20 * 1024 * 1024);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
bind = "127.0.0.1:8080"
allowed_origins = []
max_upload_mb = 5
log_json = true

[provider]
endpoint = "https://llm.internal/v1/chat/completions"
api_key = "sk-or-abc"
title = "Scanner"
timeout_seconds = 60
"#;
        let config = ServerConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.server.allowed_origins.is_empty());
        assert!(config.server.log_json);
        assert_eq!(config.provider.referer, DEFAULT_REFERER);
        assert!(config.validate().is_ok());

        let settings = config.openrouter_settings().unwrap();
        assert_eq!(settings.title, "Scanner");
        assert_eq!(settings.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("VISION_ETL_TEST_KEY", "sk-from-env");

        let config = ServerConfig::from_toml_str(
            r#"
[provider]
api_key = "${VISION_ETL_TEST_KEY}"
"#,
        )
        .unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-from-env"));

        std::env::remove_var("VISION_ETL_TEST_KEY");
    }

    #[test]
    fn test_unresolved_variable_fails_validation() {
        let config = ServerConfig::from_toml_str(
            r#"
[provider]
api_key = "${VISION_ETL_TEST_UNSET_VARIABLE}"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(VisionEtlError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_missing_key_and_bad_bind_fail_validation() {
        let config = ServerConfig::default();
        assert!(matches!(
            config.validate(),
            Err(VisionEtlError::MissingConfigError { .. })
        ));

        let mut config = ServerConfig::default();
        config.provider.api_key = Some("sk".to_string());
        config.server.bind = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nbind = \"127.0.0.1:9000\"\n")
            .unwrap();

        let config = ServerConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ServerConfig::from_toml_str("[server\nbind=").unwrap_err();
        assert!(matches!(err, VisionEtlError::ConfigValidationError { .. }));
    }
}
