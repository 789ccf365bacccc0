use crate::adapters::openrouter::{OpenRouterSettings, DEFAULT_ENDPOINT};
use crate::core::export::{ExportFormat, ExportOptions};
use crate::core::normalize::CsvDialect;
use crate::domain::model::{
    InferenceParams, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
};
use crate::utils::error::{Result, VisionEtlError};
use crate::utils::validation::{self, Validate};
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_PROMPT: &str =
    "Extract all structured data from this document image and return it as JSON only.";

#[derive(Debug, Clone, Parser)]
#[command(name = "vision-etl")]
#[command(about = "Send a batch of document images to a vision model and export the extracted data")]
pub struct CliConfig {
    /// Image files or directories of images, processed in the given order
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Instruction sent with every image
    #[arg(long)]
    pub prompt: Option<String>,

    /// Read the instruction from a file instead
    #[arg(long, conflicts_with = "prompt")]
    pub prompt_file: Option<String>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f64,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = DEFAULT_TOP_P)]
    pub top_p: f64,

    /// Send images through a running vision-server instead of calling the provider
    #[arg(long, env = "VISION_SERVER_URL")]
    pub server_url: Option<String>,

    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub provider_endpoint: String,

    /// Per-request timeout; the HTTP client default applies when unset
    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "json,csv")]
    pub formats: Vec<String>,

    /// Escape embedded quotes in the CSV export (RFC 4180)
    #[arg(long)]
    pub csv_escape: bool,

    /// Bundle the exported files into a zip archive
    #[arg(long)]
    pub archive: bool,

    /// Print results without writing export files
    #[arg(long)]
    pub no_export: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn params(&self) -> InferenceParams {
        InferenceParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    pub fn resolve_prompt(&self) -> Result<String> {
        match (&self.prompt, &self.prompt_file) {
            (Some(prompt), _) => Ok(prompt.clone()),
            (None, Some(path)) => Ok(std::fs::read_to_string(path)?.trim().to_string()),
            (None, None) => Ok(DEFAULT_PROMPT.to_string()),
        }
    }

    pub fn export_formats(&self) -> Result<Vec<ExportFormat>> {
        self.formats
            .iter()
            .map(|name| {
                ExportFormat::parse(name).ok_or_else(|| VisionEtlError::InvalidConfigValueError {
                    field: "formats".to_string(),
                    value: name.clone(),
                    reason: "Unsupported format. Valid formats: json, csv".to_string(),
                })
            })
            .collect()
    }

    pub fn export_options(&self) -> Result<ExportOptions> {
        Ok(ExportOptions {
            formats: self.export_formats()?,
            csv_dialect: if self.csv_escape {
                CsvDialect::Rfc4180
            } else {
                CsvDialect::Raw
            },
            archive: self.archive,
        })
    }

    pub fn openrouter_settings(&self) -> Result<OpenRouterSettings> {
        let api_key = validation::validate_required_field("api_key", &self.api_key)?;
        let mut settings = OpenRouterSettings::new(api_key.clone());
        settings.endpoint = self.provider_endpoint.clone();
        settings.timeout = self.timeout();
        Ok(settings)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match &self.server_url {
            Some(url) => validation::validate_url("server_url", url)?,
            None => {
                validation::validate_url("provider_endpoint", &self.provider_endpoint)?;
                let key = validation::validate_required_field("api_key", &self.api_key)?;
                validation::validate_non_empty_string("api_key", key)?;
            }
        }
        validation::validate_non_empty_string("model", &self.model)?;
        validation::validate_range("temperature", self.temperature, 0.0, 1.0)?;
        validation::validate_range("top_p", self.top_p, 0.0, 1.0)?;
        validation::validate_positive_number("max_tokens", u64::from(self.max_tokens), 1)?;
        if let Some(timeout) = self.timeout_seconds {
            validation::validate_positive_number("timeout_seconds", timeout, 1)?;
        }
        if let Some(path) = &self.prompt_file {
            validation::validate_path("prompt_file", path)?;
        }
        validation::validate_path("output_path", &self.output_path)?;
        self.export_formats()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["vision-etl"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["scans/", "--api-key", "sk-test"]);
        assert_eq!(config.params(), InferenceParams::default());
        assert_eq!(config.formats, vec!["json", "csv"]);
        assert_eq!(config.resolve_prompt().unwrap(), DEFAULT_PROMPT);
        assert!(config.timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_proxy_mode_needs_no_api_key() {
        let config = parse(&[
            "a.png",
            "--server-url",
            "http://localhost:3000",
            "--api-key",
            "",
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_direct_mode_rejects_blank_api_key() {
        let config = parse(&["a.png", "--api-key", "  "]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sampling_flags_must_stay_in_unit_range() {
        let config = parse(&["a.png", "--api-key", "sk", "--temperature", "1.5"]);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            VisionEtlError::InvalidConfigValueError { ref field, .. } if field == "temperature"
        ));

        let config = parse(&["a.png", "--api-key", "sk", "--top-p=-0.1"]);
        assert!(config.validate().is_err());

        let config = parse(&["a.png", "--api-key", "sk", "--temperature", "0", "--top-p", "1"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_export_options() {
        let config = parse(&[
            "a.png",
            "--api-key",
            "k",
            "--formats",
            "csv",
            "--csv-escape",
            "--archive",
        ]);
        let options = config.export_options().unwrap();
        assert_eq!(options.formats, vec![ExportFormat::Csv]);
        assert_eq!(options.csv_dialect, CsvDialect::Rfc4180);
        assert!(options.archive);

        let config = parse(&["a.png", "--api-key", "k", "--formats", "xml"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_openrouter_settings_carry_timeout() {
        let config = parse(&["a.png", "--api-key", "k", "--timeout-seconds", "30"]);
        let settings = config.openrouter_settings().unwrap();
        assert_eq!(settings.api_key, "k");
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
    }
}
