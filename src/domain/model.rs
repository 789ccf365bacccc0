use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-lite-001";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TOP_P: f64 = 0.95;

/// One document image of a batch.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileInput {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Unparsed parameters as they arrive from a form or the command line.
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    pub model: Option<String>,
    pub temperature: Option<String>,
    pub max_tokens: Option<String>,
    pub top_p: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
        }
    }
}

fn parse_float(raw: Option<&str>, fallback: f64) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(fallback)
}

impl InferenceParams {
    /// Builds parameters from loose string inputs. Missing or unparsable
    /// numbers fall back to the defaults; nothing is clamped here.
    pub fn parse(raw: &RawParams) -> Self {
        let model = raw
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();

        let max_tokens = raw
            .max_tokens
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Self {
            model,
            temperature: parse_float(raw.temperature.as_deref(), DEFAULT_TEMPERATURE),
            max_tokens,
            top_p: parse_float(raw.top_p.as_deref(), DEFAULT_TOP_P),
        }
    }

    /// Temperature and top-p restricted to `[0, 1]`, as sent to the provider.
    pub fn clamped(&self) -> Self {
        Self {
            model: self.model.clone(),
            temperature: self.temperature.clamp(0.0, 1.0),
            max_tokens: self.max_tokens,
            top_p: self.top_p.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(message) => Some(message),
        }
    }
}

/// Loose success check carried over from the upload page: `null`, `false`,
/// `0` and `""` count as "no result"; arrays and objects always count, even
/// when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Outcome of one file of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub filename: String,
    pub model_id: String,
    pub outcome: Outcome,
    pub latency_seconds: f64,
}

impl Serialize for ResultRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("filename", &self.filename)?;
        map.serialize_entry("modelId", &self.model_id)?;
        match &self.outcome {
            Outcome::Success(value) => map.serialize_entry("result", value)?,
            Outcome::Failure(message) => map.serialize_entry("error", message)?,
        }
        map.serialize_entry("latencySeconds", &self.latency_seconds)?;
        map.end()
    }
}

impl ResultRecord {
    pub fn new(
        filename: impl Into<String>,
        model_id: impl Into<String>,
        outcome: Outcome,
        latency_seconds: f64,
    ) -> Self {
        Self {
            filename: filename.into(),
            model_id: model_id.into(),
            outcome,
            latency_seconds: latency_seconds.max(0.0),
        }
    }
}

/// Ordered results of one processing run, in input order. Records are
/// shared, so cloning a batch never copies payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    records: Vec<Arc<ResultRecord>>,
}

pub type Records<'a> =
    std::iter::Map<std::slice::Iter<'a, Arc<ResultRecord>>, fn(&Arc<ResultRecord>) -> &ResultRecord>;

fn unshare(record: &Arc<ResultRecord>) -> &ResultRecord {
    record
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` and returns the handle the batch now holds.
    pub(crate) fn push(&mut self, record: ResultRecord) -> Arc<ResultRecord> {
        let record = Arc::new(record);
        self.records.push(Arc::clone(&record));
        record
    }

    pub fn records(&self) -> &[Arc<ResultRecord>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> Records<'_> {
        self.records
            .iter()
            .map(unshare as fn(&Arc<ResultRecord>) -> &ResultRecord)
    }
}

impl Serialize for Batch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl From<Vec<ResultRecord>> for Batch {
    fn from(records: Vec<ResultRecord>) -> Self {
        Self {
            records: records.into_iter().map(Arc::new).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a ResultRecord;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
