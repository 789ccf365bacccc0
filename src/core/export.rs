use crate::core::normalize::{to_csv_with, to_json, CsvDialect};
use crate::domain::model::Batch;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const EXPORT_PREFIX: &str = "document-verification-results";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub formats: Vec<ExportFormat>,
    pub csv_dialect: CsvDialect,
    /// Also bundle every written file into one zip archive.
    pub archive: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            formats: vec![ExportFormat::Json, ExportFormat::Csv],
            csv_dialect: CsvDialect::Raw,
            archive: false,
        }
    }
}

/// `document-verification-results-2026-10-18T09-41-07`
pub fn export_stem(now: DateTime<Utc>) -> String {
    format!("{}-{}", EXPORT_PREFIX, now.format("%Y-%m-%dT%H-%M-%S"))
}

pub struct Exporter<S: Storage> {
    storage: S,
    options: ExportOptions,
}

impl<S: Storage> Exporter<S> {
    pub fn new(storage: S, options: ExportOptions) -> Self {
        Self { storage, options }
    }

    pub fn render(&self, batch: &Batch, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => to_json(batch),
            ExportFormat::Csv => to_csv_with(batch, self.options.csv_dialect),
        }
    }

    /// Writes the configured artifacts and returns their locations. An empty
    /// batch writes nothing.
    pub async fn export(&self, batch: &Batch, now: DateTime<Utc>) -> Result<Vec<String>> {
        if batch.is_empty() {
            tracing::warn!("Nothing to export: batch is empty");
            return Ok(Vec::new());
        }

        let stem = export_stem(now);
        let mut rendered = Vec::with_capacity(self.options.formats.len());
        for format in &self.options.formats {
            let name = format!("{}.{}", stem, format.extension());
            rendered.push((name, self.render(batch, *format)?));
        }

        let mut written = Vec::new();
        for (name, content) in &rendered {
            self.storage.write_file(name, content.as_bytes()).await?;
            tracing::debug!("Wrote {} ({} bytes)", name, content.len());
            written.push(self.storage.location(name));
        }

        if self.options.archive && !rendered.is_empty() {
            let name = format!("{}.zip", stem);
            let data = bundle(&rendered)?;
            tracing::debug!("Writing archive {} ({} bytes)", name, data.len());
            self.storage.write_file(&name, &data).await?;
            written.push(self.storage.location(&name));
        }

        Ok(written)
    }
}

fn bundle(files: &[(String, String)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in files {
        zip.start_file(name.as_str(), SimpleFileOptions::default())?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Outcome, ResultRecord};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn location(&self, path: &str) -> String {
            format!("mem://{}", path)
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 41, 7).unwrap()
    }

    fn batch() -> Batch {
        Batch::from(vec![
            ResultRecord::new("a.png", "m", Outcome::Success(json!({"name": "X"})), 1.0),
            ResultRecord::new("b.png", "m", Outcome::Failure("timeout".into()), 2.0),
        ])
    }

    #[test]
    fn test_export_stem_uses_iso_timestamp() {
        assert_eq!(
            export_stem(fixed_time()),
            "document-verification-results-2026-10-18T09-41-07"
        );
    }

    #[tokio::test]
    async fn test_export_writes_json_and_csv() {
        let storage = MockStorage::new();
        let exporter = Exporter::new(storage.clone(), ExportOptions::default());

        let written = exporter.export(&batch(), fixed_time()).await.unwrap();

        assert_eq!(
            written,
            vec![
                "mem://document-verification-results-2026-10-18T09-41-07.json".to_string(),
                "mem://document-verification-results-2026-10-18T09-41-07.csv".to_string(),
            ]
        );
        let csv = storage
            .get_file("document-verification-results-2026-10-18T09-41-07.csv")
            .await
            .unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert!(csv.starts_with("\"Image Name\",\"Model Name\",\"Latency (sec)\",\"name\",\"error\""));
    }

    #[tokio::test]
    async fn test_export_archive_bundles_written_files() {
        let storage = MockStorage::new();
        let options = ExportOptions {
            archive: true,
            ..ExportOptions::default()
        };
        let exporter = Exporter::new(storage.clone(), options);

        let written = exporter.export(&batch(), fixed_time()).await.unwrap();
        assert_eq!(written.len(), 3);

        let data = storage
            .get_file("document-verification-results-2026-10-18T09-41-07.zip")
            .await
            .unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "document-verification-results-2026-10-18T09-41-07.csv",
                "document-verification-results-2026-10-18T09-41-07.json",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let storage = MockStorage::new();
        let exporter = Exporter::new(storage.clone(), ExportOptions::default());
        let written = exporter.export(&Batch::new(), fixed_time()).await.unwrap();
        assert!(written.is_empty());
        assert!(storage.files.lock().await.is_empty());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExportFormat::parse("JSON"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::parse(" csv "), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse("tsv"), None);
    }
}
