use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    fn location(&self, path: &str) -> String {
        Path::new(&self.base_path).join(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("exports");
        let storage = LocalStorage::new(base.to_str().unwrap());

        tokio_test::block_on(async {
            storage.write_file("run/results.csv", b"\"Image Name\"").await.unwrap();
            let data = tokio::fs::read(base.join("run/results.csv")).await.unwrap();
            assert_eq!(data, b"\"Image Name\"");
        });

        assert!(storage.location("run/results.csv").ends_with("results.csv"));
        assert!(base.join("run").is_dir());
    }
}
