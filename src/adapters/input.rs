use crate::domain::model::FileInput;
use crate::utils::error::{Result, VisionEtlError};
use crate::utils::validation::is_image_file;
use std::path::{Path, PathBuf};

fn read_error(path: &Path, err: std::io::Error) -> VisionEtlError {
    VisionEtlError::InputReadError {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Expands `inputs` into files: explicit files keep their position, each
/// directory contributes its image files sorted by name (not recursive).
/// Paths that cannot be inspected are kept as files; reading them fails later.
pub async fn collect_paths(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        let path = Path::new(input);
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        if is_dir {
            let mut entries = tokio::fs::read_dir(path)
                .await
                .map_err(|e| read_error(path, e))?;
            let mut images = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(|e| read_error(path, e))? {
                let entry_path = entry.path();
                let is_file = entry
                    .file_type()
                    .await
                    .map_err(|e| read_error(&entry_path, e))?
                    .is_file();
                if is_file && is_image_file(&entry_path) {
                    images.push(entry_path);
                }
            }
            images.sort();
            tracing::debug!("{}: {} image(s)", path.display(), images.len());
            paths.extend(images);
        } else {
            if !is_image_file(path) {
                tracing::warn!("{} does not look like an image, sending it anyway", path.display());
            }
            paths.push(path.to_path_buf());
        }
    }
    Ok(paths)
}

fn describe(path: &Path) -> (String, String) {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let content_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
    (filename, content_type)
}

pub async fn read_input(path: &Path) -> Result<FileInput> {
    let data = tokio::fs::read(path).await.map_err(|e| read_error(path, e))?;
    let (filename, content_type) = describe(path);
    Ok(FileInput::new(filename, content_type, data))
}

/// Loads every input image in batch order. A file that cannot be read stays
/// in the batch without content, so it is recorded as a failure for that
/// file alone. Fails only when no paths are found at all.
pub async fn load_inputs(inputs: &[String]) -> Result<Vec<FileInput>> {
    let paths = collect_paths(inputs).await?;
    if paths.is_empty() {
        return Err(VisionEtlError::EmptyInputError {
            message: format!("No image files found in: {}", inputs.join(", ")),
        });
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        match read_input(path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                tracing::warn!("{}", e);
                let (filename, content_type) = describe(path);
                files.push(FileInput::new(filename, content_type, Vec::new()));
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, data: &[u8]) -> String {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_directory_images_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.jpg", b"b");
        write(dir.path(), "a.png", b"a");
        write(dir.path(), "notes.txt", b"x");
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = load_inputs(&[dir.path().to_str().unwrap().to_string()])
            .await
            .unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
        assert_eq!(files[0].content_type, "image/png");
        assert_eq!(files[1].content_type, "image/jpeg");
        assert_eq!(files[1].data, b"b");
    }

    #[tokio::test]
    async fn test_explicit_files_keep_argument_order() {
        let dir = TempDir::new().unwrap();
        let second = write(dir.path(), "z.webp", b"z");
        let first = write(dir.path(), "y.gif", b"y");

        let files = load_inputs(&[second, first]).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["z.webp", "y.gif"]);
    }

    #[tokio::test]
    async fn test_empty_directory_is_input_error() {
        let dir = TempDir::new().unwrap();
        let err = load_inputs(&[dir.path().to_str().unwrap().to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, VisionEtlError::EmptyInputError { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_kept_without_content() {
        let dir = TempDir::new().unwrap();
        let ok = write(dir.path(), "ok.png", b"png");
        let missing = dir.path().join("missing.png").to_str().unwrap().to_string();

        let files = load_inputs(&[ok, missing.clone()]).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "ok.png");
        assert!(!files[0].is_empty());
        assert_eq!(files[1].filename, "missing.png");
        assert_eq!(files[1].content_type, "image/png");
        assert!(files[1].is_empty());

        let err = read_input(Path::new(&missing)).await.unwrap_err();
        assert!(matches!(err, VisionEtlError::InputReadError { .. }));
        assert_eq!(err.category(), crate::utils::error::ErrorCategory::Input);
    }
}
