//! Local filesystem storage for product images.

use std::path::{Path, PathBuf};

use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file exceeds the maximum allowed size of {0} bytes")]
    TooLarge(usize),

    #[error("file not found")]
    NotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores files under a base directory, enforcing a size cap.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// concurrent reader never observes a half-written image.
pub struct Local {
    base_path: PathBuf,
    max_file_size: usize,
}

impl Local {
    pub fn new(base_path: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            base_path: base_path.into(),
            max_file_size,
        }
    }

    /// Saves `contents` under the given relative path.
    pub async fn save(&self, path: &str, contents: &[u8]) -> Result<(), StorageError> {
        if contents.len() > self.max_file_size {
            return Err(StorageError::TooLarge(self.max_file_size));
        }

        let full_path = self.full_path(path);
        if let Some(dir) = full_path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let temp_path = full_path.with_extension("tmp");
        fs::write(&temp_path, contents).await?;
        fs::rename(&temp_path, &full_path).await?;

        Ok(())
    }

    /// Reads the file stored under the given relative path.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.full_path(path)).await {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

/// Guesses the content type from the file extension. Unknown extensions are
/// served as opaque bytes.
pub fn content_type_for(filename: &str) -> &'static str {
    match Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}
