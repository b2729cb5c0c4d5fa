// src/uploads.rs

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
/// Public path prefix under which stored images are served.
pub const UPLOAD_PREFIX: &str = "/uploads/";

#[derive(Debug, thiserror::Error)]
pub enum ImageStoreError {
    #[error("file type not allowed: {0}")]
    NotAllowed(String),
    #[error("empty file")]
    Empty,
    #[error("no such image")]
    Missing,
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where submission images live. References handed out are public paths.
pub trait ImageStore: Send + Sync {
    fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, ImageStoreError>;
    fn remove(&self, reference: &str) -> Result<(), ImageStoreError>;
    fn load(&self, file_name: &str) -> Result<Vec<u8>, ImageStoreError>;
}

/// Lower-cased extension if it is one we accept.
pub fn allowed_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn content_type_for(file_name: &str) -> &'static str {
    match allowed_extension(file_name).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Content-addressed files in one local directory.
pub struct DiskImageStore {
    dir: PathBuf,
}

impl DiskImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ImageStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Only bare `<hex>.<ext>` names map to a file; anything path-like is refused.
    fn path_for(&self, file_name: &str) -> Result<PathBuf, ImageStoreError> {
        let plain = !file_name.is_empty()
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.')
            && !file_name.starts_with('.');
        if !plain || allowed_extension(file_name).is_none() {
            return Err(ImageStoreError::Missing);
        }
        Ok(self.dir.join(file_name))
    }
}

impl ImageStore for DiskImageStore {
    fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, ImageStoreError> {
        let ext = allowed_extension(original_name)
            .ok_or_else(|| ImageStoreError::NotAllowed(original_name.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageStoreError::Empty);
        }

        let hash = format!("{:x}", Sha256::digest(bytes));
        let file_name = format!("{hash}.{ext}");
        let path = self.dir.join(&file_name);
        if !path.exists() {
            fs::write(&path, bytes)?;
        }

        tracing::debug!(file = %file_name, bytes = bytes.len(), "image stored");
        Ok(format!("{UPLOAD_PREFIX}{file_name}"))
    }

    fn remove(&self, reference: &str) -> Result<(), ImageStoreError> {
        let name = reference.strip_prefix(UPLOAD_PREFIX).unwrap_or(reference);
        let path = self.path_for(name)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self, file_name: &str) -> Result<Vec<u8>, ImageStoreError> {
        let path = self.path_for(file_name)?;
        match fs::read(path) {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ImageStoreError::Missing),
            Err(e) => Err(e.into()),
        }
    }
}
