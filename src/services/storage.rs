// services/storage.rs
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;

use crate::errors::{AppError, Result};

pub const MAX_PHOTO_BYTES: usize = 2 * 1024 * 1024;
pub const PHOTO_DIR: &str = "waste-photos";
pub const AVATAR_DIR: &str = "avatars";

/// Raw photo as received, before validation.
#[derive(Debug, Clone)]
pub enum PhotoSource {
    Upload(Bytes),
    Base64(String),
}

/// A decoded image that passed the type and size checks.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub bytes: Bytes,
    pub extension: &'static str,
}

#[derive(Debug, Clone)]
pub struct StorageService {
    root: PathBuf,
    public_base_url: String,
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [PHOTO_DIR, AVATAR_DIR] {
            tokio::fs::create_dir_all(self.root.join(dir)).await?;
        }
        Ok(())
    }

    pub fn decode(source: PhotoSource) -> Result<ImageFile> {
        let bytes = match source {
            PhotoSource::Upload(bytes) => bytes,
            PhotoSource::Base64(encoded) => Self::decode_base64(&encoded)?,
        };
        Self::validate_image(bytes)
    }

    /// Accepts bare base64 or a `data:image/...;base64,` URL.
    pub fn decode_base64(input: &str) -> Result<Bytes> {
        let payload = match input.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => input,
        };
        let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD
            .decode(cleaned.as_bytes())
            .map(Bytes::from)
            .map_err(|_| AppError::invalid_field("photo", "Invalid base64 string"))
    }

    pub fn validate_image(bytes: Bytes) -> Result<ImageFile> {
        if bytes.is_empty() {
            return Err(AppError::invalid_field("photo", "The photo field is required"));
        }
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(AppError::invalid_field("photo", "Photo may not be larger than 2 MB"));
        }

        let extension = match infer::get(&bytes).map(|kind| kind.mime_type()) {
            Some("image/jpeg") => "jpg",
            Some("image/png") => "png",
            _ => {
                return Err(AppError::invalid_field(
                    "photo",
                    "Photo must be an image (JPG, JPEG, PNG)",
                ))
            }
        };

        Ok(ImageFile { bytes, extension })
    }

    /// Writes the image under `dir` and returns its path relative to the storage root.
    pub async fn save_image(&self, dir: &str, image: &ImageFile) -> Result<String> {
        let relative = format!("{}/{}.{}", dir, uuid::Uuid::new_v4(), image.extension);
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &image.bytes).await?;
        tracing::debug!(path = %relative, size = image.bytes.len(), "image stored");
        Ok(relative)
    }

    /// Best-effort removal, used for rollback cleanup and replaced avatars.
    pub async fn delete(&self, relative: &str) {
        let path = self.root.join(relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!(path = %relative, "removed stored image"),
            Err(e) => tracing::warn!(path = %relative, error = %e, "failed to remove stored image"),
        }
    }

    pub fn url_for(&self, relative: &str) -> String {
        format!("{}/storage/{}", self.public_base_url, relative)
    }

    /// Maps a requested file name inside `dir` to a path on disk, refusing traversal.
    pub fn resolve(&self, dir: &str, file_name: &str) -> Option<PathBuf> {
        let sanitized = sanitize_filename::sanitize(file_name);
        if sanitized.is_empty() || sanitized != file_name || sanitized.starts_with('.') {
            return None;
        }
        Some(self.root.join(dir).join(sanitized))
    }

    pub fn content_type(path: &Path) -> mime::Mime {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("png") => mime::IMAGE_PNG,
            Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
            _ => mime::APPLICATION_OCTET_STREAM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];
    const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    #[test]
    fn png_and_jpeg_are_accepted() {
        let png = StorageService::validate_image(Bytes::from_static(&PNG_HEADER)).unwrap();
        assert_eq!(png.extension, "png");
        let jpg = StorageService::validate_image(Bytes::from_static(&JPEG_HEADER)).unwrap();
        assert_eq!(jpg.extension, "jpg");
    }

    #[test]
    fn other_content_is_rejected() {
        let gif = Bytes::from_static(b"GIF89a\x01\x00\x01\x00");
        assert!(StorageService::validate_image(gif).is_err());
        assert!(StorageService::validate_image(Bytes::new()).is_err());
    }

    #[test]
    fn oversized_photo_is_rejected() {
        let mut data = PNG_HEADER.to_vec();
        data.resize(MAX_PHOTO_BYTES + 1, 0);
        let err = StorageService::validate_image(Bytes::from(data)).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn base64_with_data_url_prefix_decodes() {
        let encoded = STANDARD.encode(PNG_HEADER);
        let with_prefix = format!("data:image/png;base64,{}", encoded);
        let image = StorageService::decode(PhotoSource::Base64(with_prefix)).unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[..], &PNG_HEADER[..]);
    }

    #[test]
    fn garbage_base64_is_a_validation_error() {
        let err = StorageService::decode_base64("%%%not base64%%%").unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn resolve_refuses_traversal() {
        let storage = StorageService::new("uploads", "http://localhost:10000");
        assert!(storage.resolve(PHOTO_DIR, "../secrets.env").is_none());
        assert!(storage.resolve(PHOTO_DIR, ".env").is_none());
        assert_eq!(
            storage.resolve(PHOTO_DIR, "abc.png"),
            Some(PathBuf::from("uploads").join(PHOTO_DIR).join("abc.png"))
        );
    }

    #[tokio::test]
    async fn save_then_delete_round_trips_on_disk() {
        let root = std::env::temp_dir().join(format!("waste-bank-storage-{}", uuid::Uuid::new_v4()));
        let storage = StorageService::new(&root, "http://localhost:10000");
        let image = StorageService::validate_image(Bytes::from_static(&PNG_HEADER)).unwrap();

        let relative = storage.save_image(PHOTO_DIR, &image).await.unwrap();
        assert!(relative.starts_with("waste-photos/") && relative.ends_with(".png"));
        assert!(root.join(&relative).is_file());
        assert_eq!(
            storage.url_for(&relative),
            format!("http://localhost:10000/storage/{}", relative)
        );

        storage.delete(&relative).await;
        assert!(!root.join(&relative).exists());
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
