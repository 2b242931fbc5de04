use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use crate::error::{Error, HttpError};

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Decodes a base64 image and writes it under the media root, returning
    /// the relative path it was stored at.
    pub fn save_image(&self, data: &str) -> Result<String, Error> {
        let (extension, payload) = split_data_url(data);

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|_| HttpError::InvalidRequest.new("Image is not valid base64 data"))?;

        let relative = format!("recipes/{}.{}", Uuid::new_v4(), extension);
        let target = self.root.join(&relative);

        write_file(&target, &bytes).map_err(|e| {
            log::warn!("failed to write {}: {}", target.display(), e);
            HttpError::InternalServerError.new("Failed to store image")
        })?;

        Ok(relative)
    }
}

fn write_file(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(target, bytes)
}

/* both "data:image/png;base64,AAAA" and a bare payload are accepted */
pub fn split_data_url(data: &str) -> (&'static str, &str) {
    let rest = match data.strip_prefix("data:") {
        Some(rest) => rest,
        None => return ("jpg", data),
    };

    match rest.split_once(";base64,") {
        Some((mime, payload)) => (extension_for(mime), payload),
        None => ("jpg", rest),
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "img",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_data_url_extension_is_mapped_from_mime() {
        assert_eq!(split_data_url("data:image/png;base64,AAAA"), ("png", "AAAA"));
        assert_eq!(split_data_url("data:image/jpeg;base64,BBBB"), ("jpg", "BBBB"));
    }

    #[test]
    fn test_bare_payload_defaults_to_jpg() {
        assert_eq!(split_data_url("AAAA"), ("jpg", "AAAA"));
    }

    #[test]
    fn test_unknown_mime_gets_generic_extension() {
        assert_eq!(split_data_url("data:image/bmp;base64,AAAA"), ("img", "AAAA"));
    }

    #[test]
    fn test_saved_image_lands_under_the_media_root() {
        let root = env::temp_dir().join(format!("media-{}", Uuid::new_v4()));
        let store = MediaStore::new(&root);

        let path = store.save_image("data:image/png;base64,aGVsbG8=").unwrap();

        assert!(path.starts_with("recipes/"));
        assert!(path.ends_with(".png"));
        assert_eq!(fs::read(root.join(&path)).unwrap(), b"hello");
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let root = env::temp_dir().join(format!("media-{}", Uuid::new_v4()));
        let store = MediaStore::new(&root);

        let error = store.save_image("data:image/png;base64,@@@@").unwrap_err();

        assert_eq!(error.code, 400);
    }
}
