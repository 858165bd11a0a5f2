//! Media service.
//!
//! Bridges uploads to the storage backend. Only image content types are
//! accepted, and multi-file batches are validated in full before the first
//! byte reaches the store.

use std::path::Path;
use std::sync::Arc;

use agora_common::{AppError, AppResult, IdGenerator, StorageBackend};
use serde::Serialize;

/// An incoming file to upload.
#[derive(Debug, Clone)]
pub struct UploadInput {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A stored file as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

/// Service for handling image uploads.
#[derive(Clone)]
pub struct MediaService {
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

impl MediaService {
    /// Create a new media service.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Upload a community icon or banner image.
    pub async fn upload_community_image(&self, input: UploadInput) -> AppResult<UploadResponse> {
        validate_image(&input)?;
        self.store("community_banners", input).await
    }

    /// Upload a batch of post images.
    ///
    /// All files are validated before any is stored, so a bad file in the
    /// middle of the batch never leaves earlier files behind.
    pub async fn upload_post_images(
        &self,
        inputs: Vec<UploadInput>,
    ) -> AppResult<Vec<UploadResponse>> {
        for input in &inputs {
            validate_image(input)?;
        }

        let mut responses = Vec::with_capacity(inputs.len());
        for input in inputs {
            responses.push(self.store("post_images", input).await?);
        }

        Ok(responses)
    }

    async fn store(&self, prefix: &str, input: UploadInput) -> AppResult<UploadResponse> {
        let ext = extension_of(&input.filename);
        let key = format!("{prefix}/{}{ext}", self.id_gen.generate_uuid_v4());

        let uploaded = self
            .storage
            .upload(&key, &input.data, &input.content_type)
            .await?;

        tracing::debug!(key = %uploaded.key, size = uploaded.size, "file stored");

        Ok(UploadResponse {
            url: uploaded.url,
            size: uploaded.size,
            content_type: uploaded.content_type,
        })
    }
}

fn validate_image(input: &UploadInput) -> AppResult<()> {
    if input.content_type.starts_with("image/") {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Only image uploads are allowed, got {}",
            input.content_type
        )))
    }
}

/// File extension including the dot, or empty when there is none.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agora_common::UploadedFile;
    use std::sync::Mutex;

    /// In-memory backend recording every stored key.
    struct RecordingStorage {
        keys: Mutex<Vec<String>>,
    }

    impl RecordingStorage {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                keys: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait::async_trait]
    impl StorageBackend for RecordingStorage {
        async fn upload(
            &self,
            key: &str,
            data: &[u8],
            content_type: &str,
        ) -> AppResult<UploadedFile> {
            self.keys.lock().unwrap().push(key.to_string());
            Ok(UploadedFile {
                key: key.to_string(),
                url: format!("/media/{key}"),
                size: data.len() as u64,
                content_type: content_type.to_string(),
                md5: String::new(),
            })
        }

        async fn delete(&self, _key: &str) -> AppResult<()> {
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("/media/{key}")
        }

        async fn exists(&self, _key: &str) -> AppResult<bool> {
            Ok(true)
        }
    }

    fn png(name: &str) -> UploadInput {
        UploadInput {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            data: vec![0u8; 4],
        }
    }

    #[tokio::test]
    async fn test_upload_community_image() {
        let storage = RecordingStorage::new();
        let service = MediaService::new(storage.clone());

        let response = service
            .upload_community_image(png("banner.PNG"))
            .await
            .unwrap();

        assert!(response.url.starts_with("/media/community_banners/"));
        assert!(response.url.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_non_image_rejected() {
        let service = MediaService::new(RecordingStorage::new());

        let input = UploadInput {
            filename: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: vec![],
        };
        let result = service.upload_community_image(input).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_batch_aborts_before_storing_anything() {
        let storage = RecordingStorage::new();
        let service = MediaService::new(storage.clone());

        let inputs = vec![
            png("a.png"),
            UploadInput {
                filename: "b.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: vec![],
            },
        ];
        let result = service.upload_post_images(inputs).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(storage.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_uploads_in_order() {
        let storage = RecordingStorage::new();
        let service = MediaService::new(storage.clone());

        let responses = service
            .upload_post_images(vec![png("a.png"), png("b.jpg")])
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
        let keys = storage.keys.lock().unwrap();
        assert!(keys[0].ends_with(".png"));
        assert!(keys[1].ends_with(".jpg"));
    }
}
