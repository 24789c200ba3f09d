use s3::creds::Credentials;
use s3::{Bucket, Region};
use std::path::Path;

/// Gateway to the S3-compatible object store holding source images and
/// extracted logo crops.
pub struct S3Client {
    bucket: Box<Bucket>,
}

impl S3Client {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    /// Download an object to a local file.
    pub async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let response = self.bucket.get_object(key).await.map_err(StorageError::S3)?;
        tokio::fs::write(dest, response.bytes())
            .await
            .map_err(StorageError::Io)?;
        Ok(())
    }

    /// Upload a local file, returning the object key. The content type is
    /// inferred from the destination extension unless supplied.
    pub async fn upload(
        &self,
        src: &Path,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let data = tokio::fs::read(src).await.map_err(StorageError::Io)?;
        let content_type = content_type.unwrap_or_else(|| infer_content_type(key));
        self.bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(StorageError::S3)?;
        Ok(key.to_string())
    }

    /// Generate a presigned GET URL for an object.
    pub async fn presigned_url(&self, key: &str, expiry_secs: u32) -> Result<String, StorageError> {
        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(StorageError::S3)
    }
}

/// Map a destination key's extension to a content type, defaulting to an
/// opaque byte stream.
pub fn infer_content_type(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Local file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
