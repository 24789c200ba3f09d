use std::path::{Path, PathBuf};

use crate::models::detection::Detection;
use crate::models::job::DetectionJob;
use crate::models::result::{LogoArtifact, ProcessingResult};
use crate::services::detection::{DetectionError, InferenceClient};
use crate::services::extraction::{self, ExtractionError};
use crate::services::storage::{S3Client, StorageError};
use crate::staging::JobStaging;

/// Object-store seam used by the processor. Implemented by [`S3Client`] in
/// production and by in-memory stores in tests.
#[allow(async_fn_in_trait)]
pub trait ArtifactStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError>;
    async fn upload(
        &self,
        src: &Path,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError>;
}

impl ArtifactStore for S3Client {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        S3Client::download(self, key, dest).await
    }

    async fn upload(
        &self,
        src: &Path,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        S3Client::upload(self, src, key, content_type).await
    }
}

/// Detection-engine seam. An error here means the engine call itself failed;
/// zero detections is a normal return.
#[allow(async_fn_in_trait)]
pub trait Detector {
    async fn detect(&self, image_path: &Path) -> Result<Vec<Detection>, DetectionError>;
}

impl Detector for InferenceClient {
    async fn detect(&self, image_path: &Path) -> Result<Vec<Detection>, DetectionError> {
        InferenceClient::detect(self, image_path).await
    }
}

/// Runs the full pipeline for one job: download, detect, then per-detection
/// extract and upload.
pub struct JobProcessor<S, D> {
    storage: S,
    detector: D,
    staging_root: PathBuf,
}

impl<S: ArtifactStore, D: Detector> JobProcessor<S, D> {
    pub fn new(storage: S, detector: D, staging_root: impl AsRef<Path>) -> Self {
        Self {
            storage,
            detector,
            staging_root: staging_root.as_ref().to_path_buf(),
        }
    }

    /// Process one job to a terminal result. Never fails: download and
    /// detection errors become a `failed` result, and a detection that cannot
    /// be extracted or uploaded is skipped without touching the rest. Staging
    /// files are released on every path.
    pub async fn process(&self, job: &DetectionJob) -> ProcessingResult {
        tracing::info!(job_id = %job.id, s3_key = %job.s3_key, "Processing job");

        let staging = match JobStaging::create(&self.staging_root, &job.id) {
            Ok(staging) => staging,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to create staging directory");
                return ProcessingResult::failed(
                    &job.id,
                    format!("Failed to create staging directory: {e}"),
                );
            }
        };

        let source = staging.source_path();
        if let Err(e) = self.storage.download(&job.s3_key, &source).await {
            tracing::error!(job_id = %job.id, s3_key = %job.s3_key, error = %e, "Download failed");
            return ProcessingResult::failed(&job.id, format!("Failed to download {}: {e}", job.s3_key));
        }

        let detections = match self.detector.detect(&source).await {
            Ok(detections) => detections,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Detection failed");
                return ProcessingResult::failed(&job.id, format!("Detection failed: {e}"));
            }
        };
        tracing::info!(job_id = %job.id, count = detections.len(), "Detection complete");

        let mut logos_found = Vec::new();
        for (index, detection) in detections.iter().enumerate() {
            match self
                .process_detection(&job.id, index, detection, &staging, &source)
                .await
            {
                Ok(artifact) => logos_found.push(artifact),
                Err(e) => {
                    // Partial success is expected: one bad region must not
                    // cost the job its other artifacts.
                    tracing::error!(job_id = %job.id, index, error = %e, "Skipping detection");
                }
            }
        }

        metrics::counter!("detection_logos_extracted").increment(logos_found.len() as u64);
        tracing::info!(job_id = %job.id, logos = logos_found.len(), "Job completed");
        ProcessingResult::completed(&job.id, logos_found)
    }

    async fn process_detection(
        &self,
        job_id: &str,
        index: usize,
        detection: &Detection,
        staging: &JobStaging,
        source: &Path,
    ) -> Result<LogoArtifact, DetectionStepError> {
        let png = extraction::extract_region(source, &detection.bounding_box)?;

        let crop_path = staging.crop_path(index);
        tokio::fs::write(&crop_path, &png).await?;

        let s3_key = format!("extracted/{job_id}/logo_{index}.png");
        self.storage.upload(&crop_path, &s3_key, None).await?;

        Ok(LogoArtifact::from_detection(job_id, detection, s3_key))
    }
}

#[derive(Debug, thiserror::Error)]
enum DetectionStepError {
    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    #[error("Failed to write crop: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Storage(#[from] StorageError),
}
