use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;

use crate::models::detection::Detection;

/// Client for the detection inference service.
///
/// The engine behind the endpoint is opaque to the worker; all that matters is
/// the contract: an image in, zero or more candidate regions out, with
/// confidence filtering already applied.
pub struct InferenceClient {
    http: Client,
    url: String,
    confidence_threshold: f64,
}

#[derive(Deserialize)]
struct InferenceResponse {
    detections: Vec<Detection>,
}

impl InferenceClient {
    pub fn new(url: &str, confidence_threshold: f64) -> Self {
        Self {
            http: Client::new(),
            url: url.to_string(),
            confidence_threshold,
        }
    }

    /// Run detection on a local image file.
    ///
    /// An engine failure is distinct from an empty detection list, which is a
    /// valid outcome. The threshold is forwarded to the engine and re-applied
    /// locally so callers never see low-confidence regions.
    pub async fn detect(&self, image_path: &Path) -> Result<Vec<Detection>, DetectionError> {
        let image_bytes = tokio::fs::read(image_path).await.map_err(DetectionError::Io)?;

        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(&image_bytes),
            "confidence_threshold": self.confidence_threshold,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&request_body)
            .send()
            .await
            .map_err(DetectionError::Http)?
            .error_for_status()
            .map_err(DetectionError::Http)?;

        let parsed: InferenceResponse = response.json().await.map_err(DetectionError::Http)?;

        let detections: Vec<Detection> = parsed
            .detections
            .into_iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
            .collect();

        tracing::debug!(count = detections.len(), image = %image_path.display(), "Detection complete");
        Ok(detections)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Detection engine error: {0}")]
    Engine(String),
}
