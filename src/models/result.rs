use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::detection::{BoundingBox, Detection};
use super::job::JobStatus;

/// A logo crop that was successfully extracted and uploaded.
///
/// Created only when both the crop and the upload succeed; never mutated
/// afterwards. The `s3_key` is deterministic (`extracted/{job_id}/logo_{idx}.png`)
/// so a retried job overwrites its own artifacts rather than duplicating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoArtifact {
    pub id: Uuid,
    pub job_id: String,
    pub bounding_box: BoundingBox,
    pub confidence: f64,
    pub logo_type: String,
    pub s3_key: String,
}

impl LogoArtifact {
    pub fn from_detection(job_id: &str, detection: &Detection, s3_key: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job_id.to_string(),
            bounding_box: detection.bounding_box,
            confidence: detection.confidence,
            logo_type: detection.class_name.clone(),
            s3_key,
        }
    }
}

/// Terminal outcome of one job, published to the results queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub job_id: String,
    pub status: JobStatus,
    pub logos_found: Vec<LogoArtifact>,
    /// Reserved for a presigned link to the artifacts; currently always empty.
    pub result_url: String,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResult {
    pub fn completed(job_id: &str, logos_found: Vec<LogoArtifact>) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Completed,
            logos_found,
            result_url: String::new(),
            processed_at: Utc::now(),
            error: None,
        }
    }

    pub fn failed(job_id: &str, error: String) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Failed,
            logos_found: Vec::new(),
            result_url: String::new(),
            processed_at: Utc::now(),
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_result_omits_error_field() {
        let result = ProcessingResult::completed("job-1", Vec::new());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result_url"], "");
        assert!(json.get("error").is_none());
        assert!(json["logos_found"].as_array().unwrap().is_empty());
    }

    #[test]
    fn failed_result_carries_error() {
        let result = ProcessingResult::failed("job-1", "download failed".to_string());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "download failed");
    }

    #[test]
    fn processed_at_uses_utc_with_trailing_z() {
        let result = ProcessingResult::completed("job-1", Vec::new());
        let json = serde_json::to_string(&result).unwrap();
        let ts = serde_json::from_str::<serde_json::Value>(&json).unwrap()["processed_at"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(ts.ends_with('Z'), "expected trailing Z, got {ts}");
    }

    #[test]
    fn artifact_wire_format_matches_consumer_contract() {
        let detection = Detection {
            bounding_box: BoundingBox { x: 10, y: 20, width: 30, height: 40 },
            confidence: 0.92,
            class_name: "acme".to_string(),
            class_id: 7,
        };
        let artifact =
            LogoArtifact::from_detection("job-1", &detection, "extracted/job-1/logo_0.png".into());
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["job_id"], "job-1");
        assert_eq!(json["bounding_box"]["x"], 10);
        assert_eq!(json["logo_type"], "acme");
        assert_eq!(json["s3_key"], "extracted/job-1/logo_0.png");
    }
}
