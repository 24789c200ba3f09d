use serde::{Deserialize, Serialize};

/// Detection job as delivered on the detection queue.
///
/// Producers attach more fields (upload metadata, status tracking); the worker
/// only needs the job id and the source image location, so everything else is
/// ignored on deserialization. A job is never mutated once parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionJob {
    pub id: String,
    pub s3_key: String,
}

/// Terminal status of a processed job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_and_ignores_extra_fields() {
        let payload = r#"{"id":"job-1","s3_key":"uploads/photo.jpg","status":"pending","filename":"photo.jpg"}"#;
        let job: DetectionJob = serde_json::from_str(payload).unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(job.s3_key, "uploads/photo.jpg");
    }

    #[test]
    fn missing_s3_key_is_an_error() {
        let payload = r#"{"id":"job-1"}"#;
        assert!(serde_json::from_str::<DetectionJob>(payload).is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&JobStatus::Completed).unwrap(), "\"completed\"");
        assert_eq!(serde_json::to_string(&JobStatus::Failed).unwrap(), "\"failed\"");
    }
}
