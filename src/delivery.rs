use std::time::Duration;

use crate::models::job::{DetectionJob, JobStatus};
use crate::models::result::ProcessingResult;
use crate::processor::{ArtifactStore, Detector, JobProcessor};

pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// Processing seam so the retry logic can be driven without real gateways.
#[allow(async_fn_in_trait)]
pub trait ProcessJob {
    async fn process(&self, job: &DetectionJob) -> ProcessingResult;
}

impl<S: ArtifactStore, D: Detector> ProcessJob for JobProcessor<S, D> {
    async fn process(&self, job: &DetectionJob) -> ProcessingResult {
        JobProcessor::process(self, job).await
    }
}

/// Publishes terminal results to the results queue.
#[allow(async_fn_in_trait)]
pub trait ResultPublisher {
    async fn publish(&self, result: &ProcessingResult) -> Result<(), PublishError>;
}

/// What the broker session should do with the inbound delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryVerdict {
    Ack,
    Reject { requeue: bool },
}

/// Turns one delivery into exactly one terminal outcome: at most one published
/// result and exactly one ack/nack decision, with bounded retries in between.
pub struct DeliveryController<P, R> {
    processor: P,
    publisher: R,
    max_retries: u32,
    backoff_base: f64,
    max_redeliveries: Option<u32>,
}

impl<P: ProcessJob, R: ResultPublisher> DeliveryController<P, R> {
    pub fn new(
        processor: P,
        publisher: R,
        max_retries: u32,
        backoff_base: f64,
        max_redeliveries: Option<u32>,
    ) -> Self {
        Self {
            processor,
            publisher,
            max_retries: max_retries.max(1),
            backoff_base,
            max_redeliveries,
        }
    }

    /// Handle one delivery through to its verdict.
    ///
    /// Malformed payloads are rejected without requeue and without a result;
    /// re-parsing cannot change the outcome and there is no job id to report
    /// against. Everything else retries the whole pipeline with exponential
    /// backoff — failures are most often transient infrastructure issues, and
    /// re-running download/detect/upload under deterministic keys is
    /// idempotent. `delivery_count` is the broker-reported redelivery count
    /// when available (quorum queues).
    pub async fn handle(&self, payload: &[u8], delivery_count: Option<u32>) -> DeliveryVerdict {
        let job: DetectionJob = match serde_json::from_slice(payload) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(error = %e, "Rejecting malformed job payload");
                metrics::counter!("detection_deliveries_malformed").increment(1);
                return DeliveryVerdict::Reject { requeue: false };
            }
        };
        tracing::info!(job_id = %job.id, "Received job");

        let mut attempt = 1u32;
        loop {
            let start = std::time::Instant::now();
            let result = self.processor.process(&job).await;
            metrics::histogram!("detection_processing_seconds")
                .record(start.elapsed().as_secs_f64());

            if result.status == JobStatus::Completed {
                self.publish_best_effort(&result).await;
                metrics::counter!("detection_jobs_completed").increment(1);
                return DeliveryVerdict::Ack;
            }

            let error = result
                .error
                .unwrap_or_else(|| "unknown processing error".to_string());

            if attempt < self.max_retries {
                let backoff_secs = self.backoff_base * 2f64.powi(attempt as i32 - 1);
                tracing::warn!(
                    job_id = %job.id,
                    attempt,
                    max_retries = self.max_retries,
                    backoff_secs,
                    error = %error,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs_f64(backoff_secs)).await;
                attempt += 1;
            } else {
                let final_result = ProcessingResult::failed(
                    &job.id,
                    format!(
                        "Processing failed after {} attempts: {error}",
                        self.max_retries
                    ),
                );
                self.publish_best_effort(&final_result).await;
                metrics::counter!("detection_jobs_failed").increment(1);
                return DeliveryVerdict::Reject {
                    requeue: self.should_requeue(&job.id, delivery_count),
                };
            }
        }
    }

    /// Exhausted deliveries go back on the queue so chronically failing jobs
    /// stay visible to an operator, unless a redelivery ceiling is configured
    /// and the broker says this delivery has already been around that often.
    fn should_requeue(&self, job_id: &str, delivery_count: Option<u32>) -> bool {
        match (self.max_redeliveries, delivery_count) {
            (Some(ceiling), Some(count)) if count >= ceiling => {
                tracing::warn!(
                    job_id = %job_id,
                    delivery_count = count,
                    ceiling,
                    "Redelivery ceiling reached, rejecting without requeue"
                );
                false
            }
            _ => true,
        }
    }

    /// The inbound and outbound queues are independent failure domains: a
    /// publish failure is logged but never changes the verdict already
    /// reached for the inbound delivery.
    async fn publish_best_effort(&self, result: &ProcessingResult) {
        if let Err(e) = self.publisher.publish(result).await {
            tracing::error!(job_id = %result.job_id, error = %e, "Failed to publish result");
        } else {
            tracing::info!(job_id = %result.job_id, status = ?result.status, "Published result");
        }
    }
}
