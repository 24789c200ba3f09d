use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use logo_preserve_worker::{
    broker::BrokerSession,
    config::AppConfig,
    delivery::DeliveryController,
    processor::JobProcessor,
    services::{detection::InferenceClient, storage::S3Client},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting logo detection worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    // Initialize Prometheus metrics recorder
    PrometheusBuilder::new()
        .install()
        .expect("Failed to install Prometheus metrics exporter");

    metrics::describe_histogram!(
        "detection_processing_seconds",
        "Time to process one detection job"
    );
    metrics::describe_counter!(
        "detection_jobs_completed",
        "Jobs that reached a completed result"
    );
    metrics::describe_counter!(
        "detection_jobs_failed",
        "Jobs that exhausted their retries"
    );
    metrics::describe_counter!(
        "detection_deliveries_malformed",
        "Deliveries rejected because the payload could not be parsed"
    );
    metrics::describe_counter!(
        "detection_logos_extracted",
        "Logo crops successfully extracted and uploaded"
    );

    // Initialize services
    tracing::info!("Initializing services");
    let storage = S3Client::new(
        &config.bucket_name,
        &config.bucket_endpoint,
        &config.bucket_access_key,
        &config.bucket_secret_key,
    )
    .expect("Failed to initialize S3 client");

    let detector = InferenceClient::new(&config.inference_url, config.confidence_threshold);

    let processor = JobProcessor::new(storage, detector, &config.staging_dir);

    // Connect to the broker; startup fails fast if it is unreachable
    let session = BrokerSession::connect(&config)
        .await
        .expect("Failed to connect to RabbitMQ");

    let controller = DeliveryController::new(
        processor,
        session.result_publisher(),
        config.max_retries,
        config.retry_backoff_base,
        config.max_redeliveries,
    );

    if let Err(e) = session.run(&controller).await {
        tracing::error!(error = %e, "Worker stopped with broker error");
        std::process::exit(1);
    }

    tracing::info!("Worker stopped");
}
