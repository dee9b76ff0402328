//! Logging and metrics initialization

use knowledge_config::ObservabilitySettings;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(level: &str) -> String {
    format!("knowledge={level},knowledge_server={level},knowledge_rag={level},knowledge_media={level},knowledge_persistence={level},knowledge_agent={level}")
}

/// Install the global subscriber; plain or JSON output
pub fn init_tracing(observability: &ObservabilitySettings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&observability.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}

/// Install the Prometheus recorder with its own `/metrics` listener
///
/// Must run inside the tokio runtime.
pub fn init_metrics(observability: &ObservabilitySettings) -> anyhow::Result<()> {
    if !observability.metrics_enabled {
        tracing::info!("Metrics disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], observability.metrics_port))
        .install()?;

    describe_metrics();
    tracing::info!(port = observability.metrics_port, "Prometheus metrics exporter listening");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!("rag_documents_ingested_total", "Documents fully processed");
    metrics::describe_counter!("rag_chunks_stored_total", "Chunks written to the vector store");
    metrics::describe_counter!("rag_ingest_failures_total", "Failed ingest attempts by error kind");
    metrics::describe_counter!("rag_queries_total", "Retrieval queries answered");
    metrics::describe_histogram!("rag_query_results", "Chunks returned per query");
    metrics::describe_counter!(
        "media_conversions_total",
        "Media-to-text attempts by variant, kind and outcome"
    );
}
