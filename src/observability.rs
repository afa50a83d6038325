//! Observability module for logging and metrics setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Spans and metrics for the preprocessing pipeline
//!
//! The library only emits events and metrics; installing a subscriber or a
//! metrics recorder is left to the host binary.

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};
use crate::preprocessing::{QualityTier, StageKind};

/// Initialize structured logging with custom configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("page_preprocess={}", config.log_level).parse()?)
        .add_directive(format!("ocr_preprocessing={}", config.log_level).parse()?);

    match config.effective_log_format() {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .try_init()?;
        }
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for one preprocessing run
pub fn preprocessing_span(width: u32, height: u32) -> tracing::Span {
    tracing::info_span!(
        "preprocessing",
        width = width,
        height = height,
        component = "preprocessing"
    )
}

/// Record the duration of a single pipeline stage
pub fn record_stage_metrics(stage: StageKind, duration: Duration) {
    metrics::counter!("preprocessing_stage_runs_total", "stage" => stage.as_str()).increment(1);
    metrics::histogram!("preprocessing_stage_duration_seconds", "stage" => stage.as_str())
        .record(duration.as_secs_f64());
}

/// Record the outcome of a whole preprocessing run
pub fn record_pipeline_metrics(quality: Option<QualityTier>, success: bool, duration: Duration) {
    let tier = quality.map(|q| q.as_str()).unwrap_or("unknown");
    metrics::counter!(
        "preprocessing_runs_total",
        "result" => if success { "success" } else { "failure" },
        "quality" => tier
    )
    .increment(1);
    metrics::histogram!("preprocessing_duration_seconds").record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        record_stage_metrics(StageKind::Binarize, Duration::from_millis(3));
        record_pipeline_metrics(Some(QualityTier::Low), true, Duration::from_millis(12));
        record_pipeline_metrics(None, false, Duration::from_millis(1));
    }

    #[test]
    fn test_preprocessing_span_builds() {
        let span = preprocessing_span(640, 480);
        let _guard = span.enter();
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let config = ObservabilityConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(init_tracing_with_config(&config).is_err());
    }
}
