//! Logging and observability for intexration
//!
//! Structured `tracing` events with `identifier`, `stage` and `duration_ms`
//! fields for every build step.

use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `intexration=info` (or `debug` when
/// `verbose`). Verbose output also reports span close events with timings.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("intexration=debug,info")
            } else {
                EnvFilter::try_new("intexration=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span wrapping one stage (`clone` or `compile`) of one document.
pub fn build_span(identifier: &str, stage: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "build_stage",
        identifier = %identifier,
        stage = %stage,
    )
}

pub fn log_stage_start(identifier: &str, stage: &str) {
    info!(identifier = %identifier, stage = %stage, "Starting");
}

pub fn log_stage_complete(identifier: &str, stage: &str, duration_ms: u128) {
    info!(
        identifier = %identifier,
        stage = %stage,
        duration_ms = %duration_ms,
        "Completed"
    );
}

pub fn log_stage_error(identifier: &str, stage: &str, error: &str, duration_ms: u128) {
    error!(
        identifier = %identifier,
        stage = %stage,
        duration_ms = %duration_ms,
        error = %error,
        "Failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_span_without_subscriber_is_usable() {
        let span = build_span("acme/paper/main", "compile");
        let _guard = span.enter();
        log_stage_start("acme/paper/main", "compile");
        log_stage_complete("acme/paper/main", "compile", 12);
        log_stage_error("acme/paper/main", "compile", "boom", 3);
    }

    #[test]
    fn test_init_tracing_twice_reports_error() {
        // The first call may race with other tests; the second one must fail cleanly.
        let _ = init_tracing(false);
        assert!(init_tracing(true).is_err());
    }
}
