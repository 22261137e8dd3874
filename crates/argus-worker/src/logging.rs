//! Tracing bootstrap and structured per-source logging.

use tracing::{info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `LOG_FORMAT=json` selects JSON lines (for log shippers), anything else
/// colored text. `RUST_LOG` directives are honored on top of `argus=info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["argus=info", "ort=warn", "rumqttc=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Source logger for lifecycle events of one capture source.
///
/// Every line carries the source name and the component that emitted it
/// (`capture`, `supervisor`, ...), so a single camera can be followed
/// through the logs.
#[derive(Debug, Clone)]
pub struct SourceLogger {
    source: String,
    component: &'static str,
}

impl SourceLogger {
    pub fn new(source: &str, component: &'static str) -> Self {
        Self {
            source: source.to_string(),
            component,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            source = %self.source,
            component = self.component,
            "Source started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            source = %self.source,
            component = self.component,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            source = %self.source,
            component = self.component,
            "Source warning: {}", message
        );
    }

    pub fn log_stop(&self, message: &str) {
        info!(
            source = %self.source,
            component = self.component,
            "Source stopped: {}", message
        );
    }

    /// Create a tracing span for this source.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "source",
            source = %self.source,
            component = self.component
        )
    }
}
