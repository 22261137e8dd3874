//! Argus surveillance engine binary.

use std::sync::Arc;

use tracing::{error, info, warn};

use argus_notify::build_notifiers;
use argus_worker::logging::init_tracing;
use argus_worker::metrics::init_metrics;
use argus_worker::{build_detector, AppConfig, Application, MediaCaptureFactory};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting argus");

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        sources = config.sources.len(),
        detector = ?config.detector.kind,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics.listen {
        match init_metrics(addr) {
            Ok(()) => info!(%addr, "Prometheus exporter listening"),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    let detector = match build_detector(&config.detector) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to create detector: {}", e);
            std::process::exit(1);
        }
    };

    let notifiers = match build_notifiers(&config.notify).await {
        Ok(n) => n,
        Err(e) => {
            error!("Failed to create notifiers: {}", e);
            std::process::exit(1);
        }
    };

    let app = match Application::build(config, detector, notifiers, Arc::new(MediaCaptureFactory))
        .await
    {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start engine: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
    };

    match app.run(shutdown).await {
        Ok(None) => info!("Argus shutdown complete"),
        Ok(Some(reason)) => {
            let code = reason.exit_code();
            if code == 0 {
                info!(%reason, "Argus stopping");
            } else {
                error!(%reason, "Argus stopping");
            }
            std::process::exit(code);
        }
        Err(e) => {
            error!("Engine error: {}", e);
            std::process::exit(1);
        }
    }
}
