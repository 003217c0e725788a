//! Service wiring and the HTTP server lifecycle.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bobine_core::config::Config;
use bobine_core::service::{AlertEvaluator, MetricsCollector, RollupScheduler, WebhookSender};
use bobine_dlna::{DlnaState, SsdpDevice};
use bobine_stream::http::StreamState;
use bobine_stream::probe::MediaProbe;
use bobine_stream::session::{FfmpegEncoderProbe, HardwareEncoderCache, SessionManager};

use crate::store::MemoryStore;

pub async fn run(config: Config) -> Result<()> {
    let store = Arc::new(MemoryStore::new());

    // Encoder sessions
    let hw_cache = Arc::new(HardwareEncoderCache::new(Box::new(FfmpegEncoderProbe::new(
        config.transcode.ffmpeg_path.clone(),
    ))));
    let sessions = Arc::new(SessionManager::new(&config.transcode, hw_cache));
    let cleanup_loop = sessions.clone().start_cleanup();
    info!(
        ttl_secs = config.transcode.session_ttl_seconds,
        tick_secs = config.transcode.cleanup_interval_seconds,
        "encoder session manager started"
    );

    // Monitoring loops
    let collector = Arc::new(MetricsCollector::new(
        store.clone(),
        store.clone(),
        sessions.clone(),
        &config.media.library_paths,
        &config.monitor,
    ));
    let collector_loop = collector.start();

    let evaluator = Arc::new(AlertEvaluator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(WebhookSender::new()),
        Duration::from_secs(config.monitor.alert_interval_seconds),
    ));
    let alert_loop = evaluator.start();

    let rollup = Arc::new(RollupScheduler::new(store.clone()));
    let rollup_loop = rollup.start();
    info!("monitoring loops started");

    // Discovery
    let ssdp = Arc::new(SsdpDevice::new(&config.advertise_address()));
    if config.dlna.enabled {
        match ssdp.clone().start().await {
            Ok(()) => info!(udn = %ssdp.udn(), "DLNA discovery started"),
            Err(e) => warn!("DLNA discovery disabled: {}", e),
        }
    }

    // HTTP surface
    let stream_state = StreamState {
        catalog: store.clone(),
        sessions: sessions.clone(),
        probe: Arc::new(MediaProbe::new(config.transcode.ffprobe_path.clone())),
        ffmpeg_path: config.transcode.ffmpeg_path.clone(),
        api_prefix: "/api".to_string(),
    };
    let dlna_state = DlnaState {
        directory: store.clone(),
        device: ssdp.clone(),
        base_url: format!("http://{}", config.advertise_address()),
        friendly_name: config.dlna.friendly_name.clone(),
    };

    let mut app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api", bobine_stream::http::router(stream_state))
        .nest("/dlna", bobine_dlna::router(dlna_state));
    if config.server.metrics_enabled {
        app = app.route(
            "/metrics",
            get(|| async { bobine_core::metrics::gather_metrics() }),
        );
    }
    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.http_address())
        .await
        .with_context(|| format!("binding {}", config.http_address()))?;
    info!("listening on {}", config.http_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Orderly teardown: stop announcing first so clients drop us, then the
    // loops, then every live encoder child.
    info!("shutting down");
    ssdp.stop().await;
    cleanup_loop.stop().await;
    collector_loop.stop().await;
    alert_loop.stop().await;
    rollup_loop.stop().await;
    sessions.stop_all().await;
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => warn!("failed to listen for shutdown signal: {}", e),
    }
}
