//! SafeZone monitor - geofencing and wandering alerts for one tracked person
//!
//! Reads position fixes (JSONL replay file or stdin), classifies each one
//! against the configured safe zones and pushes alerts to the log, an alert
//! file, and optionally MQTT.
//!
//! Module structure:
//! - `domain/` - Core value types, events and errors
//! - `services/` - Geofencing engine (registry, detectors, Monitor)
//! - `io/` - Collaborator boundaries (fix sources, alert sinks, Prometheus)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use safezone_monitor::infra::{Config, Metrics};
use safezone_monitor::io::prometheus::{start_metrics_server, MetricsContext};
use safezone_monitor::io::{
    create_alert_channel, create_fix_channel, AlertLogWriter, FixSender, JsonlFixSource,
    LocationSource, MqttAlertPublisher,
};
use safezone_monitor::services::{
    AlertDispatcher, IngestionLoop, LocationHistoryStore, LogSink, Monitor, SafeZoneRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// SafeZone monitor - caregiver geofencing engine
#[derive(Parser, Debug)]
#[command(name = "safezone-monitor", version, about)]
struct Args {
    /// Path to TOML configuration file (else CONFIG_FILE, else config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// JSONL fix file to replay (overrides [source] fixes_file; stdin if neither is set)
    #[arg(short, long)]
    fixes: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default INFO level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = %env!("CARGO_PKG_VERSION"), git = %env!("GIT_HASH"), "safezone-monitor starting");

    let args = Args::parse();
    let config = Config::load(args.config.as_deref());
    let settings = config.monitor_settings();

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        zones = %config.zones().len(),
        history_capacity = %config.history_capacity(),
        debounce_samples = %settings.debounce_samples,
        wandering_threshold_secs = %settings.wandering_threshold.num_seconds(),
        alert_log = %config.alert_log_enabled(),
        mqtt = %config.mqtt_enabled(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    let registry = Arc::new(
        SafeZoneRegistry::with_zones(config.initial_zones().context("invalid zone in config")?)
            .context("invalid zone in config")?,
    );
    if registry.is_empty() {
        warn!("no_safe_zones_configured");
    }
    let history = Arc::new(LocationHistoryStore::new(config.history_capacity()));

    let mut dispatcher = AlertDispatcher::with_metrics(metrics.clone());
    dispatcher.register(LogSink);

    let mut workers = Vec::new();

    if config.alert_log_enabled() {
        let (sender, rx) =
            create_alert_channel("alert_log", config.alert_queue_size(), config.site_id().to_string());
        dispatcher.register(sender);
        let writer = AlertLogWriter::new(config.alert_log_file(), rx);
        workers.push(tokio::spawn(writer.run(shutdown_rx.clone())));
    }

    if config.mqtt_enabled() {
        let (sender, rx) =
            create_alert_channel("mqtt", config.alert_queue_size(), config.site_id().to_string());
        dispatcher.register(sender);
        let publisher = MqttAlertPublisher::new(&config, rx, metrics.clone());
        workers.push(tokio::spawn(publisher.run(shutdown_rx.clone())));
    }

    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let ctx = MetricsContext {
            metrics: metrics.clone(),
            registry: registry.clone(),
            history: history.clone(),
            site_id: Arc::from(config.site_id()),
        };
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(prometheus_port, ctx, prom_shutdown).await {
                error!(error = %e, "prometheus_metrics_server_error");
            }
        });
    }

    let metrics_reporter = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_reporter.report().log();
        }
    });

    let monitor = Monitor::new(&settings, registry, history, dispatcher, metrics.clone());
    let mut ingestion = IngestionLoop::new(monitor);

    // The replay reader plays the location provider, feeding the bounded fix queue
    let (fix_tx, fix_source) = create_fix_channel(config.fix_queue_size());
    let fixes_path = args.fixes.or_else(|| config.fixes_file().map(str::to_string));
    match fixes_path {
        Some(path) => {
            let replay = JsonlFixSource::open(&path)
                .await
                .with_context(|| format!("Failed to open fix file {path}"))?;
            tokio::spawn(forward_fixes(replay, fix_tx));
        }
        None => {
            info!("reading_fixes_from_stdin");
            let replay = JsonlFixSource::from_reader(BufReader::new(tokio::io::stdin()));
            tokio::spawn(forward_fixes(replay, fix_tx));
        }
    }
    let started = ingestion.start(fix_source);
    anyhow::ensure!(started, "ingestion loop failed to start");

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = ingestion.join() => false,
    };
    if interrupted {
        info!("shutdown_signal_received");
        ingestion.stop().await;
    }

    let _ = shutdown_tx.send(true);
    for worker in workers {
        if let Err(e) = worker.await {
            error!(error = %e, "alert_worker_failed");
        }
    }

    if let Some(monitor) = ingestion.monitor() {
        log_session_summary(monitor);
    }
    metrics.report().log();

    info!("safezone-monitor shutdown complete");
    Ok(())
}

/// Push every replayed fix into the ingestion queue, waiting when it is full
async fn forward_fixes<S: LocationSource>(mut replay: S, tx: FixSender) {
    let mut forwarded = 0u64;
    while let Some(fix) = replay.next_fix().await {
        if tx.send(fix).await.is_err() {
            warn!(forwarded = %forwarded, "fix_queue_closed");
            return;
        }
        forwarded += 1;
    }
    info!(forwarded = %forwarded, "fix_provider_finished");
}

fn log_session_summary(monitor: &Monitor) {
    let excursions = monitor.history().excursions(DateTime::<Utc>::MIN_UTC);
    for excursion in &excursions {
        info!(
            started = %excursion.started_at,
            last_seen = %excursion.last_seen_at,
            returned = ?excursion.returned_at,
            duration_secs = %excursion.duration().num_seconds(),
            samples = %excursion.sample_count,
            "excursion"
        );
    }

    let state = monitor.state();
    info!(
        samples = %monitor.history().len(),
        excursions = %excursions.len(),
        is_safe = ?state.is_safe(),
        last_fix = ?state.last_fix_at(),
        last_safe = ?state.last_safe_at(),
        "session_summary"
    );
}
