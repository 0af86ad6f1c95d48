//! Prometheus metrics HTTP endpoint
//!
//! Exposes monitor metrics in Prometheus text format at /metrics and a
//! liveness probe at /health. Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use crate::services::history::LocationHistoryStore;
use crate::services::zone_registry::SafeZoneRegistry;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Shared handles read by the endpoint
#[derive(Clone)]
pub struct MetricsContext {
    pub metrics: Arc<Metrics>,
    pub registry: Arc<SafeZoneRegistry>,
    pub history: Arc<LocationHistoryStore>,
    pub site_id: Arc<str>,
}

enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, site: &str, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in METRICS_BUCKET_BOUNDS.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {}", avg * count);
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {count}");
}

fn format_prometheus_metrics(ctx: &MetricsContext) -> String {
    let summary = ctx.metrics.report();
    let site = &*ctx.site_id;
    let mut output = String::with_capacity(4096);

    write_fix_metrics(&mut output, site, &summary);
    write_alert_metrics(&mut output, site, &summary);

    write_metric(
        &mut output,
        "safezone_zones",
        "Configured safe zones",
        MetricType::Gauge,
        site,
        ctx.registry.len() as u64,
    );
    write_metric(
        &mut output,
        "safezone_zones_active",
        "Active safe zones",
        MetricType::Gauge,
        site,
        ctx.registry.active_count() as u64,
    );
    write_metric(
        &mut output,
        "safezone_history_samples",
        "Samples retained in location history",
        MetricType::Gauge,
        site,
        ctx.history.len() as u64,
    );

    output
}

fn write_fix_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(output, "safezone_fixes_total", "Fixes processed", MetricType::Counter, site, summary.fixes_total);
    write_metric(
        output,
        "safezone_fixes_rejected_total",
        "Fixes rejected for invalid coordinates",
        MetricType::Counter,
        site,
        summary.fixes_rejected,
    );
    write_metric(
        output,
        "safezone_fixes_safe_total",
        "Fixes classified inside a safe zone",
        MetricType::Counter,
        site,
        summary.fixes_safe,
    );
    let _ = writeln!(output, "# HELP safezone_fixes_per_sec Fixes processed per second");
    let _ = writeln!(output, "# TYPE safezone_fixes_per_sec gauge");
    let _ = writeln!(output, "safezone_fixes_per_sec{{site=\"{site}\"}} {:.2}", summary.fixes_per_sec);

    write_histogram(
        output,
        "safezone_fix_latency_us",
        "Per-fix processing latency in microseconds",
        site,
        &summary.lat_buckets,
        summary.avg_process_latency_us,
    );
    write_metric(
        output,
        "safezone_fix_latency_p99_us",
        "99th percentile fix latency",
        MetricType::Gauge,
        site,
        summary.lat_p99_us,
    );
}

fn write_alert_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "safezone_geofence_entered_total",
        "Zone entry events",
        MetricType::Counter,
        site,
        summary.geofence_entered,
    );
    write_metric(
        output,
        "safezone_geofence_exited_total",
        "Zone exit events",
        MetricType::Counter,
        site,
        summary.geofence_exited,
    );
    write_metric(
        output,
        "safezone_wandering_total",
        "Wandering alerts raised",
        MetricType::Counter,
        site,
        summary.wandering_total,
    );
    write_metric(
        output,
        "safezone_sink_failures_total",
        "Alert sink dispatch failures",
        MetricType::Counter,
        site,
        summary.sink_failures,
    );
    write_metric(
        output,
        "safezone_alerts_published_total",
        "Alerts published over MQTT",
        MetricType::Counter,
        site,
        summary.alerts_published,
    );
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    ctx: MetricsContext,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            format_prometheus_metrics(&ctx),
        ),
        (&Method::GET, "/health") => text_response(StatusCode::OK, "text/plain", "ok".to_string()),
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string()),
    };
    Ok(response)
}

/// Serve /metrics and /health until shutdown
pub async fn start_metrics_server(
    port: u16,
    ctx: MetricsContext,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, site = %ctx.site_id, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let ctx = ctx.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle_request(req, ctx.clone()));
                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Coordinate, SafeZone, ZoneId};

    fn context() -> MetricsContext {
        let zone = SafeZone::new(ZoneId::from("home"), "Home", Coordinate::new(0.0, 0.0).unwrap(), 100.0)
            .unwrap();
        MetricsContext {
            metrics: Arc::new(Metrics::new()),
            registry: Arc::new(SafeZoneRegistry::with_zones([zone]).unwrap()),
            history: Arc::new(LocationHistoryStore::new(10)),
            site_id: Arc::from("flat-3b"),
        }
    }

    #[test]
    fn test_format_prometheus_metrics() {
        let ctx = context();
        ctx.metrics.record_fix_processed(150, true);
        ctx.metrics.record_fix_processed(250, false);
        ctx.metrics.record_geofence(false);
        ctx.metrics.record_wandering();

        let output = format_prometheus_metrics(&ctx);

        assert!(output.contains("safezone_fixes_total{site=\"flat-3b\"} 2"));
        assert!(output.contains("safezone_fix_latency_us_bucket{site=\"flat-3b\",le=\"+Inf\"} 2"));
        assert!(output.contains("safezone_geofence_exited_total{site=\"flat-3b\"} 1"));
        assert!(output.contains("safezone_wandering_total{site=\"flat-3b\"} 1"));
        assert!(output.contains("safezone_zones{site=\"flat-3b\"} 1"));
        assert!(output.contains("safezone_history_samples{site=\"flat-3b\"} 0"));
    }

    #[test]
    fn test_text_response_headers() {
        let response = text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    }
}
