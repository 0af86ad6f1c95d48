//! Integration tests for configuration loading

use chrono::TimeDelta;
use safezone_monitor::domain::ZoneId;
use safezone_monitor::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[site]
id = "flat-3b"

[monitor]
history_capacity = 500
debounce_samples = 2
wandering_threshold_secs = 900
fix_queue_size = 32

[[zones]]
id = "home"
name = "Home"
lat = 51.5007
lon = -0.1246
radius_m = 150.0

[[zones]]
name = "Park"
lat = 51.5027
lon = -0.1280
radius_m = 250.0
active = false

[source]
fixes_file = "fixes.jsonl"

[alert_log]
file = "out/alerts.jsonl"

[mqtt]
enabled = true
host = "broker.local"
port = 8883
username = "carer"
password = "secret"
max_attempts = 5

[metrics]
interval_secs = 15
prometheus_port = 9091

[alerts]
queue_size = 64
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "flat-3b");
    assert_eq!(config.history_capacity(), 500);
    assert_eq!(config.fix_queue_size(), 32);
    assert_eq!(config.fixes_file(), Some("fixes.jsonl"));
    assert!(config.alert_log_enabled());
    assert_eq!(config.alert_log_file(), "out/alerts.jsonl");
    assert!(config.mqtt_enabled());
    assert_eq!(config.mqtt_host(), "broker.local");
    assert_eq!(config.mqtt_port(), 8883);
    assert_eq!(config.mqtt_username(), Some("carer"));
    assert_eq!(config.mqtt_max_attempts(), 5);
    assert_eq!(config.mqtt_wandering_topic(), "safezone/wandering");
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.prometheus_port(), 9091);
    assert_eq!(config.alert_queue_size(), 64);

    let settings = config.monitor_settings();
    assert_eq!(settings.debounce_samples, 2);
    assert_eq!(settings.wandering_threshold, TimeDelta::minutes(15));

    let zones = config.initial_zones().unwrap();
    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0].id(), &ZoneId::from("home"));
    assert!(zones[0].is_active());
    assert_eq!(zones[1].name(), "Park");
    assert!(!zones[1].is_active());
}

#[test]
fn test_partial_config_uses_defaults() {
    let temp_file = write_config("[monitor]\nwandering_threshold_secs = 60\n");
    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "home");
    assert_eq!(config.history_capacity(), 1000);
    assert_eq!(config.wandering_threshold_secs(), 60);
    assert!(config.zones().is_empty());
    assert!(!config.mqtt_enabled());
}

#[test]
fn test_invalid_zone_rejected() {
    let temp_file = write_config(
        r#"
[[zones]]
name = "Nowhere"
lat = 95.0
lon = 0.0
radius_m = 100.0
"#,
    );
    let config = Config::from_file(temp_file.path()).unwrap();
    assert!(config.initial_zones().is_err());
}

#[test]
fn test_malformed_toml_is_error() {
    let temp_file = write_config("[monitor\nhistory_capacity = ");
    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.config_file(), "default");
    assert_eq!(config.mqtt_host(), "localhost");
    assert_eq!(config.mqtt_port(), 1883);
    assert_eq!(config.wandering_threshold_secs(), 1800);
}
