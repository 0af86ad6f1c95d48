//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::error::RegistryError;
use crate::domain::types::{Coordinate, SafeZone, ZoneId};
use crate::services::history::DEFAULT_HISTORY_CAPACITY;
use crate::services::monitor::MonitorSettings;
use crate::services::transition_detector::DEFAULT_DEBOUNCE_SAMPLES;
use crate::services::wandering_detector::DEFAULT_WANDERING_THRESHOLD_SECS;
use anyhow::Context;
use chrono::TimeDelta;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Label attached to alert payloads and metrics
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "home".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Maximum samples retained in the location history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Consecutive samples needed to confirm a zone transition
    #[serde(default = "default_debounce_samples")]
    pub debounce_samples: u32,
    /// Time outside all safe zones before a wandering alert
    #[serde(default = "default_wandering_threshold_secs")]
    pub wandering_threshold_secs: i64,
    /// Bound of the fix queue between provider and ingestion loop
    #[serde(default = "default_fix_queue_size")]
    pub fix_queue_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            debounce_samples: default_debounce_samples(),
            wandering_threshold_secs: default_wandering_threshold_secs(),
            fix_queue_size: default_fix_queue_size(),
        }
    }
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_debounce_samples() -> u32 {
    DEFAULT_DEBOUNCE_SAMPLES
}

fn default_wandering_threshold_secs() -> i64 {
    DEFAULT_WANDERING_THRESHOLD_SECS
}

fn default_fix_queue_size() -> usize {
    256
}

/// Initial safe zone from the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneConfig {
    /// Stable ID; generated when omitted
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
    #[serde(default = "default_zone_active")]
    pub active: bool,
}

fn default_zone_active() -> bool {
    true
}

impl ZoneConfig {
    pub fn to_zone(&self) -> Result<SafeZone, RegistryError> {
        let id = self.id.as_deref().map(ZoneId::from).unwrap_or_else(ZoneId::generate);
        let center = Coordinate::new(self.lat, self.lon)?;
        Ok(SafeZone::new(id, &self.name, center, self.radius_m)?.with_active(self.active))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SourceConfig {
    /// JSONL fix file to replay; stdin when absent
    #[serde(default)]
    pub fixes_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertLogConfig {
    #[serde(default = "default_alert_log_enabled")]
    pub enabled: bool,
    /// File path for alert log (JSONL format)
    #[serde(default = "default_alert_log_file")]
    pub file: String,
}

impl Default for AlertLogConfig {
    fn default() -> Self {
        Self { enabled: default_alert_log_enabled(), file: default_alert_log_file() }
    }
}

fn default_alert_log_enabled() -> bool {
    true
}

fn default_alert_log_file() -> String {
    "alerts.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Topic for zone entry/exit alerts
    #[serde(default = "default_geofence_topic")]
    pub geofence_topic: String,
    /// Topic for wandering alerts
    #[serde(default = "default_wandering_topic")]
    pub wandering_topic: String,
    /// Publish attempts per alert before it is dropped
    #[serde(default = "default_mqtt_max_attempts")]
    pub max_attempts: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            geofence_topic: default_geofence_topic(),
            wandering_topic: default_wandering_topic(),
            max_attempts: default_mqtt_max_attempts(),
        }
    }
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_geofence_topic() -> String {
    "safezone/geofence".to_string()
}

fn default_wandering_topic() -> String {
    "safezone/wandering".to_string()
}

fn default_mqtt_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default)]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval(), prometheus_port: 0 }
    }
}

fn default_metrics_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Bound of each sink worker queue
    #[serde(default = "default_alert_queue_size")]
    pub queue_size: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { queue_size: default_alert_queue_size() }
    }
}

fn default_alert_queue_size() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub alert_log: AlertLogConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    history_capacity: usize,
    debounce_samples: u32,
    wandering_threshold_secs: i64,
    fix_queue_size: usize,
    zones: Vec<ZoneConfig>,
    fixes_file: Option<String>,
    alert_log_enabled: bool,
    alert_log_file: String,
    mqtt: MqttConfig,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    alert_queue_size: usize,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

const DEFAULT_CONFIG_PATH: &str = "config/dev.toml";

fn choose_config_path(cli: Option<&str>, env_path: Option<String>) -> String {
    cli.map(str::to_string)
        .or(env_path.filter(|p| !p.is_empty()))
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

impl Config {
    /// Determine config file path from the CLI flag or environment
    pub fn resolve_config_path(cli: Option<&str>) -> String {
        choose_config_path(cli, env::var("CONFIG_FILE").ok())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            site_id: toml_config.site.id,
            history_capacity: toml_config.monitor.history_capacity,
            debounce_samples: toml_config.monitor.debounce_samples,
            wandering_threshold_secs: toml_config.monitor.wandering_threshold_secs,
            fix_queue_size: toml_config.monitor.fix_queue_size,
            zones: toml_config.zones,
            fixes_file: toml_config.source.fixes_file,
            alert_log_enabled: toml_config.alert_log.enabled,
            alert_log_file: toml_config.alert_log.file,
            mqtt: toml_config.mqtt,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            alert_queue_size: toml_config.alerts.queue_size,
            config_file: config_file.to_string(),
        }
    }

    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(cli: Option<&str>) -> Self {
        Self::load_from_path(&Self::resolve_config_path(cli))
    }

    /// Engine tunables derived from this config
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            debounce_samples: self.debounce_samples,
            wandering_threshold: TimeDelta::seconds(self.wandering_threshold_secs.max(0)),
        }
    }

    /// Build the configured initial zones
    pub fn initial_zones(&self) -> Result<Vec<SafeZone>, RegistryError> {
        self.zones.iter().map(ZoneConfig::to_zone).collect()
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    pub fn debounce_samples(&self) -> u32 {
        self.debounce_samples
    }

    pub fn wandering_threshold_secs(&self) -> i64 {
        self.wandering_threshold_secs
    }

    pub fn fix_queue_size(&self) -> usize {
        self.fix_queue_size
    }

    pub fn zones(&self) -> &[ZoneConfig] {
        &self.zones
    }

    pub fn fixes_file(&self) -> Option<&str> {
        self.fixes_file.as_deref()
    }

    pub fn alert_log_enabled(&self) -> bool {
        self.alert_log_enabled
    }

    pub fn alert_log_file(&self) -> &str {
        &self.alert_log_file
    }

    pub fn mqtt_enabled(&self) -> bool {
        self.mqtt.enabled
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt.host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt.port
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt.username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt.password.as_deref()
    }

    pub fn mqtt_geofence_topic(&self) -> &str {
        &self.mqtt.geofence_topic
    }

    pub fn mqtt_wandering_topic(&self) -> &str {
        &self.mqtt.wandering_topic
    }

    pub fn mqtt_max_attempts(&self) -> u32 {
        self.mqtt.max_attempts
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn alert_queue_size(&self) -> usize {
        self.alert_queue_size
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the wandering threshold
    #[cfg(test)]
    pub fn with_wandering_threshold_secs(mut self, secs: i64) -> Self {
        self.wandering_threshold_secs = secs;
        self
    }
}
