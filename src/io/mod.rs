//! IO modules - collaborator boundaries
//!
//! - `location_source` - Fix providers (channel, JSONL replay)
//! - `alert_channel` - Non-blocking alert sink and wire payloads
//! - `alert_log` - Alert output to file (JSONL format)
//! - `mqtt_egress` - MQTT publisher for alerts
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod alert_channel;
pub mod alert_log;
pub mod location_source;
pub mod mqtt_egress;
pub mod prometheus;

pub use alert_channel::{create_alert_channel, AlertMessage, AlertSender};
pub use alert_log::AlertLogWriter;
pub use location_source::{create_fix_channel, ChannelSource, FixSender, JsonlFixSource, LocationSource};
pub use mqtt_egress::MqttAlertPublisher;
