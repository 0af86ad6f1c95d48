//! MQTT publisher for alerts
//!
//! Pushes alerts to caregiver-facing topics:
//! - safezone/geofence - Zone entry/exit (QoS 1)
//! - safezone/wandering - Wandering alerts (QoS 1)
//!
//! A failed publish is retried a bounded number of times, then dropped.

use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::alert_channel::AlertMessage;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// MQTT publisher actor
pub struct MqttAlertPublisher {
    client: AsyncClient,
    rx: mpsc::Receiver<AlertMessage>,
    metrics: Arc<Metrics>,
    geofence_topic: String,
    wandering_topic: String,
    max_attempts: u32,
}

impl MqttAlertPublisher {
    /// Create the publisher and spawn its connection event loop
    pub fn new(config: &Config, rx: mpsc::Receiver<AlertMessage>, metrics: Arc<Metrics>) -> Self {
        let client_id = format!("safezone-{}-{}", config.site_id(), std::process::id());
        let mut mqttoptions = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
        mqttoptions.set_keep_alive(Duration::from_secs(30));
        mqttoptions.set_clean_session(true);

        if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
            mqttoptions.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, 100);

        tokio::spawn(async move {
            let mut eventloop = eventloop;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt_alerts_connected");
                    }
                    Ok(Event::Incoming(Packet::PubAck(_))) => {
                        debug!("mqtt_alerts_puback");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt_alerts_connection_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self {
            client,
            rx,
            metrics,
            geofence_topic: config.mqtt_geofence_topic().to_string(),
            wandering_topic: config.mqtt_wandering_topic().to_string(),
            max_attempts: config.mqtt_max_attempts().max(1),
        }
    }

    /// Publish alerts until shutdown, draining the queue on the way out
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            geofence = %self.geofence_topic,
            wandering = %self.wandering_topic,
            max_attempts = %self.max_attempts,
            "mqtt_alerts_started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("mqtt_alerts_shutdown");
                        while let Ok(msg) = self.rx.try_recv() {
                            self.publish_message(msg).await;
                        }
                        return;
                    }
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(msg) => self.publish_message(msg).await,
                        None => return,
                    }
                }
            }
        }
    }

    async fn publish_message(&self, msg: AlertMessage) {
        let topic = match msg {
            AlertMessage::Geofence(_) => &self.geofence_topic,
            AlertMessage::Wandering(_) => &self.wandering_topic,
        };
        let json = match msg.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(alert = %msg.as_str(), error = %e, "mqtt_alerts_serialize_failed");
                return;
            }
        };

        for attempt in 1..=self.max_attempts {
            match self.client.publish(topic, QoS::AtLeastOnce, false, json.as_bytes()).await {
                Ok(()) => {
                    self.metrics.record_alert_published();
                    debug!(topic = %topic, attempt = %attempt, "mqtt_alert_published");
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(topic = %topic, attempt = %attempt, error = %e, "mqtt_alert_retry");
                    tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                }
                Err(e) => {
                    error!(
                        topic = %topic,
                        attempts = %attempt,
                        alert = %msg.as_str(),
                        error = %e,
                        "mqtt_alert_dropped"
                    );
                }
            }
        }
    }
}
