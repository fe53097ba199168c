use std::time::Duration;

use axum::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{info, warn};

use crate::config::MqttConfig;
use crate::response::{ServiceError, ServiceResult};
use crate::util::random_alphanumeric;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Control-plane publish interface. The broker gives no delivery
/// guarantee to the gateway; success here only means the client
/// accepted the message.
#[async_trait]
pub trait MqttPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> ServiceResult<()>;
}

/// Process-wide MQTT client. Connected once at startup and shared
/// through `AppState`; `AsyncClient` is safe for concurrent publishes.
#[derive(Clone)]
pub struct Mqtt {
    client: AsyncClient,
}

impl Mqtt {
    pub fn connect(cfg: &MqttConfig) -> Self {
        let client_id = format!("edgefleet-{}", random_alphanumeric(8));
        let mut options = MqttOptions::new(client_id, &cfg.host, cfg.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            options.set_credentials(user.clone(), pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                        info!("mqtt connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt event loop error, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client }
    }
}

#[async_trait]
impl MqttPublisher for Mqtt {
    async fn publish(&self, topic: &str, payload: &str) -> ServiceResult<()> {
        let send = self
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload);
        match tokio::time::timeout(PUBLISH_TIMEOUT, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServiceError::Publish(e.to_string())),
            Err(_) => Err(ServiceError::Publish("publish timed out".into())),
        }
    }
}
