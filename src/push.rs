use axum::async_trait;
use serde_json::json;

use crate::config::PushConfig;
use crate::response::{ServiceError, ServiceResult};

/// Push-notification fan-out to registered mobile clients.
#[async_trait]
pub trait PushClient: Send + Sync {
    async fn send_notification(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        image_url: Option<&str>,
    ) -> ServiceResult<()>;
}

/// FCM legacy HTTP API client.
pub struct FcmClient {
    http: reqwest::Client,
    server_key: String,
    endpoint: String,
}

impl FcmClient {
    pub fn new(cfg: &PushConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_key: cfg.server_key.clone(),
            endpoint: cfg.endpoint.clone(),
        }
    }
}

#[async_trait]
impl PushClient for FcmClient {
    async fn send_notification(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        image_url: Option<&str>,
    ) -> ServiceResult<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        let payload = json!({
            "registration_ids": tokens,
            "notification": {
                "title": title,
                "body": body,
                "image": image_url.unwrap_or(""),
            },
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::Push(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ServiceError::Push(format!(
                "fcm responded with {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
