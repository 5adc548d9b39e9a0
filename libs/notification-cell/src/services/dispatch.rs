// libs/notification-cell/src/services/dispatch.rs
use reqwest::Client;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::NotificationPayload;

/// Fire-and-forget notification dispatch. Delivery never blocks the calling
/// request and a failed send is logged, not propagated.
#[derive(Clone)]
pub struct NotificationService {
    client: Client,
    gateway_url: String,
    enabled: bool,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            gateway_url: config.sms_gateway_url.clone(),
            enabled: config.sms_enabled && !config.sms_gateway_url.is_empty(),
        }
    }

    /// Hand the payload off on a background task and return immediately.
    pub fn dispatch(&self, payload: NotificationPayload) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.deliver(&payload).await {
                warn!(
                    "Failed to deliver {:?} notification to {}: {}",
                    payload.notification_type, payload.recipient_phone, e
                );
            }
        });
    }

    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), String> {
        if !self.enabled {
            // Development stub: log instead of sending.
            info!(
                "[SMS STUB] {:?} to {} ({})",
                payload.notification_type, payload.recipient_phone, payload.recipient_name
            );
            return Ok(());
        }

        debug!(
            "Posting {:?} notification to gateway",
            payload.notification_type
        );

        let response = self
            .client
            .post(&self.gateway_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("gateway returned {}: {}", status, body));
        }

        Ok(())
    }
}
