//! NotificationSender processor.
//!
//! The NotificationSender is responsible for:
//! - Receiving `LifecycleEvent` from the queue
//! - Signing the event payload with the notifier secret
//! - POSTing it to the notification collaborator
//! - Retrying failed deliveries with exponential backoff (2^0 to 2^11 seconds)
//!
//! Each event is delivered on its own task so a slow or failing endpoint
//! never holds up later events. Delivery is at-least-once; receivers dedupe
//! on the `Hireloop-Event-Id` header.

use crate::config::{ConfigStore, NotifierConfig};
use crate::events::{LifecycleEvent, LifecycleEventReceiver};
use crate::utils::backoff::calculate_retry_delay;
use hireloop_sdk::objects::LifecycleEventPayload;
use hireloop_sdk::signature::{EVENT_ID_HEADER, SIGNATURE_HEADER, SignedObject};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Errors that can occur during notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-2xx status
    #[error("notification delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    /// Payload serialization error
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// NotificationSender delivers lifecycle events to the notification
/// collaborator.
pub struct NotificationSender {
    events_rx: LifecycleEventReceiver,
    shutdown_rx: watch::Receiver<bool>,
    config: ConfigStore<NotifierConfig>,
    http_client: reqwest::Client,
}

impl NotificationSender {
    /// Create a new NotificationSender.
    ///
    /// # Arguments
    ///
    /// * `events_rx` - Receiver for LifecycleEvent events
    /// * `shutdown_rx` - Receiver for shutdown signal
    /// * `config` - Notifier section, re-read before every attempt
    pub fn new(
        events_rx: LifecycleEventReceiver,
        shutdown_rx: watch::Receiver<bool>,
        config: ConfigStore<NotifierConfig>,
    ) -> Self {
        Self {
            events_rx,
            shutdown_rx,
            config,
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Run the NotificationSender until shutdown or until every emitter is
    /// gone.
    pub async fn run(mut self) {
        info!("NotificationSender started");
        let mut deliveries = JoinSet::new();

        let shutting_down = loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("NotificationSender received shutdown signal");
                        break true;
                    }
                }

                event = self.events_rx.recv() => {
                    let Some(event) = event else {
                        info!("LifecycleEvent channel closed");
                        break false;
                    };
                    debug!(event_id = %event.event_id, transition = %event.transition, "Received LifecycleEvent");
                    let http_client = self.http_client.clone();
                    let config = self.config.clone();
                    deliveries.spawn(async move {
                        // Failures are logged inside; nothing left to do with them here.
                        let _ = deliver(&http_client, &config, &event).await;
                    });
                }

                Some(joined) = deliveries.join_next(), if !deliveries.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Notification delivery task failed");
                    }
                }
            }
        };

        if shutting_down && !deliveries.is_empty() {
            warn!(pending = deliveries.len(), "Abandoning in-flight notifications");
            deliveries.abort_all();
        }
        while deliveries.join_next().await.is_some() {}

        info!("NotificationSender shutdown complete");
    }
}

/// Deliver one event, retrying until it is accepted or the configured
/// attempt limit is reached.
pub async fn deliver(
    http_client: &reqwest::Client,
    config: &ConfigStore<NotifierConfig>,
    event: &LifecycleEvent,
) -> Result<(), NotifyError> {
    let payload = event.to_payload();
    let mut attempt: u32 = 0;

    loop {
        let notifier = config.snapshot().await;
        let Some(url) = &notifier.url else {
            info!(
                event_id = %event.event_id,
                request_id = %event.request_id,
                transition = %event.transition,
                "No notifier URL configured, event logged only"
            );
            return Ok(());
        };

        match send_notification(http_client, url, notifier.secret_bytes(), &payload).await {
            Ok(()) => {
                info!(
                    event_id = %event.event_id,
                    request_id = %event.request_id,
                    transition = %event.transition,
                    attempt = attempt + 1,
                    "Notification delivered"
                );
                return Ok(());
            }
            Err(e) => {
                attempt += 1;
                if attempt >= notifier.max_attempts.max(1) {
                    error!(
                        event_id = %event.event_id,
                        request_id = %event.request_id,
                        error = %e,
                        attempts = attempt,
                        "Notification dropped after final attempt"
                    );
                    return Err(e);
                }
                let delay = calculate_retry_delay(attempt - 1);
                warn!(
                    event_id = %event.event_id,
                    request_id = %event.request_id,
                    error = %e,
                    retry_count = attempt,
                    ?delay,
                    "Notification delivery failed"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Send the signed HTTP request once.
async fn send_notification(
    http_client: &reqwest::Client,
    url: &Url,
    secret: &[u8],
    payload: &LifecycleEventPayload,
) -> Result<(), NotifyError> {
    // Signed per attempt so the timestamp stays fresh across long backoffs.
    let signed = SignedObject::new(payload.clone(), secret)?;

    let response = http_client
        .post(url.clone())
        .header("Content-Type", "application/json")
        .header(SIGNATURE_HEADER, signed.to_header())
        .header(EVENT_ID_HEADER, payload.event_id.to_string())
        .body(signed.json)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::DeliveryFailed {
            status: status.as_u16(),
            body,
        })
    }
}
