//! Publishes order events to NATS when a connection is configured.

use crate::domain::events::OrderEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    /// Best effort: failures are logged, never surfaced to the request.
    pub async fn publish(&self, events: Vec<OrderEvent>) {
        let Some(client) = &self.nats else {
            for event in &events {
                tracing::debug!(event = event.name(), "NATS disabled, dropping order event");
            }
            return;
        };
        for event in events {
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, event = event.name(), "Failed to encode order event");
                    continue;
                }
            };
            if let Err(e) = client.publish(event.subject(), payload.into()).await {
                tracing::warn!(error = %e, subject = %event.subject(), "Failed to publish order event");
            }
        }
    }
}
