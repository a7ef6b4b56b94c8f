//! Order event publishers

use async_trait::async_trait;
use tracing::info;

use crate::application::ports::EventPublisher;
use crate::domain::events::OrderEvent;

/// Writes every event to the log; the default when no message bus is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: &OrderEvent) -> anyhow::Result<()> {
        info!(order_id = %event.order_id(), event = event.name(), payload = %serde_json::to_string(event)?, "order event");
        Ok(())
    }
}

/// Publishes JSON events to `<prefix>.<event name>`.
#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self { Self { client, prefix: prefix.into() } }

    pub fn subject_for(prefix: &str, event: &OrderEvent) -> String { format!("{prefix}.{}", event.name()) }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &OrderEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client.publish(Self::subject_for(&self.prefix, event), payload.into()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OrderId;
    use chrono::Utc;

    #[test]
    fn test_subject_naming() {
        let event = OrderEvent::PaymentRecorded { order_id: OrderId::generate(), at: Utc::now() };
        assert_eq!(NatsPublisher::subject_for("orders", &event), "orders.payment_recorded");
    }

    #[tokio::test]
    async fn test_tracing_publisher_never_fails() {
        let event = OrderEvent::PaymentRecorded { order_id: OrderId::generate(), at: Utc::now() };
        assert!(TracingPublisher.publish(&event).await.is_ok());
    }
}
