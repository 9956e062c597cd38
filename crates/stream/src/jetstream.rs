//! NATS JetStream backend.
//!
//! Acquisition fetches the named durable pull consumer and creates it with
//! an explicit delivery policy when absent. Creation racing another
//! instance on the same durable name is expected: "already exists" is
//! treated as success followed by a re-fetch.

use std::time::Duration;

use async_nats::jetstream::{self, consumer::pull, AckKind};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info};

use crate::acquire::{acquire_with, AcquireConfig};
use crate::error::{classify_acquisition, StreamError};
use crate::traits::{AlertPublisher, InboundMessage, Subscription};

/// Everything needed to locate the durable subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub url: String,
    pub stream: String,
    pub filter_subject: String,
    pub durable_name: String,
    /// Redelivery bound; the broker stops redelivering past this count.
    pub max_deliver: i64,
    /// Time a handler may hold a message before the broker redelivers it.
    pub ack_wait: Duration,
}

fn consumer_config(config: &SubscriptionConfig) -> pull::Config {
    pull::Config {
        durable_name: Some(config.durable_name.clone()),
        filter_subject: config.filter_subject.clone(),
        deliver_policy: jetstream::consumer::DeliverPolicy::All,
        ack_policy: jetstream::consumer::AckPolicy::Explicit,
        ack_wait: config.ack_wait,
        max_deliver: config.max_deliver,
        ..Default::default()
    }
}

fn is_already_exists(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("already in use") || lowered.contains("already exists")
}

/// Connect and acquire the durable subscription under the bounded retry
/// budget. Returns the JetStream context (for publishing) alongside the
/// live subscription.
pub async fn acquire(
    config: &SubscriptionConfig,
    retry: &AcquireConfig,
) -> Result<(jetstream::Context, JetStreamSubscription), StreamError> {
    acquire_with(retry, || attempt_acquire(config)).await
}

async fn attempt_acquire(
    config: &SubscriptionConfig,
) -> Result<(jetstream::Context, JetStreamSubscription), StreamError> {
    let client = async_nats::connect(&config.url)
        .await
        .map_err(|e| classify_acquisition(format!("connect to {}: {e}", config.url)))?;
    let context = jetstream::new(client);

    let stream = context
        .get_stream(&config.stream)
        .await
        .map_err(|e| classify_acquisition(format!("get stream '{}': {e}", config.stream)))?;

    let consumer = match stream
        .get_consumer::<pull::Config>(&config.durable_name)
        .await
    {
        Ok(consumer) => {
            debug!(durable = %config.durable_name, "Durable consumer found");
            consumer
        }
        Err(_) => match stream.create_consumer(consumer_config(config)).await {
            Ok(consumer) => {
                info!(
                    durable = %config.durable_name,
                    stream = %config.stream,
                    max_deliver = config.max_deliver,
                    ack_wait_ms = config.ack_wait.as_millis() as u64,
                    "Durable consumer created"
                );
                consumer
            }
            Err(e) if is_already_exists(&e.to_string()) => {
                // Another instance won the create race; the consumer is there.
                debug!(durable = %config.durable_name, "Consumer create raced, re-fetching");
                stream
                    .get_consumer::<pull::Config>(&config.durable_name)
                    .await
                    .map_err(|e| {
                        classify_acquisition(format!(
                            "re-fetch consumer '{}': {e}",
                            config.durable_name
                        ))
                    })?
            }
            Err(e) => {
                return Err(classify_acquisition(format!(
                    "create consumer '{}': {e}",
                    config.durable_name
                )))
            }
        },
    };

    let messages = consumer
        .messages()
        .await
        .map_err(|e| classify_acquisition(format!("open message stream: {e}")))?;

    Ok((context, JetStreamSubscription { messages }))
}

// ── Subscription ────────────────────────────────────────────────────

/// Live durable pull subscription.
pub struct JetStreamSubscription {
    messages: pull::Stream,
}

#[async_trait]
impl Subscription for JetStreamSubscription {
    async fn next(&mut self) -> Option<Result<Box<dyn InboundMessage>, StreamError>> {
        match self.messages.next().await {
            Some(Ok(message)) => Some(Ok(Box::new(JetStreamMessage { inner: message }))),
            Some(Err(e)) => Some(Err(StreamError::Consume(e.to_string()))),
            None => None,
        }
    }
}

struct JetStreamMessage {
    inner: jetstream::Message,
}

#[async_trait]
impl InboundMessage for JetStreamMessage {
    fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    async fn ack(&self) -> Result<(), StreamError> {
        self.inner
            .ack()
            .await
            .map_err(|e| StreamError::Ack(e.to_string()))
    }

    async fn nak(&self, delay: Duration) -> Result<(), StreamError> {
        self.inner
            .ack_with(AckKind::Nak(Some(delay)))
            .await
            .map_err(|e| StreamError::Ack(e.to_string()))
    }
}

// ── Publisher ───────────────────────────────────────────────────────

/// JetStream-backed alert publisher.
pub struct JetStreamPublisher {
    context: jetstream::Context,
}

impl JetStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl AlertPublisher for JetStreamPublisher {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), StreamError> {
        let ack = self
            .context
            .publish(subject.to_string(), Bytes::from(payload))
            .await
            .map_err(|e| StreamError::Publish(e.to_string()))?;

        // Wait for the stream-level ack so a broker-side failure surfaces
        // as a publish failure, not a silent drop.
        ack.await.map_err(|e| StreamError::Publish(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_config_mapping() {
        let config = SubscriptionConfig {
            url: "nats://127.0.0.1:4222".to_string(),
            stream: "VITALS".to_string(),
            filter_subject: "patient.vitals.recorded".to_string(),
            durable_name: "vitalwatch-alerts".to_string(),
            max_deliver: 5,
            ack_wait: Duration::from_secs(30),
        };

        let cc = consumer_config(&config);
        assert_eq!(cc.durable_name.as_deref(), Some("vitalwatch-alerts"));
        assert_eq!(cc.filter_subject, "patient.vitals.recorded");
        assert_eq!(cc.max_deliver, 5);
        assert_eq!(cc.ack_wait, Duration::from_secs(30));
        assert!(matches!(cc.deliver_policy, jetstream::consumer::DeliverPolicy::All));
        assert!(matches!(cc.ack_policy, jetstream::consumer::AckPolicy::Explicit));
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists("consumer name already in use"));
        assert!(is_already_exists("Consumer Already Exists"));
        assert!(!is_already_exists("stream not found"));
    }
}
