//! Per-message orchestration: parse → validate → evaluate → publish →
//! ack/nak.
//!
//! Failure classification is strict. Unparseable or schema-invalid
//! messages can never succeed on redelivery, so they are acknowledged
//! immediately; retrying them would be a poison loop. Publish failure is
//! the single retried class: it is nak'd with a fixed delay and bounded by
//! the subscription's max-deliver setting, after which the broker stops
//! redelivering.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Notify, Semaphore};
use tracing::{error, info, warn};

use vitalwatch_core::{extract_sample, AlertEvent, ALERT_RAISED, VITALS_RECORDED};
use vitalwatch_engine::ThresholdEngine;
use vitalwatch_schema::Validator;
use vitalwatch_stream::{AlertPublisher, InboundMessage, Subscription};

use crate::state::Counters;

/// Consumes a subscription for its lifetime with a bounded concurrency
/// window; returns only when the subscription closes or shutdown is
/// requested, after draining in-flight handlers.
pub struct MessagePipeline {
    handler: Handler,
    max_in_flight: usize,
}

impl MessagePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<ThresholdEngine>,
        validator: Arc<dyn Validator>,
        publisher: Arc<dyn AlertPublisher>,
        counters: Arc<Counters>,
        alert_subject: String,
        nak_delay: Duration,
        max_in_flight: usize,
    ) -> Self {
        Self {
            handler: Handler {
                engine,
                validator,
                publisher,
                counters,
                alert_subject,
                nak_delay,
            },
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Drive the subscription until it closes or `shutdown` fires.
    pub async fn run(&self, mut subscription: Box<dyn Subscription>, shutdown: Arc<Notify>) {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let shutdown_signal = shutdown.notified();
        tokio::pin!(shutdown_signal);

        info!(max_in_flight = self.max_in_flight, "Message pipeline started");

        loop {
            // Take a concurrency permit before pulling the next message so
            // at most `max_in_flight` handlers ever run at once.
            let permit = tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Pipeline shutdown requested");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => {
                    match permit {
                        Ok(p) => p,
                        Err(_) => break,
                    }
                }
            };

            let next = tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Pipeline shutdown requested");
                    break;
                }
                next = subscription.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        handler.handle(message.as_ref()).await;
                        drop(permit);
                    });
                }
                Some(Err(e)) => {
                    warn!("Subscription delivery error: {}", e);
                }
                None => {
                    info!("Subscription closed");
                    break;
                }
            }
        }

        // Drain: in-flight handlers complete naturally before the caller
        // releases the underlying connection.
        let _ = semaphore.acquire_many(self.max_in_flight as u32).await;
        info!("Message pipeline drained");
    }
}

// ── Per-message handler ─────────────────────────────────────────────

#[derive(Clone)]
struct Handler {
    engine: Arc<ThresholdEngine>,
    validator: Arc<dyn Validator>,
    publisher: Arc<dyn AlertPublisher>,
    counters: Arc<Counters>,
    alert_subject: String,
    nak_delay: Duration,
}

impl Handler {
    async fn handle(&self, message: &dyn InboundMessage) {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        // 1. Parse. A malformed body never becomes parseable on retry.
        let value: Value = match serde_json::from_slice(message.payload()) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Dropping unparseable message");
                self.drop_invalid(message).await;
                return;
            }
        };

        // 2. Validate the pre-unwrap value against the inbound schema.
        let validation = self.validator.validate(VITALS_RECORDED, &value);
        if !validation.valid {
            warn!(errors = ?validation.errors, "Dropping schema-invalid message");
            self.drop_invalid(message).await;
            return;
        }

        // 3. Envelope unwrap (or the raw value itself).
        let sample = match extract_sample(&value) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "Dropping message with undecodable sample");
                self.drop_invalid(message).await;
                return;
            }
        };

        self.counters.validated.fetch_add(1, Ordering::Relaxed);

        // 4. Evaluate.
        let decision = self.engine.evaluate(&sample);
        let (Some(severity), Some(action)) = (decision.severity, decision.suggested_action) else {
            // No alert warranted.
            self.ack(message).await;
            return;
        };

        // 5. Build and check the outbound event. A failure here means we
        // built an event our own schema rejects: a programming defect,
        // logged and dropped, never retried.
        let event = AlertEvent::new(&sample, severity, decision.reasons, action);
        let event_value = match serde_json::to_value(&event) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "Failed to serialize alert event, dropping alert");
                self.ack(message).await;
                return;
            }
        };
        let outbound = self.validator.validate(ALERT_RAISED, &event_value);
        if !outbound.valid {
            error!(
                errors = ?outbound.errors,
                patient_id = %sample.patient_id,
                "Outbound alert failed schema validation, dropping alert"
            );
            self.ack(message).await;
            return;
        }

        // 6. Publish; this is the only retried failure class.
        match self
            .publisher
            .publish(&self.alert_subject, event_value.to_string().into_bytes())
            .await
        {
            Ok(()) => {
                self.counters.alerts_published.fetch_add(1, Ordering::Relaxed);
                info!(
                    patient_id = %sample.patient_id,
                    severity = %severity,
                    event_id = %event.event_id,
                    "Alert published"
                );
                self.ack(message).await;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    patient_id = %sample.patient_id,
                    "Publish failed, nak for redelivery in {:?}",
                    self.nak_delay
                );
                self.counters.dropped_publish_fail.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = message.nak(self.nak_delay).await {
                    warn!("Failed to nak: {}", e);
                }
            }
        }
    }

    async fn drop_invalid(&self, message: &dyn InboundMessage) {
        self.counters.dropped_invalid.fetch_add(1, Ordering::Relaxed);
        self.ack(message).await;
    }

    async fn ack(&self, message: &dyn InboundMessage) {
        if let Err(e) = message.ack().await {
            warn!("Failed to ack: {}", e);
        }
    }
}
