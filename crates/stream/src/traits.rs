//! Narrow capability interfaces over the messaging backend.
//!
//! The pipeline depends only on these traits, never on a concrete client
//! shape, so tests drive it with in-memory fakes and the JetStream types
//! stay confined to one module.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StreamError;

/// One delivered message with explicit acknowledgement control.
#[async_trait]
pub trait InboundMessage: Send + Sync {
    /// Raw message body.
    fn payload(&self) -> &[u8];

    /// Acknowledge successful (or terminally failed) processing.
    async fn ack(&self) -> Result<(), StreamError>;

    /// Negative-acknowledge: ask the broker to redeliver after `delay`.
    async fn nak(&self, delay: Duration) -> Result<(), StreamError>;
}

/// A live durable subscription yielding messages until closed.
#[async_trait]
pub trait Subscription: Send {
    /// Next delivered message; `None` when the subscription is closed.
    async fn next(&mut self) -> Option<Result<Box<dyn InboundMessage>, StreamError>>;
}

/// Outbound alert transport.
///
/// Must tolerate being called more than once for the same logical alert:
/// nak-driven redelivery makes duplicates an accepted trade-off of
/// at-least-once processing.
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), StreamError>;
}
