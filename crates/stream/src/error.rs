//! Stream error taxonomy.
//!
//! Acquisition failures split into transient (retried with a bounded
//! budget) and fatal (terminate immediately). Publish and ack failures are
//! handled locally by the pipeline and never escalate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// Backend not ready yet; worth another bounded attempt.
    #[error("transient acquisition failure: {0}")]
    TransientAcquisition(String),

    /// Bad configuration, authorization failure, or retry budget exhausted.
    #[error("fatal acquisition failure: {0}")]
    FatalAcquisition(String),

    /// Downstream publish failed; the caller naks for redelivery.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Acknowledgement could not be delivered to the broker.
    #[error("ack failed: {0}")]
    Ack(String),

    /// The subscription's delivery stream failed.
    #[error("consume failed: {0}")]
    Consume(String),
}

impl StreamError {
    /// Whether the acquisition loop may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::TransientAcquisition(_))
    }
}

/// Markers of permanent failure in backend error text. Kept narrow:
/// "invalid" alone also shows up in transient broker-startup chatter
/// ("invalid session"), which must stay inside the retry budget.
const FATAL_MARKERS: &[&str] = &[
    "authorization",
    "authentication",
    "permissions violation",
    "invalid configuration",
    "invalid consumer",
    "invalid stream",
    "bad subject",
];

/// Classify a backend acquisition error by its message.
///
/// Anything not recognizably permanent is treated as transient: during a
/// cold start the broker may refuse connections, time out, or report the
/// stream as missing while it is still provisioning, and all of those must
/// land inside the bounded retry budget rather than kill the process.
pub fn classify_acquisition(message: impl Into<String>) -> StreamError {
    let message = message.into();
    let lowered = message.to_lowercase();

    if FATAL_MARKERS.iter().any(|m| lowered.contains(m)) {
        StreamError::FatalAcquisition(message)
    } else {
        StreamError::TransientAcquisition(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_errors_are_transient() {
        for msg in [
            "connection refused",
            "request timed out",
            "stream not found",
            "no responders available",
            "invalid session during startup",
        ] {
            let err = classify_acquisition(msg);
            assert!(err.is_retryable(), "{msg} should be transient");
        }
    }

    #[test]
    fn test_permanent_errors_are_fatal() {
        for msg in [
            "Authorization Violation",
            "authentication failure",
            "invalid consumer configuration",
        ] {
            let err = classify_acquisition(msg);
            assert!(!err.is_retryable(), "{msg} should be fatal");
            assert!(matches!(err, StreamError::FatalAcquisition(_)));
        }
    }

    #[test]
    fn test_unknown_errors_default_to_transient() {
        assert!(classify_acquisition("something odd happened").is_retryable());
    }
}
