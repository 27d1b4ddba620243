//! Error types carried through produce and consume middleware chains.

use thiserror::Error;

/// Errors raised anywhere inside a middleware chain.
///
/// A chain never rewraps errors: whatever a unit returns reaches the caller of
/// `Dispatcher::handle` unchanged. Only the consumer loop and the producer
/// delivery guard decide whether an error is absorbed or propagated.
#[derive(Error, Debug)]
pub enum Error {
    /// Recoverable transport condition (poll timeout, end of partition).
    ///
    /// Reported to `Handler::warning`; never terminates a consumer.
    #[error("Kafka warning: {0}")]
    Warning(String),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Every flush attempt ran out without the broker acknowledging all
    /// outstanding records. Messages may have been lost.
    #[error("Was unable to flush after {attempts} attempts, messages might be lost")]
    DeliveryFailed { attempts: u32 },

    #[error("Schema registry error: {0}")]
    Registry(String),

    #[error("Schema registry has no schema for subject '{subject}'")]
    UnknownSubject { subject: String },

    #[error("Wire format error: {0}")]
    WireFormat(String),

    #[error("Avro error: {0}")]
    Avro(String),

    /// Failure raised by user handler or middleware code.
    #[error("Handler error: {0:#}")]
    Handler(#[from] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error is an expected, recoverable transport condition.
    pub fn is_warning(&self) -> bool {
        matches!(self, Error::Warning(_))
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_warning_is_warning() {
        assert!(Error::Warning("timed out".to_string()).is_warning());
        assert!(!Error::DeliveryFailed { attempts: 3 }.is_warning());
        assert!(!Error::Handler(anyhow::anyhow!("boom")).is_warning());
    }

    #[test]
    fn test_delivery_failure_message_mentions_loss() {
        let err = Error::DeliveryFailed { attempts: 10 };
        assert!(err.to_string().contains("messages might be lost"));
        assert!(err.to_string().contains("10"));
    }
}
