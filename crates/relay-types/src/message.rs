//! Inbound message types.
//!
//! A [`Message`] is built from the raw response of a broker poll. Building it
//! is also where transport errors get classified, so no middleware or handler
//! ever sees an unclassified broker error.

use chrono::{DateTime, Utc};
use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::{Message as RdkafkaMessage, OwnedMessage};
use tracing::debug;

use crate::error::{Error, Result};

/// A consumed Kafka message with metadata.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message payload, raw until a decoding middleware replaces it
    pub payload: Payload,
    /// Kafka topic name
    pub topic: String,
    /// Kafka partition number
    pub partition: i32,
    /// Kafka offset within the partition
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Message timestamp in milliseconds since epoch (if available)
    pub timestamp: Option<i64>,
}

/// Message payload variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Bytes exactly as they came off the wire
    Raw(Vec<u8>),
    /// Avro payload decoded from the subject+version framing
    Avro(AvroPayload),
    /// Message without a payload (compaction tombstone)
    Tombstone,
}

/// A decoded Avro payload together with the schema coordinates it was
/// written with.
#[derive(Debug, Clone, PartialEq)]
pub struct AvroPayload {
    pub subject: String,
    pub version: u32,
    pub value: apache_avro::types::Value,
}

impl Message {
    /// Build a message from the raw result of a broker poll.
    ///
    /// `None` means the poll timed out without a message. Timeouts and
    /// end-of-partition events become [`Error::Warning`]; any other transport
    /// error is returned as the fatal [`Error::Kafka`].
    pub fn from_response(response: Option<KafkaResult<OwnedMessage>>) -> Result<Self> {
        match response {
            None => Err(Error::Warning(
                "No message available within timeout".to_string(),
            )),
            Some(Ok(message)) => Ok(Self::from_owned(&message)),
            Some(Err(err)) => Err(classify(err)),
        }
    }

    fn from_owned(message: &OwnedMessage) -> Self {
        let payload = match message.payload() {
            Some(bytes) => Payload::Raw(bytes.to_vec()),
            None => Payload::Tombstone,
        };

        Self {
            payload,
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|k| k.to_vec()),
            timestamp: message.timestamp().to_millis(),
        }
    }

    /// Raw payload bytes, if the payload has not been decoded yet.
    pub fn raw_payload(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}

fn classify(err: KafkaError) -> Error {
    match err {
        KafkaError::PartitionEOF(partition) => {
            Error::Warning(format!("Reached end of partition {partition}"))
        }
        KafkaError::MessageConsumption(RDKafkaErrorCode::PartitionEOF) => {
            Error::Warning("Reached end of partition".to_string())
        }
        KafkaError::MessageConsumption(RDKafkaErrorCode::OperationTimedOut) => {
            Error::Warning("Consume timed out".to_string())
        }
        other => {
            debug!("Fatal transport error: {other}");
            Error::Kafka(other)
        }
    }
}
