use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer as RdkafkaConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::OwnedMessage;
use rdkafka::{Offset, TopicPartitionList};
use relay_types::{Message, Result, TopicConfig};

/// Broker primitives the consumer loop is built on.
pub trait ConsumerTransport {
    /// Wait up to `timeout` for the next message.
    ///
    /// `None` when the timeout elapsed without one. Errors are returned raw;
    /// classifying them is up to [`Message::from_response`].
    fn consume(&mut self, timeout: Duration) -> Option<KafkaResult<OwnedMessage>>;

    /// Commit `message` as processed.
    fn commit(&mut self, message: &Message, asynchronous: bool) -> Result<()>;
}

/// librdkafka-backed transport.
///
/// Without a configured partition the consumer subscribes to the topic and
/// lets the group coordinator assign partitions. With one it is assigned
/// that partition directly, starting at the configured offset or, if none,
/// at the committed offset.
pub struct KafkaConsumer {
    consumer: BaseConsumer,
}

impl KafkaConsumer {
    pub fn new(config: &TopicConfig) -> Result<Self> {
        let mut client_config = config.broker.client_config();
        set_default(&mut client_config, "group.id", &config.consumer_group);
        set_default(&mut client_config, "auto.offset.reset", &config.offset_reset);
        set_default(
            &mut client_config,
            "enable.auto.commit",
            &config.auto_commit.to_string(),
        );
        set_default(&mut client_config, "enable.partition.eof", "false");

        let consumer: BaseConsumer = client_config.create()?;

        match config.partition {
            None => {
                consumer.subscribe(&[&config.topic_id])?;
                tracing::info!(
                    "Subscribed to topic '{}' in group '{}'",
                    config.topic_id,
                    config.consumer_group
                );
            }
            Some(partition) => {
                let offset = config.offset.map(Offset::Offset).unwrap_or(Offset::Stored);
                let mut assignment = TopicPartitionList::new();
                assignment.add_partition_offset(&config.topic_id, partition, offset)?;
                consumer.assign(&assignment)?;
                tracing::info!(
                    "Assigned partition {partition} of topic '{}' at {offset:?}",
                    config.topic_id
                );
            }
        }

        Ok(Self { consumer })
    }

    /// Get the underlying consumer (for advanced use cases)
    pub fn inner(&self) -> &BaseConsumer {
        &self.consumer
    }
}

impl ConsumerTransport for KafkaConsumer {
    fn consume(&mut self, timeout: Duration) -> Option<KafkaResult<OwnedMessage>> {
        self.consumer
            .poll(timeout)
            .map(|result| result.map(|message| message.detach()))
    }

    fn commit(&mut self, message: &Message, asynchronous: bool) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;

        let mode = if asynchronous {
            CommitMode::Async
        } else {
            CommitMode::Sync
        };
        self.consumer.commit(&offsets, mode)?;
        Ok(())
    }
}

/// Set `key` unless the broker properties already did.
fn set_default(config: &mut ClientConfig, key: &str, value: &str) {
    if config.get(key).is_none() {
        config.set(key, value);
    }
}
