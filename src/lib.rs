//! kafka-relay Library
//!
//! Produce and consume Kafka records through ordered middleware chains, with
//! optional Avro payloads framed by schema subject and version.
//!
//! # Crates
//!
//! - `relay_types` - records, messages, errors and the `TopicConfig` value object
//! - `relay_middleware` - the middleware chain shared by both directions
//! - `relay_avro` - schema registry client and the subject+version wire format
//! - `kafka_relay_producer` - producer with bounded delivery guarantees
//! - `kafka_relay_consumer` - resilient consume loop
//!
//! # CLI Usage
//!
//! ```bash
//! # Produce stdin lines to a topic, waiting for broker acknowledgment
//! kafka-relay produce --brokers localhost:9092 --topic orders --required-acknowledgment
//!
//! # Produce JSON lines as Avro
//! kafka-relay produce --brokers localhost:9092 --topic orders \
//!   --schema-file order.avsc --registry-url http://localhost:8081
//!
//! # Consume and log messages until Ctrl-C
//! kafka-relay consume --brokers localhost:9092 --topic orders --consumer-group audit
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Args, Parser};

pub mod config;
pub mod consume;
pub mod produce;

pub use kafka_relay_consumer as consumer;
pub use kafka_relay_producer as producer;
pub use relay_avro as avro;
pub use relay_middleware as middleware;
pub use relay_types as types;

use config::{parse_duration_to_millis, parse_key_value};
use relay_types::config::{AvroSchemaConfig, BasicAuth};
use relay_types::{BrokerConfig, TopicConfig};

#[derive(Args, Clone, Debug)]
pub struct BrokerOpts {
    /// Kafka brokers (comma-separated or multiple --brokers)
    #[arg(long, value_delimiter = ',', required = true, env = "KAFKA_BROKERS")]
    pub brokers: Vec<String>,

    /// Extra librdkafka property, e.g. --property security.protocol=SASL_SSL
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub properties: Vec<(String, String)>,
}

#[derive(Args, Clone, Debug)]
pub struct TopicOpts {
    /// Topic to produce to or consume from
    #[arg(long, env = "KAFKA_TOPIC")]
    pub topic: String,

    #[command(flatten)]
    pub broker: BrokerOpts,

    /// Handler identifier recorded in the topic configuration
    #[arg(long, default_value = "log")]
    pub handler: String,

    /// Partition to pin to (default: any partition)
    #[arg(long)]
    pub partition: Option<i32>,

    /// Broker operation timeout ("1500", "1500ms", "2s")
    #[arg(long, default_value = "1000ms")]
    pub timeout: String,
}

impl TopicOpts {
    /// Topic configuration with the defaults every command starts from.
    pub fn topic_config(&self) -> anyhow::Result<TopicConfig> {
        let mut broker = BrokerConfig::new(self.broker.brokers.iter().cloned());
        for (key, value) in &self.broker.properties {
            broker = broker.with_property(key.clone(), value.clone());
        }

        let mut config = TopicConfig::new(self.topic.clone(), broker, self.handler.clone());
        config.partition = self.partition;
        config.timeout_ms = parse_duration_to_millis(&self.timeout)
            .with_context(|| format!("Invalid timeout format: {}", self.timeout))?;
        Ok(config)
    }
}

#[derive(Args, Clone, Debug)]
pub struct DeliveryOpts {
    /// Run the flush routine after every record
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub is_async: bool,

    /// Wait for the broker to acknowledge records when flushing
    #[arg(long)]
    pub required_acknowledgment: bool,

    /// Records between two drains of the outbound queue
    #[arg(long, default_value_t = 500)]
    pub max_poll_records: u64,

    /// Flush attempts before records are reported as possibly lost
    #[arg(long, default_value_t = 10)]
    pub flush_attempts: u32,
}

impl DeliveryOpts {
    pub fn apply(&self, config: &mut TopicConfig) {
        config.is_async = self.is_async;
        config.required_acknowledgment = self.required_acknowledgment;
        config.max_poll_records = self.max_poll_records;
        config.flush_attempts = self.flush_attempts;
    }
}

#[derive(Args, Clone, Debug)]
pub struct ConsumeOpts {
    /// Consumer group ID
    #[arg(long, default_value = "default", env = "KAFKA_CONSUMER_GROUP")]
    pub consumer_group: String,

    /// Where to start without a committed offset (smallest/earliest, largest/latest)
    #[arg(long, default_value = "smallest")]
    pub offset_reset: String,

    /// Start offset, only used together with --partition
    #[arg(long, requires = "partition")]
    pub offset: Option<i64>,

    /// Let librdkafka commit offsets on its own
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub auto_commit: bool,

    /// Commit asynchronously when committing manually
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub commit_async: bool,
}

impl ConsumeOpts {
    pub fn apply(&self, config: &mut TopicConfig) {
        config.consumer_group = self.consumer_group.clone();
        config.offset_reset = self.offset_reset.clone();
        config.offset = self.offset;
        config.auto_commit = self.auto_commit;
        config.commit_async = self.commit_async;
    }
}

#[derive(Args, Clone, Debug, Default)]
pub struct RegistryOpts {
    /// Schema registry URL
    #[arg(long, env = "SCHEMA_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Skip TLS certificate verification for the schema registry
    #[arg(long)]
    pub registry_insecure: bool,

    /// Schema registry username (basic auth)
    #[arg(long, env = "SCHEMA_REGISTRY_USERNAME")]
    pub registry_username: Option<String>,

    /// Schema registry password (basic auth)
    #[arg(long, env = "SCHEMA_REGISTRY_PASSWORD")]
    pub registry_password: Option<String>,

    /// Extra header sent to the schema registry
    #[arg(long = "registry-header", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub registry_headers: Vec<(String, String)>,

    /// Schema registry request timeout ("500ms", "10s")
    #[arg(long)]
    pub registry_timeout: Option<String>,
}

impl RegistryOpts {
    /// Registry settings, if a registry URL was given.
    pub fn schema_config(&self) -> anyhow::Result<Option<AvroSchemaConfig>> {
        let Some(url) = &self.registry_url else {
            return Ok(None);
        };

        let mut config = AvroSchemaConfig::new(url.clone());
        config.ssl_verify = !self.registry_insecure;
        config.request_options.headers = self.registry_headers.iter().cloned().collect();
        config.request_options.basic_auth =
            self.registry_username.as_ref().map(|username| BasicAuth {
                username: username.clone(),
                password: self.registry_password.clone(),
            });
        config.request_options.timeout_ms = self
            .registry_timeout
            .as_deref()
            .map(parse_duration_to_millis)
            .transpose()
            .context("Invalid schema registry timeout")?;

        Ok(Some(config))
    }
}

/// Arguments of `kafka-relay produce`.
#[derive(Parser, Clone, Debug)]
pub struct ProduceArgs {
    #[command(flatten)]
    pub topic: TopicOpts,

    #[command(flatten)]
    pub delivery: DeliveryOpts,

    #[command(flatten)]
    pub registry: RegistryOpts,

    /// Key attached to every record
    #[arg(long)]
    pub key: Option<String>,

    /// Avro schema (.avsc) to encode the JSON input lines with
    #[arg(long, requires = "registry_url")]
    pub schema_file: Option<PathBuf>,

    /// Registry subject (default: "<topic>-value")
    #[arg(long)]
    pub subject: Option<String>,
}

impl ProduceArgs {
    pub fn topic_config(&self) -> anyhow::Result<TopicConfig> {
        let mut config = self.topic.topic_config()?;
        self.delivery.apply(&mut config);
        config.avro_schema = self.registry.schema_config()?;
        config.validate()?;
        Ok(config)
    }
}

/// Arguments of `kafka-relay consume`.
#[derive(Parser, Clone, Debug)]
pub struct ConsumeArgs {
    #[command(flatten)]
    pub topic: TopicOpts,

    #[command(flatten)]
    pub consume: ConsumeOpts,

    #[command(flatten)]
    pub registry: RegistryOpts,

    /// Stop after handling this many messages
    #[arg(long)]
    pub max_messages: Option<u64>,
}

impl ConsumeArgs {
    pub fn topic_config(&self) -> anyhow::Result<TopicConfig> {
        let mut config = self.topic.topic_config()?;
        self.consume.apply(&mut config);
        config.avro_schema = self.registry.schema_config()?;
        config.validate()?;
        Ok(config)
    }
}
