//! Topic configuration.
//!
//! [`TopicConfig`] is passed explicitly into every producer, consumer and
//! middleware constructor. Nothing in the pipeline reads configuration from
//! ambient state.

use std::collections::BTreeMap;
use std::time::Duration;

use rdkafka::ClientConfig;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Offset reset values librdkafka accepts for `auto.offset.reset`.
const OFFSET_RESET_VALUES: &[&str] = &[
    "smallest",
    "earliest",
    "beginning",
    "largest",
    "latest",
    "end",
    "error",
];

/// Configuration for one topic handler, shared by the produce and consume
/// paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Topic to produce to or consume from
    pub topic_id: String,
    /// Broker connection descriptor
    pub broker: BrokerConfig,
    /// Name of the handler bound to this topic (used in logs)
    pub handler: String,
    /// Partition to produce to or consume from; `None` means any partition
    pub partition: Option<i32>,
    /// Consumer group ID
    pub consumer_group: String,
    /// Schema registry settings, when payloads are Avro encoded
    pub avro_schema: Option<AvroSchemaConfig>,
    /// How long a single poll, consume or flush call may block
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    /// Flush after every produced record instead of polling in batches
    pub is_async: bool,
    /// Require the broker to acknowledge deliveries when flushing
    pub required_acknowledgment: bool,
    /// Number of produced records between two outbound-queue drains
    pub max_poll_records: u64,
    /// Number of flush calls before a delivery is declared failed
    pub flush_attempts: u32,
    /// Let librdkafka commit offsets on its own
    pub auto_commit: bool,
    /// Commit asynchronously when committing manually
    pub commit_async: bool,
    /// Where to start when the group has no committed offset
    pub offset_reset: String,
    /// Start offset when a partition is assigned explicitly
    pub offset: Option<i64>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            topic_id: String::new(),
            broker: BrokerConfig::default(),
            handler: String::new(),
            partition: None,
            consumer_group: "default".to_string(),
            avro_schema: None,
            timeout_ms: 1000,
            is_async: true,
            required_acknowledgment: false,
            max_poll_records: 500,
            flush_attempts: 10,
            auto_commit: true,
            commit_async: true,
            offset_reset: "smallest".to_string(),
            offset: None,
        }
    }
}

impl TopicConfig {
    pub fn new(topic_id: impl Into<String>, broker: BrokerConfig, handler: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            broker,
            handler: handler.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Subject Avro payloads of this topic are registered under.
    pub fn value_subject(&self) -> String {
        format!("{}-value", self.topic_id)
    }

    /// Check the configuration before any client is created.
    pub fn validate(&self) -> Result<()> {
        if self.topic_id.is_empty() {
            return Err(Error::InvalidConfig("topic_id must not be empty".to_string()));
        }
        if self.broker.connections.is_empty() {
            return Err(Error::InvalidConfig(
                "broker connections must not be empty".to_string(),
            ));
        }
        if self.max_poll_records == 0 {
            return Err(Error::InvalidConfig(
                "max_poll_records must be greater than zero".to_string(),
            ));
        }
        if self.flush_attempts == 0 {
            return Err(Error::InvalidConfig(
                "flush_attempts must be greater than zero".to_string(),
            ));
        }
        if !OFFSET_RESET_VALUES.contains(&self.offset_reset.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "unknown offset_reset '{}', expected one of {OFFSET_RESET_VALUES:?}",
                self.offset_reset
            )));
        }
        if let Some(partition) = self.partition {
            if partition < 0 {
                return Err(Error::InvalidConfig(format!(
                    "partition must not be negative, got {partition}"
                )));
            }
        }
        Ok(())
    }
}

/// Broker connection descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Bootstrap servers, e.g. `["localhost:9092"]`
    pub connections: Vec<String>,
    /// Extra librdkafka properties (SASL/SSL authentication and the like)
    pub properties: BTreeMap<String, String>,
}

impl BrokerConfig {
    pub fn new<I, S>(connections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            connections: connections.into_iter().map(Into::into).collect(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn bootstrap_servers(&self) -> String {
        self.connections.join(",")
    }

    /// Build a librdkafka client configuration pointing at these brokers.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", self.bootstrap_servers());
        for (key, value) in &self.properties {
            config.set(key, value);
        }
        config
    }
}

/// Schema registry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AvroSchemaConfig {
    /// Registry base URL, e.g. `http://schema-registry:8081`
    pub url: String,
    /// Verify the registry's TLS certificate
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
    /// Headers, authentication and timeout applied to every registry request
    #[serde(default)]
    pub request_options: RequestOptions,
}

fn default_ssl_verify() -> bool {
    true
}

impl AvroSchemaConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ssl_verify: true,
            request_options: RequestOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub headers: BTreeMap<String, String>,
    pub basic_auth: Option<BasicAuth>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TopicConfig {
        TopicConfig::new("orders", BrokerConfig::new(["localhost:9092"]), "orders-handler")
    }

    #[test]
    fn test_defaults() {
        let config = valid();
        assert_eq!(config.partition, None);
        assert_eq!(config.consumer_group, "default");
        assert_eq!(config.timeout(), Duration::from_millis(1000));
        assert!(config.is_async);
        assert!(!config.required_acknowledgment);
        assert_eq!(config.max_poll_records, 500);
        assert_eq!(config.flush_attempts, 10);
        assert!(config.auto_commit);
        assert!(config.commit_async);
        assert_eq!(config.offset_reset, "smallest");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_value_subject() {
        assert_eq!(valid().value_subject(), "orders-value");
    }

    #[test]
    fn test_validate_rejects_zero_counters() {
        let config = TopicConfig {
            max_poll_records: 0,
            ..valid()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = TopicConfig {
            flush_attempts: 0,
            ..valid()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_offset_reset() {
        let config = TopicConfig {
            offset_reset: "sometimes".to_string(),
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn test_validate_requires_topic_and_brokers() {
        assert!(TopicConfig::default().validate().is_err());
        let config = TopicConfig::new("orders", BrokerConfig::default(), "h");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: TopicConfig = serde_json::from_str(
            r#"{
                "topic_id": "orders",
                "broker": {"connections": ["kafka:9092"], "properties": {"security.protocol": "SASL_SSL"}},
                "handler": "orders-handler",
                "timeout": 250,
                "is_async": false,
                "avro_schema": {"url": "http://registry:8081"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.timeout_ms, 250);
        assert!(!config.is_async);
        assert_eq!(config.max_poll_records, 500);
        assert_eq!(config.broker.bootstrap_servers(), "kafka:9092");
        let avro = config.avro_schema.unwrap();
        assert!(avro.ssl_verify);
        assert!(avro.request_options.headers.is_empty());
    }

    #[test]
    fn test_client_config_carries_properties() {
        let broker = BrokerConfig::new(["a:9092", "b:9092"]).with_property("sasl.mechanism", "PLAIN");
        let config = broker.client_config();
        assert_eq!(config.get("bootstrap.servers"), Some("a:9092,b:9092"));
        assert_eq!(config.get("sasl.mechanism"), Some("PLAIN"));
    }
}
