//! Kafka producer for kafka-relay.
//!
//! Records go through an ordered middleware chain whose last unit is the
//! [`ProducerDeliveryGuard`]. The guard talks to the broker through a
//! [`ProducerTransport`], which is librdkafka in production and an in-memory
//! fake in tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kafka_relay_producer::Producer;
//! use relay_types::{BrokerConfig, Record, TopicConfig};
//!
//! fn main() -> relay_types::Result<()> {
//!     let config = TopicConfig::new("orders", BrokerConfig::new(["localhost:9092"]), "orders");
//!
//!     Producer::connect(&config)?.scoped(|producer| {
//!         producer.produce(Record::new(r#"{"id":"order-1"}"#).with_key("order-1"))
//!     })
//! }
//! ```

pub mod guard;
pub mod producer;
pub mod transport;

pub use guard::{DeliverySettings, DeliveryStats, ProducerDeliveryGuard};
pub use producer::Producer;
pub use transport::{DeliveryReporter, KafkaProducer, ProducerTransport};
