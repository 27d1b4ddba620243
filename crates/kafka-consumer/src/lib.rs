//! Kafka consumer for kafka-relay.
//!
//! A [`ConsumerLoop`] polls one topic and hands every message through an
//! ordered middleware chain to a [`Handler`]. The loop is resilient by
//! default: timeouts, end-of-partition events, broker errors and handler
//! failures are reported to the handler and polling goes on.
//!
//! ```rust,no_run
//! use kafka_relay_consumer::ConsumerLoop;
//! use relay_types::{BrokerConfig, Message, TopicConfig};
//!
//! fn main() -> relay_types::Result<()> {
//!     let config = TopicConfig::new("orders", BrokerConfig::new(["localhost:9092"]), "orders");
//!     let mut consumer = ConsumerLoop::connect(&config, |message: &Message| -> anyhow::Result<()> {
//!         tracing::info!("{}[{}]@{}", message.topic, message.partition, message.offset);
//!         Ok(())
//!     })?;
//!     consumer.run();
//!     Ok(())
//! }
//! ```

/// Consume loop state machine
pub mod consumer_loop;
/// Handler trait and the terminal middleware invoking it
pub mod handler;
/// Broker transport and its librdkafka implementation
pub mod transport;

pub use consumer_loop::{ConsumerLoop, LoopState, LoopStats, ShutdownHandle};
pub use handler::{Handler, HandlerMiddleware};
pub use transport::{ConsumerTransport, KafkaConsumer};
