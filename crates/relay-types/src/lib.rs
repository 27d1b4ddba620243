//! Shared types for the kafka-relay pipeline.
//!
//! This crate defines the data that flows through a middleware chain and the
//! configuration every component is constructed from.
//!
//! # Architecture
//!
//! ```text
//! Produce:  user code → Record → [middlewares...] → ProducerDeliveryGuard → broker
//! Consume:  broker → raw response → Message → [middlewares...] → Handler
//! ```
//!
//! # Modules
//!
//! - [`record`] - outbound [`Record`] built by user code
//! - [`message`] - inbound [`Message`] wrapping a raw broker response
//! - [`config`] - [`TopicConfig`], the explicit configuration value object
//! - [`error`] - the error taxonomy carried through a middleware chain
//!
//! The producer and consumer crates depend on this crate, never the other way
//! around, so both sides of the pipeline share one [`Error`] type.

pub mod config;
pub mod error;
pub mod message;
pub mod record;

// Re-export main types for convenient access
pub use config::{AvroSchemaConfig, BrokerConfig, RequestOptions, TopicConfig};
pub use error::{Error, Result};
pub use message::{AvroPayload, Message, Payload};
pub use record::Record;
