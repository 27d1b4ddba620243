//! Avro support for kafka-relay.
//!
//! Payloads are framed with the subject and version they were registered
//! under, so a reader can fetch the exact writer schema without an
//! id-indexed lookup:
//!
//! ```text
//! +-------+----------------+-------------------+----------------+--------------+
//! | magic | subject length | subject bytes     | version        | avro datum   |
//! | 1 B   | 4 B big-endian | `length` bytes    | 4 B big-endian | rest         |
//! +-------+----------------+-------------------+----------------+--------------+
//! ```
//!
//! # Modules
//!
//! - [`registry`] - HTTP transport to the schema registry
//! - [`client`] - caching [`SchemaRegistryClient`]
//! - [`wire`] - [`AvroWireEncoder`] / [`AvroWireDecoder`]
//! - [`middleware`] - produce/consume middlewares applying the wire format

pub mod client;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod wire;

pub use client::{Schema, SchemaCache, SchemaRegistryClient};
pub use error::{AvroError, Result};
pub use middleware::{AvroDecodeMiddleware, AvroEncodeMiddleware};
pub use registry::{HttpRegistry, RegistryTransport};
pub use wire::{AvroWireDecoder, AvroWireEncoder, MAGIC_BYTE_SUBJECT_VERSION};

/// Parse an Avro schema from its JSON definition.
pub fn parse_schema(definition: &str) -> Result<apache_avro::Schema> {
    Ok(apache_avro::Schema::parse_str(definition)?)
}
