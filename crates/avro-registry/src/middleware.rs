//! Middlewares applying the Avro wire format on the produce and consume paths.

use std::sync::Arc;

use relay_middleware::{Middleware, Next};
use relay_types::{Error, Message, Payload, Record, Result};

use crate::client::SchemaRegistryClient;
use crate::error::AvroError;
use crate::registry::{HttpRegistry, RegistryTransport};
use crate::wire::{AvroWireDecoder, AvroWireEncoder};

/// Producer-side middleware turning JSON record payloads into framed Avro.
pub struct AvroEncodeMiddleware<R = HttpRegistry> {
    encoder: AvroWireEncoder<R>,
    subject: String,
    schema: apache_avro::Schema,
}

impl<R: RegistryTransport> AvroEncodeMiddleware<R> {
    pub fn new(
        registry: Arc<SchemaRegistryClient<R>>,
        subject: impl Into<String>,
        schema: apache_avro::Schema,
    ) -> Self {
        Self {
            encoder: AvroWireEncoder::new(registry),
            subject: subject.into(),
            schema,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl<R: RegistryTransport> Middleware<Record> for AvroEncodeMiddleware<R> {
    fn process(&mut self, record: Record, next: Next<'_, Record>) -> Result<()> {
        let json: serde_json::Value = serde_json::from_slice(record.payload()).map_err(|e| {
            Error::from(AvroError::InvalidPayload(format!(
                "record payload is not JSON: {e}"
            )))
        })?;

        let encoded = self
            .encoder
            .encode(&self.subject, &self.schema, &json)
            .map_err(Error::from)?;

        next.run(record.with_payload(encoded))
    }
}

/// Consumer-side middleware decoding framed payloads into [`Payload::Avro`].
///
/// Tombstones and payloads that were already decoded pass through untouched.
pub struct AvroDecodeMiddleware<R = HttpRegistry> {
    decoder: AvroWireDecoder<R>,
}

impl<R: RegistryTransport> AvroDecodeMiddleware<R> {
    pub fn new(registry: Arc<SchemaRegistryClient<R>>) -> Self {
        Self {
            decoder: AvroWireDecoder::new(registry),
        }
    }
}

impl<R: RegistryTransport> Middleware<Message> for AvroDecodeMiddleware<R> {
    fn process(&mut self, mut message: Message, next: Next<'_, Message>) -> Result<()> {
        if let Payload::Raw(bytes) = &message.payload {
            let decoded = self.decoder.decode(bytes).map_err(Error::from)?;
            message.payload = Payload::Avro(decoded);
        }
        next.run(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{CountingRegistry, ORDER_SCHEMA};
    use apache_avro::types::Value;
    use relay_middleware::{from_fn, Dispatcher};

    fn registry() -> Arc<SchemaRegistryClient<CountingRegistry>> {
        Arc::new(SchemaRegistryClient::new(CountingRegistry::with_version(5)))
    }

    fn order_schema() -> apache_avro::Schema {
        apache_avro::Schema::parse_str(ORDER_SCHEMA).unwrap()
    }

    fn message(payload: Payload) -> Message {
        Message {
            payload,
            topic: "orders".to_string(),
            partition: 0,
            offset: 42,
            key: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_encode_then_decode_through_chains() {
        let registry = registry();

        let mut produced = Vec::new();
        let mut producer_chain: Dispatcher<Record> = Dispatcher::default();
        producer_chain.push(AvroEncodeMiddleware::new(
            Arc::clone(&registry),
            "orders-value",
            order_schema(),
        ));
        let mut capture = from_fn(|record: Record, _next: Next<'_, Record>| {
            produced.push(record.payload().to_vec());
            Ok(())
        });
        producer_chain
            .handle(
                Record::new(r#"{"id": "order-1", "quantity": 2}"#),
                &mut capture,
            )
            .unwrap();
        drop(capture);
        assert_eq!(produced.len(), 1);

        let mut seen = Vec::new();
        let mut consumer_chain: Dispatcher<Message> = Dispatcher::default();
        consumer_chain.push(AvroDecodeMiddleware::new(Arc::clone(&registry)));
        let mut handler = from_fn(|message: Message, _next: Next<'_, Message>| {
            seen.push(message.payload);
            Ok(())
        });
        consumer_chain
            .handle(message(Payload::Raw(produced.remove(0))), &mut handler)
            .unwrap();
        drop(handler);

        match &seen[0] {
            Payload::Avro(payload) => {
                assert_eq!(payload.subject, "orders-value");
                assert_eq!(payload.version, 5);
                assert_eq!(
                    payload.value,
                    Value::Record(vec![
                        ("id".to_string(), Value::String("order-1".to_string())),
                        ("quantity".to_string(), Value::Int(2)),
                    ])
                );
            }
            other => panic!("expected an Avro payload, got {other:?}"),
        }
    }

    #[test]
    fn test_non_json_payload_stops_the_chain() {
        let mut chain: Dispatcher<Record> = Dispatcher::default();
        chain.push(AvroEncodeMiddleware::new(
            registry(),
            "orders-value",
            order_schema(),
        ));
        let mut reached = false;
        let mut terminal = from_fn(|_record: Record, _next: Next<'_, Record>| {
            reached = true;
            Ok(())
        });

        let err = chain
            .handle(Record::new("not json"), &mut terminal)
            .unwrap_err();
        drop(terminal);

        assert!(matches!(err, Error::Avro(_)));
        assert!(!reached);
    }

    #[test]
    fn test_out_of_range_int_stops_the_chain() {
        let mut chain: Dispatcher<Record> = Dispatcher::default();
        chain.push(AvroEncodeMiddleware::new(
            registry(),
            "orders-value",
            order_schema(),
        ));
        let mut reached = false;
        let mut terminal = from_fn(|_record: Record, _next: Next<'_, Record>| {
            reached = true;
            Ok(())
        });

        let err = chain
            .handle(
                Record::new(r#"{"id": "o", "quantity": 4294967298}"#),
                &mut terminal,
            )
            .unwrap_err();
        drop(terminal);

        assert!(matches!(err, Error::Avro(_)));
        assert!(err.to_string().contains("does not fit into an Avro int"));
        assert!(!reached);
    }

    #[test]
    fn test_malformed_frame_is_a_wire_format_error() {
        let mut chain: Dispatcher<Message> = Dispatcher::default();
        chain.push(AvroDecodeMiddleware::new(registry()));
        let mut terminal = from_fn(|_message: Message, _next: Next<'_, Message>| Ok(()));

        let err = chain
            .handle(message(Payload::Raw(vec![0x07, 0x00])), &mut terminal)
            .unwrap_err();
        assert!(matches!(err, Error::WireFormat(_)));
    }

    #[test]
    fn test_tombstone_passes_through() {
        let mut chain: Dispatcher<Message> = Dispatcher::default();
        chain.push(AvroDecodeMiddleware::new(registry()));
        let mut seen = None;
        let mut terminal = from_fn(|message: Message, _next: Next<'_, Message>| {
            seen = Some(message.payload);
            Ok(())
        });

        chain
            .handle(message(Payload::Tombstone), &mut terminal)
            .unwrap();
        drop(terminal);

        assert_eq!(seen, Some(Payload::Tombstone));
    }
}
