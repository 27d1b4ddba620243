//! `kafka-relay consume`: log every message until shut down.

use std::sync::Arc;

use anyhow::Context;
use kafka_relay_consumer::{ConsumerLoop, Handler, ShutdownHandle};
use relay_avro::{AvroDecodeMiddleware, SchemaRegistryClient};
use relay_types::{Message, Payload};

use crate::ConsumeArgs;

/// Handler logging each message, optionally stopping after `max_messages`.
pub struct LogHandler {
    handled: u64,
    max_messages: Option<u64>,
    shutdown: ShutdownHandle,
}

impl LogHandler {
    pub fn new(max_messages: Option<u64>, shutdown: ShutdownHandle) -> Self {
        Self {
            handled: 0,
            max_messages,
            shutdown,
        }
    }

    pub fn handled(&self) -> u64 {
        self.handled
    }
}

impl Handler for LogHandler {
    fn handle(&mut self, message: &Message) -> anyhow::Result<()> {
        tracing::info!(
            "{}[{}]@{} key={} {}",
            message.topic,
            message.partition,
            message.offset,
            message
                .key
                .as_deref()
                .map(String::from_utf8_lossy)
                .unwrap_or_default(),
            render_payload(&message.payload)?
        );

        self.handled += 1;
        if self.max_messages.is_some_and(|max| self.handled >= max) {
            tracing::info!("Handled {} messages, stopping", self.handled);
            self.shutdown.shutdown();
        }
        Ok(())
    }
}

/// Human-readable payload for logging.
pub fn render_payload(payload: &Payload) -> anyhow::Result<String> {
    Ok(match payload {
        Payload::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Payload::Avro(avro) => {
            let json = serde_json::Value::try_from(avro.value.clone())
                .context("Avro value has no JSON representation")?;
            format!("{}@v{} {json}", avro.subject, avro.version)
        }
        Payload::Tombstone => "<tombstone>".to_string(),
    })
}

/// Run the consume command until `shutdown` is triggered.
pub fn run(args: ConsumeArgs, shutdown: ShutdownHandle) -> anyhow::Result<u64> {
    let config = args.topic_config()?;
    tracing::info!(
        "Consuming topic '{}' from {} as group '{}'",
        config.topic_id,
        config.broker.bootstrap_servers(),
        config.consumer_group
    );

    let handler = LogHandler::new(args.max_messages, shutdown.clone());
    let mut consumer = ConsumerLoop::connect(&config, handler)
        .context("Failed to create Kafka consumer")?
        .with_shutdown_handle(shutdown);

    if let Some(registry_config) = &config.avro_schema {
        let registry = Arc::new(SchemaRegistryClient::connect(registry_config)?);
        consumer.push_middleware(AvroDecodeMiddleware::new(registry));
    }

    consumer.run();
    Ok(consumer.handler().handled())
}
