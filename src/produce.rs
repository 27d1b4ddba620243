//! `kafka-relay produce`: one record per input line.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Context;
use kafka_relay_producer::{Producer, ProducerTransport};
use relay_avro::{AvroEncodeMiddleware, SchemaRegistryClient};
use relay_types::Record;

use crate::ProduceArgs;

/// Run the produce command until `input` is exhausted.
pub fn run(args: ProduceArgs, input: impl BufRead) -> anyhow::Result<u64> {
    let config = args.topic_config()?;
    tracing::info!(
        "Producing to topic '{}' on {}",
        config.topic_id,
        config.broker.bootstrap_servers()
    );

    let mut producer = Producer::connect(&config).context("Failed to create Kafka producer")?;

    if let Some(schema_path) = &args.schema_file {
        let definition = std::fs::read_to_string(schema_path)
            .with_context(|| format!("Failed to read Avro schema from {schema_path:?}"))?;
        let schema = relay_avro::parse_schema(&definition)
            .with_context(|| format!("Invalid Avro schema in {schema_path:?}"))?;
        let registry_config = config
            .avro_schema
            .as_ref()
            .context("--schema-file needs a schema registry")?;
        let registry = Arc::new(SchemaRegistryClient::connect(registry_config)?);
        let subject = args
            .subject
            .clone()
            .unwrap_or_else(|| config.value_subject());

        tracing::info!("Encoding records as Avro under subject '{subject}'");
        producer.push_middleware(AvroEncodeMiddleware::new(registry, subject, schema));
    }

    let key = args.key.as_deref();
    let produced = producer.scoped(|producer| produce_lines(producer, input, key))?;
    tracing::info!("Produced {produced} records");
    Ok(produced)
}

/// Produce every non-empty line of `input` as one record.
pub fn produce_lines<P: ProducerTransport>(
    producer: &mut Producer<P>,
    input: impl BufRead,
    key: Option<&str>,
) -> relay_types::Result<u64> {
    let mut produced = 0;
    for line in input.lines() {
        let line = line.map_err(|e| relay_types::Error::Handler(e.into()))?;
        if line.trim().is_empty() {
            continue;
        }

        let mut record = Record::new(line);
        if let Some(key) = key {
            record = record.with_key(key);
        }
        producer.produce(record)?;
        produced += 1;
    }
    Ok(produced)
}
