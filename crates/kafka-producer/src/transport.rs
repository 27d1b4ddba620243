use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message as _;
use rdkafka::producer::{
    BaseProducer, BaseRecord, DeliveryResult, Producer as RdkafkaProducer, ProducerContext,
};
use rdkafka::ClientContext;
use relay_types::{Record, Result, TopicConfig};

/// Broker primitives the delivery guard is built on.
pub trait ProducerTransport {
    /// Hand a record to the client's outbound buffer. Does not wait for the broker.
    fn produce(&mut self, topic: &str, record: &Record) -> Result<()>;

    /// Serve delivery callbacks for at most `timeout`.
    ///
    /// Returns the number of records still waiting for a delivery report.
    fn poll(&mut self, timeout: Duration) -> usize;

    /// Number of records still waiting for a delivery report.
    fn out_queue_len(&self) -> usize;

    /// Wait up to `timeout` for every outstanding record.
    ///
    /// `Ok(true)` once nothing is outstanding, `Ok(false)` if the timeout
    /// elapsed first.
    fn flush(&mut self, timeout: Duration) -> Result<bool>;

    /// Delivery reports that came back with an error so far.
    fn failed_deliveries(&self) -> u64 {
        0
    }
}

/// Logs and counts failed delivery reports.
#[derive(Debug, Default)]
pub struct DeliveryReporter {
    failed: Arc<AtomicU64>,
}

impl ClientContext for DeliveryReporter {}

impl ProducerContext for DeliveryReporter {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        if let Err((err, message)) = result {
            self.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "Delivery to {}[{}] failed: {err}",
                message.topic(),
                message.partition()
            );
        }
    }
}

/// librdkafka-backed transport.
pub struct KafkaProducer {
    producer: BaseProducer<DeliveryReporter>,
    failed: Arc<AtomicU64>,
}

impl KafkaProducer {
    pub fn new(config: &TopicConfig) -> Result<Self> {
        let reporter = DeliveryReporter::default();
        let failed = Arc::clone(&reporter.failed);

        let producer: BaseProducer<DeliveryReporter> =
            config.broker.client_config().create_with_context(reporter)?;

        tracing::info!(
            "Created Kafka producer for topic '{}' on {}",
            config.topic_id,
            config.broker.bootstrap_servers()
        );

        Ok(Self { producer, failed })
    }

    /// Get the underlying producer (for advanced use cases)
    pub fn inner(&self) -> &BaseProducer<DeliveryReporter> {
        &self.producer
    }
}

impl ProducerTransport for KafkaProducer {
    fn produce(&mut self, topic: &str, record: &Record) -> Result<()> {
        let mut base = BaseRecord::to(topic).payload(record.payload());
        if !record.key().is_empty() {
            base = base.key(record.key());
        }
        if let Some(partition) = record.partition() {
            base = base.partition(partition);
        }

        self.producer.send(base).map_err(|(err, _)| err)?;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> usize {
        self.producer.poll(timeout);
        self.out_queue_len()
    }

    fn out_queue_len(&self) -> usize {
        usize::try_from(self.producer.in_flight_count()).unwrap_or(0)
    }

    fn flush(&mut self, timeout: Duration) -> Result<bool> {
        match self.producer.flush(timeout) {
            Ok(()) => Ok(true),
            Err(KafkaError::Flush(RDKafkaErrorCode::OperationTimedOut)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn failed_deliveries(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
