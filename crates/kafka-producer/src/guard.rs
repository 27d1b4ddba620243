use std::time::Duration;

use relay_middleware::{Middleware, Next};
use relay_types::{Error, Record, Result, TopicConfig};

use crate::transport::ProducerTransport;

/// Delivery options of a topic, copied out of its [`TopicConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    pub max_poll_records: u64,
    pub is_async: bool,
    pub required_acknowledgment: bool,
    pub timeout: Duration,
    pub flush_attempts: u32,
}

impl From<&TopicConfig> for DeliverySettings {
    fn from(config: &TopicConfig) -> Self {
        Self {
            max_poll_records: config.max_poll_records,
            is_async: config.is_async,
            required_acknowledgment: config.required_acknowledgment,
            timeout: config.timeout(),
            flush_attempts: config.flush_attempts,
        }
    }
}

/// How often the guard's delivery routines ran.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub produced: u64,
    pub poll_drains: u64,
    pub flushes: u64,
    /// Records the broker reported as not delivered.
    pub failed_deliveries: u64,
}

/// Terminal producer middleware.
///
/// Hands every record to the transport and keeps the client-side buffer in
/// check: with `is_async` every record is followed by the flush routine,
/// otherwise the outbound queue is drained every `max_poll_records` records.
///
/// The flush routine only waits for the broker when `required_acknowledgment`
/// is set. It then tries `flush_attempts` times and fails with
/// [`Error::DeliveryFailed`] when records are still outstanding.
///
/// A guard that was not [`close`](Self::close)d flushes once more when it is
/// dropped, also while unwinding. Errors from that flush can only be logged.
pub struct ProducerDeliveryGuard<P: ProducerTransport> {
    transport: P,
    topic: String,
    settings: DeliverySettings,
    stats: DeliveryStats,
    closed: bool,
}

impl<P: ProducerTransport> ProducerDeliveryGuard<P> {
    pub fn new(topic: impl Into<String>, settings: DeliverySettings, transport: P) -> Self {
        Self {
            transport,
            topic: topic.into(),
            settings,
            stats: DeliveryStats::default(),
            closed: false,
        }
    }

    pub fn from_config(config: &TopicConfig, transport: P) -> Self {
        Self::new(config.topic_id.clone(), DeliverySettings::from(config), transport)
    }

    /// Produce one record and run whichever delivery routine is due.
    pub fn deliver(&mut self, record: &Record) -> Result<()> {
        self.transport.produce(&self.topic, record)?;
        self.stats.produced += 1;

        if self.settings.is_async {
            self.flush()
        } else {
            // Zero disables the periodic drain.
            if self.stats.produced.checked_rem(self.settings.max_poll_records) == Some(0) {
                self.poll();
            }
            Ok(())
        }
    }

    /// Drain the outbound queue, however long that takes.
    pub fn poll(&mut self) {
        self.stats.poll_drains += 1;
        tracing::debug!(
            "Draining outbound queue of topic '{}' after {} records",
            self.topic,
            self.stats.produced
        );

        while self.transport.out_queue_len() > 0 {
            self.transport.poll(self.settings.timeout);
        }
    }

    /// Wait for broker acknowledgment when it is required.
    ///
    /// With `flush_attempts == 0` the transport is never asked and the flush
    /// fails straight away with `DeliveryFailed { attempts: 0 }`.
    pub fn flush(&mut self) -> Result<()> {
        self.stats.flushes += 1;
        if !self.settings.required_acknowledgment {
            return Ok(());
        }

        let attempts = self.settings.flush_attempts;
        for attempt in 1..=attempts {
            if self.transport.flush(self.settings.timeout)? {
                return Ok(());
            }
            tracing::debug!(
                "Flush attempt {attempt}/{attempts} for topic '{}' timed out with {} records outstanding",
                self.topic,
                self.transport.out_queue_len()
            );
        }

        tracing::error!(
            "Gave up flushing topic '{}' after {attempts} attempts",
            self.topic
        );
        Err(Error::DeliveryFailed { attempts })
    }

    /// Run the final flush and disarm the teardown flush.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        let flushed = self.flush();

        let failed = self.transport.failed_deliveries();
        if failed > 0 {
            tracing::warn!(
                "{failed} of {} records for topic '{}' were not delivered",
                self.stats.produced,
                self.topic
            );
        }
        flushed
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            failed_deliveries: self.transport.failed_deliveries(),
            ..self.stats
        }
    }

    pub fn transport(&self) -> &P {
        &self.transport
    }
}

impl<P: ProducerTransport> Middleware<Record> for ProducerDeliveryGuard<P> {
    fn process(&mut self, record: Record, _next: Next<'_, Record>) -> Result<()> {
        self.deliver(&record)
    }
}

impl<P: ProducerTransport> Drop for ProducerDeliveryGuard<P> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::error!(
                "Final flush of topic '{}' failed during teardown: {e}",
                self.topic
            );
        }
    }
}
