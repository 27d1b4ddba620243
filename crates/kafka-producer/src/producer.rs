use relay_middleware::{Dispatcher, Middleware};
use relay_types::{Record, Result, TopicConfig};

use crate::guard::{DeliveryStats, ProducerDeliveryGuard};
use crate::transport::{KafkaProducer, ProducerTransport};

/// Producer for a single topic: user middlewares followed by the delivery guard.
pub struct Producer<P: ProducerTransport = KafkaProducer> {
    dispatcher: Dispatcher<Record>,
    guard: ProducerDeliveryGuard<P>,
}

impl Producer<KafkaProducer> {
    /// Validate `config` and connect to its brokers.
    pub fn connect(config: &TopicConfig) -> Result<Self> {
        config.validate()?;
        let transport = KafkaProducer::new(config)?;
        Ok(Self::new(config, transport))
    }
}

impl<P: ProducerTransport> Producer<P> {
    pub fn new(config: &TopicConfig, transport: P) -> Self {
        Self {
            dispatcher: Dispatcher::default(),
            guard: ProducerDeliveryGuard::from_config(config, transport),
        }
    }

    /// Append a middleware; it runs after every middleware added before it.
    pub fn with_middleware(mut self, middleware: impl Middleware<Record> + 'static) -> Self {
        self.dispatcher.push(middleware);
        self
    }

    pub fn push_middleware(&mut self, middleware: impl Middleware<Record> + 'static) {
        self.dispatcher.push(middleware);
    }

    /// Send `record` through the middleware chain to the broker.
    ///
    /// Whatever a middleware or the delivery guard raises is returned here
    /// unchanged. In particular [`relay_types::Error::DeliveryFailed`] means
    /// records may have been lost.
    pub fn produce(&mut self, record: Record) -> Result<()> {
        self.dispatcher.handle(record, &mut self.guard)
    }

    /// Flush one last time and release the transport.
    pub fn close(self) -> Result<()> {
        tracing::debug!("Closing producer for topic '{}'", self.guard.topic());
        self.guard.close()
    }

    /// Run `f` with this producer and close it afterwards, whatever `f` returned.
    ///
    /// An error from `f` wins over an error from the final flush; the latter
    /// is then logged.
    pub fn scoped<T>(mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outcome = f(&mut self);
        let closed = self.close();

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                tracing::error!("Final flush failed after an earlier error: {close_err}");
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> DeliveryStats {
        self.guard.stats()
    }

    pub fn transport(&self) -> &P {
        self.guard.transport()
    }

    pub fn topic(&self) -> &str {
        self.guard.topic()
    }
}
