use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_middleware::{Dispatcher, Middleware};
use relay_types::{Message, Result, TopicConfig};

use crate::handler::{Handler, HandlerMiddleware};
use crate::transport::{ConsumerTransport, KafkaConsumer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    Terminated,
}

/// Cloneable request to stop a [`ConsumerLoop`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Ask the loop to stop once the current iteration is done.
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub polls: u64,
    pub handled: u64,
    pub warnings: u64,
    pub failures: u64,
}

/// Single-threaded consume loop for one topic.
///
/// Every iteration blocks on the broker for at most the configured timeout,
/// turns the response into a [`Message`] and pushes it through the
/// middlewares into the handler. Warnings go to [`Handler::warning`], every
/// other error to [`Handler::failed`]; neither stops the loop unless the
/// handler breaks or a [`ShutdownHandle`] is triggered.
pub struct ConsumerLoop<H, C = KafkaConsumer> {
    transport: C,
    handler: H,
    dispatcher: Dispatcher<Message>,
    timeout: Duration,
    auto_commit: bool,
    commit_async: bool,
    state: LoopState,
    shutdown: ShutdownHandle,
    stats: LoopStats,
}

impl<H: Handler> ConsumerLoop<H, KafkaConsumer> {
    /// Validate `config` and connect to its brokers.
    pub fn connect(config: &TopicConfig, handler: H) -> Result<Self> {
        config.validate()?;
        let transport = KafkaConsumer::new(config)?;
        Ok(Self::new(config, transport, handler))
    }
}

impl<H: Handler, C: ConsumerTransport> ConsumerLoop<H, C> {
    pub fn new(config: &TopicConfig, transport: C, handler: H) -> Self {
        Self {
            transport,
            handler,
            dispatcher: Dispatcher::default(),
            timeout: config.timeout(),
            auto_commit: config.auto_commit,
            commit_async: config.commit_async,
            state: LoopState::Polling,
            shutdown: ShutdownHandle::default(),
            stats: LoopStats::default(),
        }
    }

    /// Append a middleware; it runs after every middleware added before it.
    pub fn with_middleware(mut self, middleware: impl Middleware<Message> + 'static) -> Self {
        self.dispatcher.push(middleware);
        self
    }

    pub fn push_middleware(&mut self, middleware: impl Middleware<Message> + 'static) {
        self.dispatcher.push(middleware);
    }

    /// Stop when `handle` is triggered instead of the loop's own handle.
    pub fn with_shutdown_handle(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = handle;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Poll until terminated.
    pub fn run(&mut self) {
        tracing::info!("Consumer loop started");
        while self.poll_once() == LoopState::Polling {}
        tracing::info!(
            "Consumer loop terminated after {} polls ({} handled, {} warnings, {} failures)",
            self.stats.polls,
            self.stats.handled,
            self.stats.warnings,
            self.stats.failures
        );
    }

    /// Run a single iteration and return the state the loop is in afterwards.
    pub fn poll_once(&mut self) -> LoopState {
        if self.state == LoopState::Terminated || self.stop_requested() {
            return self.state;
        }

        self.stats.polls += 1;
        let response = self.transport.consume(self.timeout);
        let outcome = Message::from_response(response).and_then(|message| {
            let mut terminal = HandlerMiddleware::new(
                &mut self.handler,
                &mut self.transport,
                self.auto_commit,
                self.commit_async,
            );
            self.dispatcher.handle(message, &mut terminal)
        });

        match outcome {
            Ok(()) => self.stats.handled += 1,
            Err(err) if err.is_warning() => {
                self.stats.warnings += 1;
                self.handler.warning(&err);
            }
            Err(err) => {
                self.stats.failures += 1;
                if self.handler.failed(&err).is_break() {
                    tracing::info!("Handler requested termination after: {err}");
                    self.state = LoopState::Terminated;
                }
            }
        }

        self.stop_requested();
        self.state
    }

    fn stop_requested(&mut self) -> bool {
        if self.shutdown.is_shutdown() && self.state == LoopState::Polling {
            tracing::info!("Shutdown requested, terminating consumer loop");
            self.state = LoopState::Terminated;
        }
        self.state == LoopState::Terminated
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn transport(&self) -> &C {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut C {
        &mut self.transport
    }
}
