use std::ops::ControlFlow;

use relay_middleware::{Middleware, Next};
use relay_types::{Error, Message, Result};

use crate::transport::ConsumerTransport;

/// Per-topic message handler.
pub trait Handler {
    /// Process one message. An error is reported to [`Handler::failed`].
    fn handle(&mut self, message: &Message) -> anyhow::Result<()>;

    /// A recoverable condition, such as a poll that timed out, occurred.
    fn warning(&mut self, warning: &Error) {
        tracing::warn!("{warning}");
    }

    /// Handling a message failed, or the broker returned a fatal error.
    ///
    /// The loop keeps polling on [`ControlFlow::Continue`] and terminates on
    /// [`ControlFlow::Break`].
    fn failed(&mut self, error: &Error) -> ControlFlow<()> {
        tracing::error!("Failed to consume message: {error}");
        ControlFlow::Continue(())
    }
}

impl<F> Handler for F
where
    F: FnMut(&Message) -> anyhow::Result<()>,
{
    fn handle(&mut self, message: &Message) -> anyhow::Result<()> {
        self(message)
    }
}

/// Terminal consumer middleware: invokes the handler and commits.
///
/// The offset is committed only after the handler succeeded, and only when
/// librdkafka is not committing on its own.
pub struct HandlerMiddleware<'a, H: ?Sized, C: ?Sized> {
    handler: &'a mut H,
    transport: &'a mut C,
    auto_commit: bool,
    commit_async: bool,
}

impl<'a, H: ?Sized, C: ?Sized> HandlerMiddleware<'a, H, C> {
    pub fn new(
        handler: &'a mut H,
        transport: &'a mut C,
        auto_commit: bool,
        commit_async: bool,
    ) -> Self {
        Self {
            handler,
            transport,
            auto_commit,
            commit_async,
        }
    }
}

impl<H, C> Middleware<Message> for HandlerMiddleware<'_, H, C>
where
    H: Handler + ?Sized,
    C: ConsumerTransport + ?Sized,
{
    fn process(&mut self, message: Message, _next: Next<'_, Message>) -> Result<()> {
        self.handler.handle(&message).map_err(into_relay_error)?;

        if !self.auto_commit {
            self.transport.commit(&message, self.commit_async)?;
            tracing::trace!(
                "Committed {}[{}] at offset {}",
                message.topic,
                message.partition,
                message.offset + 1
            );
        }
        Ok(())
    }
}

/// Handlers may return relay errors through `anyhow`; keep their kind.
fn into_relay_error(err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(err) => err,
        Err(err) => Error::Handler(err),
    }
}
