//! Ordered middleware chain.
//!
//! Both pipeline directions push their items (a `Record` when producing, a
//! `Message` when consuming) through the same [`Dispatcher`]: user supplied
//! middlewares run in insertion order and the transport-specific terminal unit
//! always runs last.
//!
//! ```text
//! handle(item) → middleware[0] → middleware[1] → ... → terminal
//!                      │               │                   │
//!                  next.run()      next.run()        (end of chain)
//! ```
//!
//! A unit receives the item by value together with a [`Next`] continuation.
//! `Next::run` consumes the continuation, so a unit can call the rest of the
//! chain at most once; not calling it short-circuits the chain.

mod dispatcher;

pub use dispatcher::{from_fn, Dispatcher, FnMiddleware, Middleware, Next};
