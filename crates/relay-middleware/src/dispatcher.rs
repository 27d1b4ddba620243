use relay_types::Result;

/// A single unit of a middleware chain.
pub trait Middleware<T> {
    /// Process `item`, usually handing it (or a replacement) to `next`.
    ///
    /// Errors returned by `next.run` should be propagated unmodified.
    fn process(&mut self, item: T, next: Next<'_, T>) -> Result<()>;
}

/// Continuation over the remainder of a chain.
pub struct Next<'a, T> {
    chain: &'a mut [Box<dyn Middleware<T>>],
    terminal: Option<&'a mut dyn Middleware<T>>,
}

impl<'a, T> Next<'a, T> {
    /// Continuation with nothing left to run. Handed to the terminal unit.
    pub fn end() -> Self {
        Self {
            chain: Default::default(),
            terminal: None,
        }
    }

    /// Run the rest of the chain on `item`.
    pub fn run(self, item: T) -> Result<()> {
        let Next { chain, terminal } = self;
        match chain.split_first_mut() {
            Some((head, rest)) => head.process(
                item,
                Next {
                    chain: rest,
                    terminal,
                },
            ),
            None => match terminal {
                Some(terminal) => terminal.process(item, Next::end()),
                None => Ok(()),
            },
        }
    }

    /// Number of units this continuation would still invoke.
    pub fn remaining(&self) -> usize {
        self.chain.len() + usize::from(self.terminal.is_some())
    }
}

/// Executes a fixed, ordered list of middlewares followed by a terminal unit.
pub struct Dispatcher<T> {
    middlewares: Vec<Box<dyn Middleware<T>>>,
}

impl<T> Dispatcher<T> {
    pub fn new(middlewares: Vec<Box<dyn Middleware<T>>>) -> Self {
        Self { middlewares }
    }

    /// Append a middleware. Insertion order is invocation order.
    pub fn push(&mut self, middleware: impl Middleware<T> + 'static) {
        self.middlewares.push(Box::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Push `item` through every middleware and finally into `terminal`.
    ///
    /// The first error raised aborts the rest of the chain and is returned
    /// as is.
    pub fn handle(&mut self, item: T, terminal: &mut dyn Middleware<T>) -> Result<()> {
        tracing::trace!(
            "Dispatching item through {} middlewares",
            self.middlewares.len()
        );
        Next {
            chain: &mut self.middlewares,
            terminal: Some(terminal),
        }
        .run(item)
    }
}

impl<T> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Middleware backed by a closure, see [`from_fn`].
pub struct FnMiddleware<F>(F);

/// Wrap a closure as a middleware.
///
/// ```
/// use relay_middleware::{from_fn, Dispatcher, Next};
/// use relay_types::Record;
///
/// let mut dispatcher: Dispatcher<Record> = Dispatcher::default();
/// dispatcher.push(from_fn(|record: Record, next: Next<'_, Record>| {
///     next.run(record.with_key("stamped"))
/// }));
/// ```
pub fn from_fn<T, F>(f: F) -> FnMiddleware<F>
where
    F: FnMut(T, Next<'_, T>) -> Result<()>,
{
    FnMiddleware(f)
}

impl<T, F> Middleware<T> for FnMiddleware<F>
where
    F: FnMut(T, Next<'_, T>) -> Result<()>,
{
    fn process(&mut self, item: T, next: Next<'_, T>) -> Result<()> {
        (self.0)(item, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records entry and exit around the continuation.
    struct Recording {
        name: &'static str,
        log: Log,
        fail: bool,
    }

    impl Middleware<u32> for Recording {
        fn process(&mut self, item: u32, next: Next<'_, u32>) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:enter:{item}", self.name));
            if self.fail {
                return Err(Error::Handler(anyhow::anyhow!("{} failed", self.name)));
            }
            let result = next.run(item + 1);
            let outcome = if result.is_ok() { "ok" } else { "err" };
            self.log
                .borrow_mut()
                .push(format!("{}:exit:{outcome}", self.name));
            result
        }
    }

    fn recording(name: &'static str, log: &Log, fail: bool) -> Box<dyn Middleware<u32>> {
        Box::new(Recording {
            name,
            log: Rc::clone(log),
            fail,
        })
    }

    struct Terminal {
        log: Log,
    }

    impl Middleware<u32> for Terminal {
        fn process(&mut self, item: u32, next: Next<'_, u32>) -> Result<()> {
            assert_eq!(next.remaining(), 0);
            self.log.borrow_mut().push(format!("terminal:{item}"));
            Ok(())
        }
    }

    #[test]
    fn test_invocation_order_is_insertion_order() {
        let log = Log::default();
        let mut dispatcher =
            Dispatcher::new(vec![recording("a", &log, false), recording("b", &log, false)]);
        let mut terminal = Terminal { log: Rc::clone(&log) };

        dispatcher.handle(0, &mut terminal).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["a:enter:0", "b:enter:1", "terminal:2", "b:exit:ok", "a:exit:ok"]
        );
    }

    #[test]
    fn test_failing_unit_aborts_chain_and_outer_unit_sees_error() {
        let log = Log::default();
        let mut dispatcher =
            Dispatcher::new(vec![recording("a", &log, false), recording("b", &log, true)]);
        let mut terminal = Terminal { log: Rc::clone(&log) };

        let err = dispatcher.handle(0, &mut terminal).unwrap_err();

        assert!(err.to_string().contains("b failed"));
        assert_eq!(*log.borrow(), vec!["a:enter:0", "b:enter:1", "a:exit:err"]);
    }

    #[test]
    fn test_short_circuit_skips_terminal() {
        let log = Log::default();
        let mut dispatcher = Dispatcher::<u32>::default();
        dispatcher.push(from_fn(|_item: u32, _next: Next<'_, u32>| Ok(())));
        let mut terminal = Terminal { log: Rc::clone(&log) };

        dispatcher.handle(7, &mut terminal).unwrap();

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_empty_chain_goes_straight_to_terminal() {
        let log = Log::default();
        let mut dispatcher = Dispatcher::<u32>::default();
        let mut terminal = Terminal { log: Rc::clone(&log) };

        assert!(dispatcher.is_empty());
        dispatcher.handle(5, &mut terminal).unwrap();
        dispatcher.handle(6, &mut terminal).unwrap();

        assert_eq!(*log.borrow(), vec!["terminal:5", "terminal:6"]);
    }

    #[test]
    fn test_each_unit_runs_once_per_item() {
        let calls = Rc::new(RefCell::new(0u32));
        let counted = Rc::clone(&calls);
        let mut dispatcher = Dispatcher::<u32>::default();
        dispatcher.push(from_fn(move |item: u32, next: Next<'_, u32>| {
            *counted.borrow_mut() += 1;
            next.run(item)
        }));
        let mut terminal = from_fn(|_item: u32, _next: Next<'_, u32>| Ok(()));

        for i in 0..3 {
            dispatcher.handle(i, &mut terminal).unwrap();
        }

        assert_eq!(*calls.borrow(), 3);
        assert_eq!(dispatcher.len(), 1);
    }
}
