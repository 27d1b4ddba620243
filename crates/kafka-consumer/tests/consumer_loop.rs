use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::time::Duration;

use kafka_relay_consumer::{ConsumerLoop, ConsumerTransport, Handler, LoopState, ShutdownHandle};
use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::OwnedMessage;
use rdkafka::Timestamp;
use relay_middleware::{from_fn, Next};
use relay_types::{BrokerConfig, Error, Message, Result, TopicConfig};

type Response = Option<KafkaResult<OwnedMessage>>;

#[derive(Default)]
struct ScriptedTransport {
    responses: VecDeque<Response>,
    commits: Vec<(i32, i64, bool)>,
    consumed: usize,
    /// Triggered once the script has run out.
    shutdown_when_empty: Option<ShutdownHandle>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: responses.into(),
            ..Default::default()
        }
    }
}

impl ConsumerTransport for ScriptedTransport {
    fn consume(&mut self, _timeout: Duration) -> Response {
        self.consumed += 1;
        let next = self.responses.pop_front().flatten();
        if self.responses.is_empty() {
            if let Some(handle) = &self.shutdown_when_empty {
                handle.shutdown();
            }
        }
        next
    }

    fn commit(&mut self, message: &Message, asynchronous: bool) -> Result<()> {
        self.commits
            .push((message.partition, message.offset + 1, asynchronous));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHandler {
    handled: Vec<i64>,
    warnings: Vec<String>,
    failures: Vec<String>,
    fail_offsets: Vec<i64>,
    break_on_failure: bool,
}

impl Handler for RecordingHandler {
    fn handle(&mut self, message: &Message) -> anyhow::Result<()> {
        if self.fail_offsets.contains(&message.offset) {
            anyhow::bail!("cannot handle offset {}", message.offset);
        }
        self.handled.push(message.offset);
        Ok(())
    }

    fn warning(&mut self, warning: &Error) {
        self.warnings.push(warning.to_string());
    }

    fn failed(&mut self, error: &Error) -> ControlFlow<()> {
        self.failures.push(error.to_string());
        if self.break_on_failure {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

fn message(offset: i64) -> Response {
    Some(Ok(OwnedMessage::new(
        Some(format!("payload-{offset}").into_bytes()),
        None,
        "orders".to_string(),
        Timestamp::NotAvailable,
        0,
        offset,
        None,
    )))
}

fn config() -> TopicConfig {
    TopicConfig::new("orders", BrokerConfig::new(["localhost:9092"]), "orders")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scripted(
    config: &TopicConfig,
    responses: Vec<Response>,
) -> ConsumerLoop<RecordingHandler, ScriptedTransport> {
    init_tracing();
    ConsumerLoop::new(
        config,
        ScriptedTransport::new(responses),
        RecordingHandler::default(),
    )
}

#[test]
fn timeout_warns_without_invoking_handler() {
    let mut consumer = scripted(&config(), vec![None, message(1)]);

    assert_eq!(consumer.poll_once(), LoopState::Polling);
    assert!(consumer.handler().handled.is_empty());
    assert_eq!(
        consumer.handler().warnings,
        vec!["Kafka warning: No message available within timeout"]
    );

    assert_eq!(consumer.poll_once(), LoopState::Polling);
    assert_eq!(consumer.handler().handled, vec![1]);
}

#[test]
fn end_of_partition_is_a_warning() {
    let mut consumer = scripted(
        &config(),
        vec![
            Some(Err(KafkaError::PartitionEOF(0))),
            Some(Err(KafkaError::MessageConsumption(
                RDKafkaErrorCode::OperationTimedOut,
            ))),
        ],
    );

    consumer.poll_once();
    consumer.poll_once();

    assert_eq!(consumer.stats().warnings, 2);
    assert!(consumer.handler().failures.is_empty());
}

#[test]
fn fatal_transport_error_fails_and_keeps_polling() {
    let mut consumer = scripted(
        &config(),
        vec![
            Some(Err(KafkaError::MessageConsumption(
                RDKafkaErrorCode::BrokerTransportFailure,
            ))),
            message(7),
        ],
    );

    assert_eq!(consumer.poll_once(), LoopState::Polling);
    assert_eq!(consumer.handler().failures.len(), 1);
    assert!(consumer.handler().failures[0].starts_with("Kafka error:"));

    assert_eq!(consumer.poll_once(), LoopState::Polling);
    assert_eq!(consumer.handler().handled, vec![7]);
}

#[test]
fn handler_failure_is_reported_and_not_committed() {
    let mut config = config();
    config.auto_commit = false;
    let mut consumer = ConsumerLoop::new(
        &config,
        ScriptedTransport::new(vec![message(1), message(2), message(3)]),
        RecordingHandler {
            fail_offsets: vec![2],
            ..Default::default()
        },
    );

    for _ in 0..3 {
        assert_eq!(consumer.poll_once(), LoopState::Polling);
    }

    assert_eq!(consumer.handler().handled, vec![1, 3]);
    assert_eq!(
        consumer.handler().failures,
        vec!["Handler error: cannot handle offset 2"]
    );
    let committed: Vec<i64> = consumer.transport().commits.iter().map(|c| c.1).collect();
    assert_eq!(committed, vec![2, 4]);
}

#[test]
fn commit_mode_follows_configuration() {
    let mut config = config();
    let mut consumer = scripted(&config, vec![message(1)]);
    consumer.poll_once();
    assert!(consumer.transport().commits.is_empty());

    config.auto_commit = false;
    config.commit_async = false;
    let mut consumer = scripted(&config, vec![message(5)]);
    consumer.poll_once();
    assert_eq!(consumer.transport().commits, vec![(0, 6, false)]);

    config.commit_async = true;
    let mut consumer = scripted(&config, vec![message(5)]);
    consumer.poll_once();
    assert_eq!(consumer.transport().commits, vec![(0, 6, true)]);
}

#[test]
fn breaking_failure_callback_terminates() {
    let mut consumer = ConsumerLoop::new(
        &config(),
        ScriptedTransport::new(vec![
            Some(Err(KafkaError::MessageConsumption(
                RDKafkaErrorCode::BrokerTransportFailure,
            ))),
            message(1),
        ]),
        RecordingHandler {
            break_on_failure: true,
            ..Default::default()
        },
    );

    assert_eq!(consumer.poll_once(), LoopState::Terminated);
    assert_eq!(consumer.poll_once(), LoopState::Terminated);
    assert_eq!(consumer.transport().consumed, 1);
}

#[test]
fn shutdown_handle_stops_run() {
    let mut consumer = scripted(&config(), vec![message(1), None, message(2)]);
    let handle = consumer.shutdown_handle();
    consumer.transport_mut().shutdown_when_empty = Some(handle);

    consumer.run();

    assert_eq!(consumer.state(), LoopState::Terminated);
    assert_eq!(consumer.handler().handled, vec![1, 2]);
    assert_eq!(consumer.stats().polls, 3);
}

#[test]
fn middleware_warning_skips_handler() {
    let mut consumer = scripted(&config(), vec![message(1), message(2)]).with_middleware(
        from_fn(|message: Message, next: Next<'_, Message>| {
            if message.offset == 1 {
                return Err(Error::Warning("skipping offset 1".to_string()));
            }
            next.run(message)
        }),
    );

    consumer.poll_once();
    consumer.poll_once();

    assert_eq!(consumer.handler().handled, vec![2]);
    assert_eq!(consumer.handler().warnings, vec!["Kafka warning: skipping offset 1"]);
}

#[test]
fn closure_handlers_are_accepted() {
    let mut seen = Vec::new();
    {
        let mut consumer = ConsumerLoop::new(
            &config(),
            ScriptedTransport::new(vec![message(3)]),
            |message: &Message| -> anyhow::Result<()> {
                seen.push(message.offset);
                Ok(())
            },
        );
        consumer.poll_once();
    }
    assert_eq!(seen, vec![3]);
}
