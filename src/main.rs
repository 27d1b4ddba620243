//! Command-line interface for kafka-relay
//!
//! # Usage Examples
//!
//! ## Produce
//! ```bash
//! # One record per stdin line, fire and forget
//! seq 1 1000 | kafka-relay produce --brokers localhost:9092 --topic numbers
//!
//! # Batch mode with broker acknowledgment at the end
//! cat orders.jsonl | kafka-relay produce \
//!   --brokers localhost:9092 --topic orders \
//!   --is-async false --required-acknowledgment --max-poll-records 500
//!
//! # JSON lines encoded as Avro
//! cat orders.jsonl | kafka-relay produce \
//!   --brokers localhost:9092 --topic orders \
//!   --schema-file order.avsc --registry-url http://localhost:8081
//! ```
//!
//! ## Consume
//! ```bash
//! # Log messages until Ctrl-C
//! kafka-relay consume --brokers localhost:9092 --topic orders --consumer-group audit
//!
//! # Read one partition from a given offset, committing manually
//! kafka-relay consume --brokers localhost:9092 --topic orders \
//!   --partition 0 --offset 42 --auto-commit false --commit-async false
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) to see the log output.

use clap::{Parser, Subcommand};
use kafka_relay::consumer::ShutdownHandle;
use kafka_relay::{consume, produce, ConsumeArgs, ProduceArgs};

#[derive(Parser)]
#[command(name = "kafka-relay")]
#[command(about = "Produce and consume Kafka records through middleware chains")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce stdin lines to a topic
    Produce(ProduceArgs),
    /// Consume a topic and log every message
    Consume(ConsumeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Produce(args) => {
            // librdkafka calls block, keep them off the async workers
            tokio::task::spawn_blocking(move || produce::run(args, std::io::stdin().lock()))
                .await??;
        }
        Commands::Consume(args) => {
            let shutdown = ShutdownHandle::default();

            let on_ctrl_c = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl-C, shutting down consumer");
                    on_ctrl_c.shutdown();
                }
            });

            let handled =
                tokio::task::spawn_blocking(move || consume::run(args, shutdown)).await??;
            tracing::info!("Consumer stopped after {handled} messages");
        }
    }

    Ok(())
}
