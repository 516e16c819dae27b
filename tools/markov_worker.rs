/// Markov worker — consumes generation requests from AMQP and publishes
/// correlated responses.
///
/// Usage: markov_worker <config.toml> [--debug]
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use markov_generator::config::Config;
use markov_generator::core::handler::RequestHandler;
use markov_generator::health;
use markov_generator::worker::amqp::AmqpTransport;
use markov_generator::worker::Worker;

#[derive(Debug, Parser)]
#[command(name = "markov_worker", about = "Markov sentence generation worker")]
struct Cli {
    /// Path to the TOML configuration file.
    config: PathBuf,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config '{}'", cli.config.display()))?;

    let health_port = config.markov.health_bind;
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_port).await {
            error!(error = %e, "health endpoint stopped");
        }
    });

    let transport = AmqpTransport::connect(&config.rmq.uri, &config.rmq.queue)
        .await
        .context("failed to connect to the message queue")?;
    info!(settings = ?config.generator, "worker ready");

    let mut worker = Worker::new(transport, RequestHandler::new(config.generator));
    worker.run().await.context("worker loop failed")?;

    // A closed consumer means the broker went away; let supervision restart us.
    bail!("consumer closed after {} messages", worker.processed())
}
