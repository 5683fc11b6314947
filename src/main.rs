//! CLI for the RocketMQ queue driver
//!
//! Subcommands:
//! - `demo`: push a few jobs through an in-process broker and work them off
//! - `check-config`: load and validate the configuration, then print it

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use rocketmq_queue::broker::{BrokerError, Credentials, InMemoryBroker};
use rocketmq_queue::config::{Settings, load_config, load_config_from};
use rocketmq_queue::queue::{DecodedPayload, JobEnvelope, PayloadShape};
use rocketmq_queue::utils::logging;
use rocketmq_queue::{JobContract, JobFramework, QueueError, QueueResult, RocketConnector, RocketQueue};
use serde_json::{Value, json};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "rocketmq-queue", version)]
struct Cli {
    /// Configuration file to read instead of `config/default`
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a worker against an in-process broker with a few seeded jobs
    Demo {
        /// Stop after this many consecutive empty polls
        #[arg(long, default_value_t = 3)]
        idle_polls: u32,
    },
    /// Validate the configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging.level);

    let result = match cli.command {
        Command::Demo { idle_polls } => run_demo(settings, idle_polls).await,
        Command::CheckConfig => check_config(&settings),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn check_config(settings: &Settings) -> QueueResult<()> {
    settings.queue.validate()?;
    info!("configuration is valid");
    println!("{:#?}", settings.queue);
    Ok(())
}

/// A job for the demo worker: a `Class@method` handler and its body.
#[derive(Debug, Clone)]
struct DemoJob {
    handler: String,
    body: String,
}

impl DemoJob {
    fn new(handler: &str, body: &str) -> Self {
        Self {
            handler: handler.to_string(),
            body: body.to_string(),
        }
    }
}

/// Job framework that logs every job it runs.
///
/// A job whose data carries `fail_attempts: n` fails its first `n` attempts.
struct LogFramework;

impl JobFramework for LogFramework {
    type Job = DemoJob;

    fn payload_shape(&self) -> Option<PayloadShape> {
        Some(PayloadShape::WithQueue)
    }

    fn create_payload(&self, job: &DemoJob, queue: Option<&str>, data: &Value) -> QueueResult<String> {
        let mut envelope = JobEnvelope::new(job.handler.clone(), data.clone());
        envelope.max_tries = Some(3);
        envelope.extra.insert("queue".to_string(), json!(queue));
        Ok(serde_json::to_string(&envelope)?)
    }

    fn plain_payload(&self, job: &DemoJob) -> QueueResult<String> {
        Ok(job.body.clone())
    }

    fn resolve_and_fire(&self, job: &dyn JobContract, payload: &DecodedPayload) -> QueueResult<()> {
        let data = payload.data();
        let fail_attempts = data
            .get("fail_attempts")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if u64::from(job.attempts()) <= fail_attempts {
            return Err(QueueError::framework(format!(
                "{} failed on attempt {}",
                payload.job(),
                job.attempts()
            )));
        }

        info!(
            job_id = job.job_id(),
            queue = job.queue(),
            attempts = job.attempts(),
            handler = payload.display_name().unwrap_or("?"),
            data = %data,
            "handled job"
        );
        Ok(())
    }
}

type DemoQueue = RocketQueue<InMemoryBroker, LogFramework>;

async fn run_demo(settings: Settings, idle_polls: u32) -> QueueResult<()> {
    let broker = InMemoryBroker::with_visibility_timeout(std::time::Duration::from_secs(2));
    let connector = RocketConnector::new(move |credentials: &Credentials| -> Result<_, BrokerError> {
        info!(endpoint = %credentials.endpoint, "using in-process broker");
        Ok(broker.clone())
    })
    .with_connection_name("rocketmq");

    let queue = Arc::new(connector.connect(&settings.queue, Arc::new(LogFramework))?);
    seed(&queue)?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut worker = tokio::task::spawn_blocking({
        let queue = Arc::clone(&queue);
        let stop = Arc::clone(&stop);
        move || work(&queue, &stop, idle_polls)
    });

    tokio::select! {
        joined = &mut worker => {
            return joined.map_err(|e| QueueError::framework(format!("worker panicked: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Finishing current job.");
            stop.store(true, Ordering::SeqCst);
        }
    }

    worker
        .await
        .map_err(|e| QueueError::framework(format!("worker panicked: {e}")))?
}

fn seed(queue: &DemoQueue) -> QueueResult<()> {
    let emails = Some("emails");
    if queue.is_plain() {
        for body in ["hello", "world"] {
            queue.push(&DemoJob::new("", body), &Value::Null, emails)?;
        }
        return Ok(());
    }

    queue.push(
        &DemoJob::new("App\\Mail\\Welcome@send", ""),
        &json!({"to": "ada@example.com"}),
        emails,
    )?;
    queue.push(
        &DemoJob::new("App\\Mail\\Digest@send", ""),
        &json!({"to": "bob@example.com", "fail_attempts": 1}),
        emails,
    )?;
    queue.later(
        2,
        &DemoJob::new("App\\Mail\\Reminder@send", ""),
        &json!({"to": "eve@example.com"}),
        emails,
    )?;
    info!(size = queue.size(emails), "seeded demo jobs");
    Ok(())
}

fn work(queue: &DemoQueue, stop: &AtomicBool, idle_polls: u32) -> QueueResult<()> {
    let mut idle = 0;
    while !stop.load(Ordering::SeqCst) && idle < idle_polls {
        let Some(mut job) = queue.pop(Some("emails"))? else {
            idle += 1;
            continue;
        };
        idle = 0;

        match job.fire() {
            Ok(()) => job.delete()?,
            Err(e) => {
                warn!(job_id = job.job_id(), attempts = job.attempts(), "job failed: {}", e);
                job.release(0)?;
            }
        }
    }
    info!("worker stopped");
    Ok(())
}
