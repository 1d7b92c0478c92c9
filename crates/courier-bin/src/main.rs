//! courierd - push-notification delivery daemon.

use clap::{Parser, Subcommand};
use courier_config::{init_logging, Config, Credentials, Protocol};
use courier_delivery::WorkerPool;
use courier_protocol::{
    DeviceToken, Message, Payload, Priority, Sequence, BINARY_PAYLOAD_LIMIT, REQUEST_PAYLOAD_LIMIT,
};
use courier_transport::FeedbackClient;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// courierd command-line interface.
#[derive(Parser)]
#[command(name = "courierd")]
#[command(about = "Delivers push notifications to the gateway")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deliver a batch of messages, then exit
    Run {
        /// JSON file with the messages to enqueue
        #[arg(short, long)]
        messages: PathBuf,
    },
    /// Print the feedback service's invalid-token records
    Feedback,
    /// Validate configuration and credentials, then exit
    CheckConfig,
}

/// One message as it appears in the batch file.
#[derive(Debug, Deserialize)]
struct MessageSpec {
    token: DeviceToken,
    #[serde(default)]
    alert: Option<String>,
    #[serde(default)]
    badge: Option<u32>,
    #[serde(default)]
    sound: Option<String>,
    /// Expiry as epoch seconds
    #[serde(default)]
    expiry: Option<u32>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    custom: serde_json::Map<String, serde_json::Value>,
}

fn build_messages(
    specs: Vec<MessageSpec>,
    protocol: Protocol,
) -> Result<Vec<Message>, courier_protocol::ProtocolError> {
    let limit = match protocol {
        Protocol::Binary => BINARY_PAYLOAD_LIMIT,
        Protocol::Request => REQUEST_PAYLOAD_LIMIT,
    };

    let mut sequence = Sequence::new();
    let mut messages = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut payload = Payload::new();
        if let Some(alert) = spec.alert {
            payload = payload.with_alert(alert);
        }
        if let Some(badge) = spec.badge {
            payload = payload.with_badge(badge);
        }
        if let Some(sound) = spec.sound {
            payload = payload.with_sound(sound);
        }
        for (key, value) in spec.custom {
            payload = payload.with_custom(key, value);
        }

        let mut msg = Message::new(sequence.next(), spec.token, payload.to_bytes(limit)?);
        msg.expiry = spec.expiry;
        msg.priority = spec.priority.unwrap_or_default();
        messages.push(msg);
    }
    Ok(messages)
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match cli.command {
        Commands::Run { messages } => {
            config.validate()?;
            let config = Arc::new(config);
            let credentials = Arc::new(Credentials::load(&config)?);

            let specs: Vec<MessageSpec> =
                serde_json::from_str(&std::fs::read_to_string(&messages)?)?;
            let batch = build_messages(specs, config.protocol)?;
            info!(count = batch.len(), "loaded message batch");

            let pool = WorkerPool::for_config(config, credentials)?;
            let queue = pool.queue();
            for msg in batch {
                queue.push(msg).await?;
            }
            queue.close().await;

            let report = pool.run(shutdown_signal()).await;
            println!(
                "delivered {} dropped {} requeued {} undelivered {}",
                report.delivered, report.dropped, report.requeued, report.undelivered
            );
            if report.undelivered > 0 {
                std::process::exit(1);
            }
        }
        Commands::Feedback => {
            config.validate()?;
            let config = Arc::new(config);
            let credentials = Arc::new(Credentials::load(&config)?);

            let client = FeedbackClient::new(config, credentials)?;
            for record in client.fetch().await? {
                println!("{} {}", record.token, record.timestamp);
            }
        }
        Commands::CheckConfig => {
            config.validate()?;
            Credentials::load(&config)?;
            println!("configuration ok");
        }
    }

    Ok(())
}
