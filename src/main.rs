use crate::configuration::{get_configuration, Settings};
use crate::consumer::{subscribe, Worker};
use crate::forwarder::HttpForwarder;
use anyhow::{Context, Result};
use env_logger::Env;
use lapin::{Connection, ConnectionProperties};
use log::{error, info};
use secrecy::ExposeSecret;
use std::time::Instant;
use tokio::sync::watch;

mod configuration;
mod consumer;
mod forwarder;
mod models;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration();
    if let Err(e) = run(configuration).await {
        error!("Worker stopped: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(configuration: Settings) -> Result<()> {
    info!("Starting weather worker");
    let forwarder =
        HttpForwarder::new(configuration.api_url.clone()).context("Failed to build HTTP client")?;

    // Open connection.
    let start_connection = Instant::now();
    let conn = Connection::connect(
        configuration.rabbitmq_url.expose_secret(),
        ConnectionProperties::default(),
    )
    .await
    .context("Failed to connect to RabbitMQ")?;
    info!("Connected to broker in {:?}", start_connection.elapsed());

    let channel = conn
        .create_channel()
        .await
        .context("Failed to open channel")?;
    let consumer = subscribe(&channel, &configuration.queue_name).await?;

    // Nothing signals shutdown yet; the sender only has to outlive the worker.
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(Worker::new(consumer, forwarder, shutdown_rx).run());
    info!(
        "Waiting for messages on {}, forwarding to {}",
        configuration.queue_name, configuration.api_url
    );

    worker.await.context("Worker task panicked")??;
    Ok(())
}
