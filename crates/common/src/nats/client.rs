use crate::domain::BusSubscriber;
use crate::nats::subscriber::NatsBusSubscriber;
use anyhow::{Context, Result};
use async_nats::jetstream;
use std::sync::Arc;
use tracing::info;

pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: std::time::Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to NATS");

        // Configure connection timeout for establishing the TCP connection
        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        info!("Successfully connected to NATS");
        Ok(Self { client, jetstream })
    }

    /// Create a BusSubscriber trait object backed by JetStream durable pull consumers
    pub fn create_subscriber(&self) -> Arc<dyn BusSubscriber> {
        Arc::new(NatsBusSubscriber::new(self.jetstream.clone()))
    }

    /// Flush outstanding protocol traffic and drop the connection
    pub async fn close(self) -> Result<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        Ok(())
    }
}
