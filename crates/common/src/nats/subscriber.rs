use crate::domain::{BusMessage, BusSubscriber, BusSubscription, MessageAcker, OffsetPolicy, SubscribeRequest};
use anyhow::{anyhow, Context, Result};
use async_nats::jetstream::{self, consumer::DeliverPolicy};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Concrete implementation of BusSubscriber using JetStream durable pull consumers.
///
/// The consumer group id becomes the durable consumer name, so restarting a
/// pipeline with the same group resumes after the last acknowledged message.
pub struct NatsBusSubscriber {
    context: jetstream::Context,
}

impl NatsBusSubscriber {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

fn deliver_policy(policy: OffsetPolicy) -> DeliverPolicy {
    match policy {
        OffsetPolicy::Earliest => DeliverPolicy::All,
        OffsetPolicy::Latest => DeliverPolicy::New,
    }
}

#[async_trait]
impl BusSubscriber for NatsBusSubscriber {
    #[instrument(skip(self), fields(stream = %request.stream, topic = %request.topic, group = %request.group_id))]
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<Box<dyn BusSubscription>> {
        debug!("creating JetStream consumer");

        let config = jetstream::consumer::pull::Config {
            name: Some(request.group_id.clone()),
            durable_name: Some(request.group_id.clone()),
            filter_subject: request.topic.clone(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            deliver_policy: deliver_policy(request.offset_policy),
            ..Default::default()
        };

        let consumer = self
            .context
            .create_consumer_on_stream(config, request.stream.as_str())
            .await
            .context("Failed to create consumer")?;

        info!("JetStream consumer ready");

        Ok(Box::new(NatsBusSubscription {
            consumer,
            group_id: request.group_id.clone(),
        }))
    }
}

/// Subscription handle over a JetStream pull consumer
pub struct NatsBusSubscription {
    consumer: jetstream::consumer::PullConsumer,
    group_id: String,
}

#[async_trait]
impl BusSubscription for NatsBusSubscription {
    async fn poll(&mut self, max_messages: usize, timeout: Duration) -> Result<Vec<BusMessage>> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(timeout)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let mut result = Vec::new();
        while let Some(msg) = messages.next().await {
            match msg {
                Ok(message) => {
                    let subject = message.subject.to_string();
                    let payload = message.payload.clone();
                    result.push(BusMessage::new(subject, payload).with_acker(JetStreamAcker { message }));
                }
                Err(e) => {
                    warn!(error = %e, "Error receiving message from batch");
                }
            }
        }

        if !result.is_empty() {
            debug!(message_count = result.len(), "Received message batch");
        }
        Ok(result)
    }

    async fn close(&mut self) -> Result<()> {
        // Durable consumer state stays on the server; nothing to tear down
        info!(group = %self.group_id, "Releasing JetStream subscription");
        Ok(())
    }
}

struct JetStreamAcker {
    message: jetstream::Message,
}

#[async_trait]
impl MessageAcker for JetStreamAcker {
    async fn ack(&self) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| anyhow!("Failed to acknowledge message: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_policy_maps_to_deliver_policy() {
        assert!(matches!(deliver_policy(OffsetPolicy::Earliest), DeliverPolicy::All));
        assert!(matches!(deliver_policy(OffsetPolicy::Latest), DeliverPolicy::New));
    }
}
