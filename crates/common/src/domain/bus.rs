use crate::domain::error::{DomainError, DomainResult};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Where a new consumer group starts reading when it has no stored position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetPolicy {
    Earliest,
    Latest,
}

impl FromStr for OffsetPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" => Ok(OffsetPolicy::Earliest),
            "latest" => Ok(OffsetPolicy::Latest),
            other => Err(DomainError::ConfigurationError(format!(
                "unknown offset reset policy '{}', expected 'earliest' or 'latest'",
                other
            ))),
        }
    }
}

/// Parameters for establishing a subscription on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub stream: String,
    pub topic: String,
    pub group_id: String,
    pub offset_policy: OffsetPolicy,
}

/// Acknowledges a single message back to the bus
#[async_trait]
pub trait MessageAcker: Send + Sync {
    async fn ack(&self) -> Result<()>;
}

/// A message received from the bus, still undecoded
pub struct BusMessage {
    pub subject: String,
    pub payload: Bytes,
    acker: Option<Box<dyn MessageAcker>>,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            acker: None,
        }
    }

    pub fn with_acker(mut self, acker: impl MessageAcker + 'static) -> Self {
        self.acker = Some(Box::new(acker));
        self
    }

    /// Marks the message as handled so the bus will not redeliver it.
    /// Messages without an acker (e.g. from an auto-committing bus) succeed trivially.
    pub async fn ack(&self) -> Result<()> {
        match &self.acker {
            Some(acker) => acker.ack().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusMessage")
            .field("subject", &self.subject)
            .field("payload_size", &self.payload.len())
            .field("ackable", &self.acker.is_some())
            .finish()
    }
}

/// Trait for establishing bus subscriptions
/// Abstracts the client library so the pipeline only sees decoded-ready messages
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BusSubscriber: Send + Sync {
    /// Create (or resume) a consumer group subscription on a topic
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<Box<dyn BusSubscription>>;
}

/// Trait for an established subscription handle
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BusSubscription: Send {
    /// Fetch up to `max_messages`, waiting at most `timeout`.
    /// An empty vector means nothing arrived in time.
    async fn poll(&mut self, max_messages: usize, timeout: Duration) -> Result<Vec<BusMessage>>;

    /// Release the subscription
    async fn close(&mut self) -> Result<()>;
}
