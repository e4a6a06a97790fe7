use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Sink {sink} failed to deliver batch: {detail}")]
    SinkDeliveryFailure { sink: String, detail: String },

    #[error("Subscription failure: {0}")]
    SubscriptionFailure(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
