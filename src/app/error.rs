use thiserror::Error;

use crate::realtime::SubscriptionError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum FeedError {
    /// A required construction input is missing. Raised before any request is built.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed identity or mutation request. Nothing was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),
}

impl FeedError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True when the failure originated locally, before any network call.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
