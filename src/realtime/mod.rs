//! Real-time feed updates.
//!
//! ```text
//! Feed → SubscriptionManager → RealtimeTransport → Callback
//! ```
//!
//! - [`SubscriptionManager`]: channel naming and the one-subscription-per-channel rule
//! - [`SubscriptionRegistry`]: channel → live subscription, shared by all feeds of a client
//! - [`BayeuxClient`]: long-polling transport for the hosted service
//! - [`LocalRealtime`]: in-process hub

pub mod bayeux;
pub mod local;
pub mod subscription;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use bayeux::BayeuxClient;
pub use local::LocalRealtime;
pub use subscription::{Subscription, SubscriptionManager, SubscriptionRegistry};

/// Push payload for one feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default)]
    pub new: Vec<Value>,
    #[serde(default)]
    pub deleted: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RealtimeMessage {
    /// Decode a channel payload, keeping unrecognized shapes in `extra`.
    pub fn from_data(data: Value) -> Self {
        match serde_json::from_value(data.clone()) {
            Ok(message) => message,
            Err(_) => {
                let mut extra = Map::new();
                extra.insert("data".to_string(), data);
                Self {
                    extra,
                    ..Default::default()
                }
            }
        }
    }
}

pub type Callback = Arc<dyn Fn(RealtimeMessage) + Send + Sync>;

/// Credentials attached to a channel subscription.
#[derive(Clone)]
pub struct ChannelAuth {
    pub user_id: String,
    pub token: String,
}

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Subscription to {channel} rejected: {error}")]
    Rejected { channel: String, error: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid real-time endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A live subscription. Cancelling is idempotent.
#[async_trait]
pub trait SubscriptionHandle: Send + Sync {
    fn channel(&self) -> &str;

    fn is_cancelled(&self) -> bool;

    async fn cancel(&self);
}

#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn subscribe(
        &self,
        channel: &str,
        auth: ChannelAuth,
        callback: Callback,
    ) -> Result<Arc<dyn SubscriptionHandle>, SubscriptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_decodes_known_fields() {
        let message = RealtimeMessage::from_data(json!({
            "feed": "user:1",
            "app_id": "42",
            "new": [{"id": "a"}],
            "deleted": ["b"],
            "published_at": "2024-01-01T00:00:00Z",
        }));
        assert_eq!(message.feed.as_deref(), Some("user:1"));
        assert_eq!(message.new.len(), 1);
        assert_eq!(message.deleted, vec![json!("b")]);
        assert!(message.extra.contains_key("published_at"));
    }

    #[test]
    fn test_message_keeps_unexpected_payload() {
        let message = RealtimeMessage::from_data(json!(["not", "an", "object"]));
        assert_eq!(message.extra["data"], json!(["not", "an", "object"]));
        assert!(message.new.is_empty());
    }
}
