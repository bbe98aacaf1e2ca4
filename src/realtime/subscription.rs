use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::app::{FeedError, Result};
use crate::domain::FeedIdentity;
use crate::realtime::{Callback, ChannelAuth, RealtimeTransport, SubscriptionHandle};

/// A registry entry.
#[derive(Clone)]
pub struct Subscription {
    pub channel_name: String,
    pub token: String,
    pub handle: Arc<dyn SubscriptionHandle>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel_name", &self.channel_name)
            .field("cancelled", &self.handle.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Live subscriptions keyed by channel name. At most one entry per channel.
#[derive(Default)]
pub struct SubscriptionRegistry {
    slots: Mutex<HashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remove(&self, channel_name: &str) -> Option<Subscription> {
        self.slots.lock().await.remove(channel_name)
    }

    pub async fn lookup(&self, channel_name: &str) -> Option<Subscription> {
        self.slots.lock().await.get(channel_name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    pub async fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.slots.lock().await.keys().cloned().collect();
        channels.sort();
        channels
    }
}

/// Opens and closes per-feed real-time subscriptions through a shared registry.
#[derive(Clone)]
pub struct SubscriptionManager {
    app_id: Option<String>,
    realtime: Arc<dyn RealtimeTransport>,
    registry: Arc<SubscriptionRegistry>,
}

impl SubscriptionManager {
    pub fn new(
        app_id: Option<String>,
        realtime: Arc<dyn RealtimeTransport>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            app_id: app_id.filter(|id| !id.is_empty()),
            realtime,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn channel_name(&self, feed: &FeedIdentity) -> Option<String> {
        self.app_id.as_deref().map(|app_id| feed.channel_name(app_id))
    }

    /// Subscribe `callback` to updates of `feed`.
    ///
    /// The registry lock is held while the channel opens, so concurrent
    /// subscribe/unsubscribe calls never lose a registry write. A live entry
    /// for the same channel is cancelled first: both handles would share the
    /// transport-level channel, so cancelling the old one afterwards would
    /// also silence the new one.
    pub async fn subscribe(
        &self,
        feed: &FeedIdentity,
        callback: Callback,
    ) -> Result<Arc<dyn SubscriptionHandle>> {
        let channel_name = self.channel_name(feed).ok_or_else(|| {
            FeedError::configuration("Missing app id, which is needed to subscribe")
        })?;

        let mut slots = self.registry.slots.lock().await;

        if let Some(previous) = slots.remove(&channel_name) {
            warn!("Replacing live subscription on {}", channel_name);
            previous.handle.cancel().await;
        }

        let auth = ChannelAuth {
            user_id: channel_name.clone(),
            token: feed.token().to_string(),
        };
        let handle = self.realtime.subscribe(&channel_name, auth, callback).await?;

        slots.insert(
            channel_name.clone(),
            Subscription {
                channel_name: channel_name.clone(),
                token: feed.token().to_string(),
                handle: handle.clone(),
            },
        );
        info!("Subscribed to {}", channel_name);

        Ok(handle)
    }

    /// Cancel the subscription for `feed`. Returns false when there was none.
    pub async fn unsubscribe(&self, feed: &FeedIdentity) -> bool {
        let Some(channel_name) = self.channel_name(feed) else {
            return false;
        };

        match self.registry.remove(&channel_name).await {
            Some(subscription) => {
                subscription.handle.cancel().await;
                info!("Unsubscribed from {}", channel_name);
                true
            }
            None => false,
        }
    }

    /// Cancel every live subscription.
    pub async fn unsubscribe_all(&self) -> usize {
        let drained: Vec<Subscription> = {
            let mut slots = self.registry.slots.lock().await;
            slots.drain().map(|(_, s)| s).collect()
        };
        let count = drained.len();
        join_all(drained.iter().map(|s| s.handle.cancel())).await;
        if count > 0 {
            info!("Cancelled {} subscriptions", count);
        }
        count
    }
}
