use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::realtime::{
    Callback, ChannelAuth, RealtimeMessage, RealtimeTransport, SubscriptionError,
    SubscriptionHandle,
};

struct Listener {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct Hub {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
    reject: AtomicBool,
}

impl Hub {
    fn listeners(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process real-time hub. Messages are delivered synchronously on `publish`.
#[derive(Clone, Default)]
pub struct LocalRealtime {
    hub: Arc<Hub>,
}

impl LocalRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `message` to every listener on `channel`; returns how many received it.
    pub fn publish(&self, channel: &str, message: RealtimeMessage) -> usize {
        let callbacks: Vec<Callback> = self
            .hub
            .listeners()
            .get(channel)
            .map(|ls| ls.iter().map(|l| l.callback.clone()).collect())
            .unwrap_or_default();

        for callback in &callbacks {
            callback(message.clone());
        }
        callbacks.len()
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.hub.listeners().get(channel).map_or(0, Vec::len)
    }

    /// Make subsequent subscribes fail, as a refused channel would.
    pub fn set_reject(&self, reject: bool) {
        self.hub.reject.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl RealtimeTransport for LocalRealtime {
    async fn subscribe(
        &self,
        channel: &str,
        _auth: ChannelAuth,
        callback: Callback,
    ) -> Result<Arc<dyn SubscriptionHandle>, SubscriptionError> {
        if self.hub.reject.load(Ordering::SeqCst) {
            return Err(SubscriptionError::Rejected {
                channel: channel.to_string(),
                error: "403::Authentication failed".to_string(),
            });
        }

        let id = self.hub.next_id.fetch_add(1, Ordering::SeqCst);
        self.hub
            .listeners()
            .entry(channel.to_string())
            .or_default()
            .push(Listener { id, callback });

        Ok(Arc::new(LocalSubscription {
            channel: channel.to_string(),
            id,
            hub: self.hub.clone(),
            cancelled: AtomicBool::new(false),
        }))
    }
}

struct LocalSubscription {
    channel: String,
    id: u64,
    hub: Arc<Hub>,
    cancelled: AtomicBool,
}

#[async_trait]
impl SubscriptionHandle for LocalSubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut listeners = self.hub.listeners();
        if let Some(list) = listeners.get_mut(&self.channel) {
            list.retain(|l| l.id != self.id);
            if list.is_empty() {
                listeners.remove(&self.channel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn auth() -> ChannelAuth {
        ChannelAuth {
            user_id: "site-1-feed-user1".into(),
            token: "secret".into(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_listener_until_cancelled() {
        let hub = LocalRealtime::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let callback: Callback = Arc::new(move |_: RealtimeMessage| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let handle = hub.subscribe("chan", auth(), callback).await.unwrap();
        assert_eq!(hub.publish("chan", RealtimeMessage::default()), 1);
        assert_eq!(hub.publish("other", RealtimeMessage::default()), 0);

        handle.cancel().await;
        handle.cancel().await;
        assert!(handle.is_cancelled());
        assert_eq!(hub.publish("chan", RealtimeMessage::default()), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count("chan"), 0);
    }

    #[tokio::test]
    async fn test_messages_arrive_in_publish_order() {
        let hub = LocalRealtime::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let callback: Callback = Arc::new(move |msg: RealtimeMessage| {
            sink.lock().unwrap().push(msg.feed.unwrap_or_default());
        });
        let _handle = hub.subscribe("chan", auth(), callback).await.unwrap();

        for feed in ["a", "b", "c"] {
            hub.publish(
                "chan",
                RealtimeMessage {
                    feed: Some(feed.into()),
                    ..Default::default()
                },
            );
        }
        assert_eq!(*received.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_reject() {
        let hub = LocalRealtime::new();
        hub.set_reject(true);
        let result = hub.subscribe("chan", auth(), Arc::new(|_: RealtimeMessage| {})).await;
        assert!(matches!(result, Err(SubscriptionError::Rejected { .. })));
    }
}
