use std::sync::Arc;

use crate::app::error::{FeedError, Result};
use crate::config::Config;
use crate::domain::FeedIdentity;
use crate::feed::Feed;
use crate::realtime::bayeux::BayeuxClient;
use crate::realtime::{RealtimeTransport, SubscriptionManager, SubscriptionRegistry};
use crate::transport::http::HttpTransport;
use crate::transport::Transport;

pub struct ClientContext {
    pub api_key: String,
    pub app_id: Option<String>,
    pub transport: Arc<dyn Transport + Send + Sync>,
    pub subscriptions: SubscriptionManager,
    pub current_user: Option<String>,
    pub enrich_by_default: bool,
}

impl ClientContext {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = &config.client;
        if client.api_key.is_empty() {
            return Err(FeedError::configuration(
                "Missing api key, set [client] api_key in the config file",
            ));
        }

        let transport: Arc<dyn Transport + Send + Sync> = Arc::new(HttpTransport::new(
            &client.api_key,
            client.location.as_deref(),
            client.base_url.as_deref(),
            client.timeout(),
        )?);
        let realtime: Arc<dyn RealtimeTransport> = Arc::new(BayeuxClient::new(
            &config.realtime.url,
            &client.api_key,
            config.realtime.poll_timeout(),
        )?);

        let mut ctx = Self::with_transports(
            &client.api_key,
            client.app_id.clone(),
            transport,
            realtime,
        );
        ctx.current_user = client.user_id.clone().filter(|u| !u.is_empty());
        ctx.enrich_by_default = client.enrich_by_default;
        Ok(ctx)
    }

    pub fn with_transports(
        api_key: &str,
        app_id: Option<String>,
        transport: Arc<dyn Transport + Send + Sync>,
        realtime: Arc<dyn RealtimeTransport>,
    ) -> Self {
        let subscriptions = SubscriptionManager::new(
            app_id.clone(),
            realtime,
            Arc::new(SubscriptionRegistry::new()),
        );

        Self {
            api_key: api_key.to_string(),
            app_id,
            transport,
            subscriptions,
            current_user: None,
            enrich_by_default: false,
        }
    }

    /// Default actor for new activities, `SU:{user_id}`.
    pub fn current_actor(&self) -> Option<String> {
        self.current_user.as_ref().map(|user| format!("SU:{}", user))
    }

    /// Hand out a feed bound to this client's transports and registry.
    pub fn feed(&self, slug: &str, user_id: &str, token: &str) -> Result<Feed> {
        let identity = FeedIdentity::new(slug, user_id, token)?;
        Ok(Feed::new(
            identity,
            self.transport.clone(),
            self.subscriptions.clone(),
            self.current_actor(),
            self.enrich_by_default,
        ))
    }

    /// Cancel every subscription opened by feeds of this client.
    pub async fn unsubscribe_all(&self) -> usize {
        self.subscriptions.unsubscribe_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewActivity;
    use crate::realtime::{LocalRealtime, RealtimeMessage};
    use crate::transport::testing::RecordingTransport;
    use serde_json::json;

    fn context(hub: &LocalRealtime, transport: Arc<RecordingTransport>) -> ClientContext {
        ClientContext::with_transports("key", Some("42".into()), transport, Arc::new(hub.clone()))
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = Config::default();
        let err = ClientContext::from_config(&config).err().unwrap();
        assert!(matches!(err, FeedError::Configuration(_)));
    }

    #[test]
    fn test_from_config_reads_client_section() {
        let mut config = Config::default();
        config.client.api_key = "key".into();
        config.client.app_id = Some("42".into());
        config.client.user_id = Some("alice".into());
        config.client.enrich_by_default = true;

        let ctx = ClientContext::from_config(&config).unwrap();
        assert_eq!(ctx.app_id.as_deref(), Some("42"));
        assert_eq!(ctx.current_actor().as_deref(), Some("SU:alice"));
        assert!(ctx.enrich_by_default);
    }

    #[test]
    fn test_feed_rejects_invalid_identity() {
        let hub = LocalRealtime::new();
        let ctx = context(&hub, Arc::new(RecordingTransport::new()));

        assert!(matches!(
            ctx.feed("user:1", "1", "secret"),
            Err(FeedError::Configuration(_))
        ));
        assert!(matches!(
            ctx.feed("user", "1", ""),
            Err(FeedError::Configuration(_))
        ));
        assert!(matches!(
            ctx.feed("user-x", "1", "secret"),
            Err(FeedError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_feed_uses_current_actor() {
        let hub = LocalRealtime::new();
        let transport = Arc::new(RecordingTransport::new());
        let mut ctx = context(&hub, transport.clone());
        ctx.current_user = Some("bob".into());

        transport.respond_with(Ok(json!({
            "id": "a1",
            "actor": "SU:bob",
            "verb": "tweet",
            "object": "Tweet:1",
        })));

        let feed = ctx.feed("user", "bob", "secret").unwrap();
        let activity = NewActivity {
            verb: "tweet".into(),
            object: json!("Tweet:1"),
            ..Default::default()
        };
        feed.add_activity(activity).await.unwrap();

        let body = transport.last().body.unwrap();
        assert_eq!(body["actor"], "SU:bob");
    }

    #[tokio::test]
    async fn test_feeds_share_registry() {
        let hub = LocalRealtime::new();
        let ctx = context(&hub, Arc::new(RecordingTransport::new()));

        let first = ctx.feed("user", "1", "secret").unwrap();
        let second = ctx.feed("user", "1", "secret").unwrap();
        let other = ctx.feed("user", "2", "secret").unwrap();

        let old = first.subscribe(|_: RealtimeMessage| {}).await.unwrap();
        second.subscribe(|_: RealtimeMessage| {}).await.unwrap();
        other.subscribe(|_: RealtimeMessage| {}).await.unwrap();

        assert!(old.is_cancelled());
        assert_eq!(ctx.subscriptions.registry().len().await, 2);
        assert_eq!(ctx.unsubscribe_all().await, 2);
        assert_eq!(hub.listener_count("site-42-feed-user1"), 0);
    }
}
