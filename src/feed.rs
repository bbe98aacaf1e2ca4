use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::app::Result;
use crate::domain::{
    Activity, ActivityRef, AddActivitiesResponse, ApiResponse, FeedIdentity, FeedResponse,
    FollowPage, NewActivity, RemoveActivityResponse, TargetUpdateResponse,
};
use crate::graph::{Direction, FollowGraph, FollowListOptions, FollowOptions, UnfollowOptions};
use crate::normalizer::{self, EnrichmentOptions, Query, ReadOptions};
use crate::realtime::{Callback, RealtimeMessage, SubscriptionHandle, SubscriptionManager};
use crate::targets::TargetMutation;
use crate::transport::{ApiRequest, Method, Transport, TransportError};

/// One feed of the service, bound to the capabilities it needs.
///
/// Every operation validates locally first and only then calls the transport,
/// so a `Validation` or `Configuration` error means nothing was sent.
#[derive(Clone)]
pub struct Feed {
    identity: FeedIdentity,
    transport: Arc<dyn Transport + Send + Sync>,
    subscriptions: SubscriptionManager,
    /// Reference used as `actor` when an activity has none.
    current_actor: Option<String>,
    enrich_by_default: bool,
}

impl Feed {
    pub fn new(
        identity: FeedIdentity,
        transport: Arc<dyn Transport + Send + Sync>,
        subscriptions: SubscriptionManager,
        current_actor: Option<String>,
        enrich_by_default: bool,
    ) -> Self {
        Self {
            identity,
            transport,
            subscriptions,
            current_actor,
            enrich_by_default,
        }
    }

    pub fn identity(&self) -> &FeedIdentity {
        &self.identity
    }

    /// Composite id, `slug:user_id`.
    pub fn id(&self) -> String {
        self.identity.id()
    }

    pub fn channel_name(&self) -> Option<String> {
        self.subscriptions.channel_name(&self.identity)
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let value = self.transport.send(request).await?;
        Ok(serde_json::from_value(value).map_err(TransportError::from)?)
    }

    fn feed_path(&self) -> String {
        format!("feed/{}/", self.identity.url_path())
    }

    fn with_default_actor(&self, mut activity: NewActivity) -> NewActivity {
        if activity.actor.is_none() {
            activity.actor = self.current_actor.clone();
        }
        activity
    }

    pub async fn add_activity(&self, activity: NewActivity) -> Result<Activity> {
        let activity = self.with_default_actor(activity);
        let request = ApiRequest::new(Method::Post, self.feed_path(), self.identity.signature())
            .with_body(json!(activity));
        self.call(request).await
    }

    pub async fn add_activities(&self, activities: Vec<NewActivity>) -> Result<AddActivitiesResponse> {
        let request = ApiRequest::new(Method::Post, self.feed_path(), self.identity.signature())
            .with_body(json!({ "activities": activities }));
        self.call(request).await
    }

    pub async fn remove_activity(&self, activity: &ActivityRef) -> Result<RemoveActivityResponse> {
        let mut query = Query::new();
        if activity.is_foreign() {
            query.set("foreign_id", "1");
        }
        let path = format!("{}{}/", self.feed_path(), activity.path_segment()?);
        let request = ApiRequest::new(Method::Delete, path, self.identity.signature())
            .with_query(query);
        self.call(request).await
    }

    /// Read the feed. Enrichment flags route the read to the enriched endpoint.
    pub async fn get(&self, options: &ReadOptions) -> Result<FeedResponse> {
        let read = normalizer::normalize(options, self.enrich_by_default);
        let path = format!("{}{}/", read.endpoint.prefix(), self.identity.url_path());
        debug!("Reading {} ({:?})", self.identity, read.endpoint);
        let request = ApiRequest::new(Method::Get, path, self.identity.signature())
            .with_query(read.query);
        self.call(request).await
    }

    /// Read a single activity, optionally enriched.
    pub async fn get_activity_detail(
        &self,
        activity_id: &str,
        enrichment: EnrichmentOptions,
    ) -> Result<FeedResponse> {
        let options = ReadOptions::new()
            .id_lte(activity_id)
            .id_gte(activity_id)
            .limit(1)
            .enrichment(enrichment);
        self.get(&options).await
    }

    pub async fn follow(
        &self,
        target_slug: &str,
        target_user_id: &str,
        options: &FollowOptions,
    ) -> Result<ApiResponse> {
        let request = FollowGraph::new(&self.identity).follow(target_slug, target_user_id, options)?;
        self.call(request).await
    }

    pub async fn unfollow(
        &self,
        target_slug: &str,
        target_user_id: &str,
        options: &UnfollowOptions,
    ) -> Result<ApiResponse> {
        let request =
            FollowGraph::new(&self.identity).unfollow(target_slug, target_user_id, options)?;
        self.call(request).await
    }

    /// Feeds this feed follows.
    pub async fn following(&self, options: &FollowListOptions) -> Result<FollowPage> {
        let request = FollowGraph::new(&self.identity).list(Direction::Following, options);
        self.call(request).await
    }

    /// Feeds following this feed.
    pub async fn followers(&self, options: &FollowListOptions) -> Result<FollowPage> {
        let request = FollowGraph::new(&self.identity).list(Direction::Followers, options);
        self.call(request).await
    }

    /// Edit the "to" targets of the activity identified by `foreign_id` and `time`.
    pub async fn update_activity_to_targets(
        &self,
        foreign_id: &str,
        time: &str,
        new_targets: Option<Vec<String>>,
        added_targets: Option<Vec<String>>,
        removed_targets: Option<Vec<String>>,
    ) -> Result<TargetUpdateResponse> {
        let mutation =
            TargetMutation::new(foreign_id, time, new_targets, added_targets, removed_targets)?;
        self.apply_target_mutation(mutation).await
    }

    pub async fn apply_target_mutation(&self, mutation: TargetMutation) -> Result<TargetUpdateResponse> {
        self.call(mutation.into_request(&self.identity)).await
    }

    /// Listen for real-time updates on this feed.
    pub async fn subscribe<F>(&self, callback: F) -> Result<Arc<dyn SubscriptionHandle>>
    where
        F: Fn(RealtimeMessage) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        self.subscriptions.subscribe(&self.identity, callback).await
    }

    /// Cancel updates started by [`subscribe`](Self::subscribe). No-op when not subscribed.
    pub async fn unsubscribe(&self) {
        self.subscriptions.unsubscribe(&self.identity).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::FeedError;
    use crate::normalizer::QueryValue;
    use crate::realtime::{LocalRealtime, SubscriptionRegistry};
    use crate::transport::testing::RecordingTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        transport: Arc<RecordingTransport>,
        hub: LocalRealtime,
        registry: Arc<SubscriptionRegistry>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                transport: Arc::new(RecordingTransport::new()),
                hub: LocalRealtime::new(),
                registry: Arc::new(SubscriptionRegistry::new()),
            }
        }

        fn feed(&self, slug: &str, user_id: &str) -> Feed {
            let subscriptions = SubscriptionManager::new(
                Some("42".into()),
                Arc::new(self.hub.clone()),
                self.registry.clone(),
            );
            Feed::new(
                FeedIdentity::new(slug, user_id, "secret").unwrap(),
                self.transport.clone(),
                subscriptions,
                Some("SU:alice".into()),
                false,
            )
        }
    }

    #[tokio::test]
    async fn test_get_selects_endpoint() {
        let harness = Harness::new();
        let feed = harness.feed("user", "alice");

        assert_ok!(feed.get(&ReadOptions::new()).await);
        assert_eq!(harness.transport.last().path, "feed/user/alice/");

        let options = ReadOptions::new()
            .enrichment(EnrichmentOptions::new().with_recent_reactions(true));
        assert_ok!(feed.get(&options).await);
        let request = harness.transport.last();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "enrich/feed/user/alice/");
    }

    #[tokio::test]
    async fn test_get_serializes_mark_read() {
        let harness = Harness::new();
        let feed = harness.feed("notification", "alice");

        assert_ok!(feed.get(&ReadOptions::new().mark_read(vec!["id1", "id2"])).await);
        assert_eq!(
            harness.transport.last().query.get("mark_read"),
            Some(&QueryValue::Str("id1,id2".into()))
        );

        assert_ok!(feed.get(&ReadOptions::new().mark_read(true)).await);
        assert_eq!(
            harness.transport.last().query.get("mark_read"),
            Some(&QueryValue::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_get_activity_detail_pins_cursor() {
        let harness = Harness::new();
        let feed = harness.feed("user", "alice");

        assert_ok!(
            feed.get_activity_detail("abc", EnrichmentOptions::new().with_reaction_counts(true))
                .await
        );
        let request = harness.transport.last();
        assert_eq!(request.path, "enrich/feed/user/alice/");
        assert_eq!(request.query.get("id_lte"), Some(&QueryValue::Str("abc".into())));
        assert_eq!(request.query.get("id_gte"), Some(&QueryValue::Str("abc".into())));
        assert_eq!(request.query.get("limit"), Some(&QueryValue::Int(1)));
    }

    #[tokio::test]
    async fn test_add_activity_defaults_actor() {
        let harness = Harness::new();
        let feed = harness.feed("user", "alice");
        harness.transport.respond_with(Ok(json!({
            "id": "abc",
            "actor": "SU:alice",
            "verb": "eat",
            "object": "food:1",
            "duration": "1ms",
        })));

        let activity = NewActivity {
            verb: "eat".into(),
            object: json!("food:1"),
            ..Default::default()
        };
        let stored = feed.add_activity(activity).await.unwrap();
        assert_eq!(stored.id, "abc");

        let request = harness.transport.last();
        assert_eq!(request.path, "feed/user/alice/");
        assert_eq!(request.body.unwrap()["actor"], json!("SU:alice"));
    }

    #[tokio::test]
    async fn test_add_activities_wraps_batch() {
        let harness = Harness::new();
        let feed = harness.feed("user", "alice");

        let batch = vec![
            NewActivity::new("SU:alice", "eat", "food:1"),
            NewActivity::new("SU:alice", "eat", "food:2"),
        ];
        assert_ok!(feed.add_activities(batch).await);
        let body = harness.transport.last().body.unwrap();
        assert_eq!(body["activities"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_activity_by_foreign_id() {
        let harness = Harness::new();
        let feed = harness.feed("user", "alice");
        harness.transport.respond_with(Ok(json!({"removed": "post:1"})));
        harness.transport.respond_with(Ok(json!({"removed": "abc"})));

        let removed = feed
            .remove_activity(&ActivityRef::foreign_id("post:1"))
            .await
            .unwrap();
        assert_eq!(removed.removed, "post:1");
        let request = harness.transport.last();
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "feed/user/alice/post%3A1/");
        assert_eq!(request.query.get("foreign_id"), Some(&QueryValue::Str("1".into())));

        assert_ok!(feed.remove_activity(&ActivityRef::id("abc")).await);
        assert!(harness.transport.last().query.is_empty());
    }

    #[tokio::test]
    async fn test_remove_activity_escapes_reference() {
        let harness = Harness::new();
        let feed = harness.feed("user", "alice");
        harness.transport.respond_with(Ok(json!({"removed": "../x"})));

        assert_ok!(feed.remove_activity(&ActivityRef::id("../x")).await);
        assert_eq!(harness.transport.last().path, "feed/user/alice/..%2Fx/");

        let err = assert_err!(feed.remove_activity(&ActivityRef::id("..")).await);
        assert!(matches!(err, FeedError::Validation(_)));
        assert_eq!(harness.transport.count(), 1);
    }

    #[tokio::test]
    async fn test_following_filter_is_joined() {
        let harness = Harness::new();
        let feed = harness.feed("timeline", "bob");
        let options = FollowListOptions {
            filter: Some(vec!["user:1".into(), "user:2".into()]),
            ..Default::default()
        };

        assert_ok!(feed.following(&options).await);
        assert_eq!(
            harness.transport.last().query.get("filter"),
            Some(&QueryValue::Str("user:1,user:2".into()))
        );
    }

    #[tokio::test]
    async fn test_invalid_follow_sends_nothing() {
        let harness = Harness::new();
        let feed = harness.feed("timeline", "bob");

        let err = feed
            .follow("user", "bad id", &FollowOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));
        assert_eq!(harness.transport.count(), 0);
    }

    #[tokio::test]
    async fn test_update_targets_validation_sends_nothing() {
        let harness = Harness::new();
        let feed = harness.feed("user", "alice");
        fn ids(values: &[&str]) -> Option<Vec<String>> {
            Some(values.iter().map(|v| v.to_string()).collect())
        }

        assert_err!(feed.update_activity_to_targets("fid", "t", None, None, None).await);
        assert_err!(
            feed.update_activity_to_targets("fid", "t", ids(&["a"]), ids(&["b"]), None)
                .await
        );
        assert_err!(
            feed.update_activity_to_targets("fid", "t", None, ids(&["a", "b"]), ids(&["b", "c"]))
                .await
        );
        assert_eq!(harness.transport.count(), 0);

        harness.transport.respond_with(Ok(json!({
            "id": "abc",
            "added": ["a"],
            "removed": ["b"],
        })));
        let response = feed
            .update_activity_to_targets("fid", "t", None, ids(&["a"]), ids(&["b"]))
            .await
            .unwrap();
        assert_eq!(response.added, vec!["a"]);
        assert_eq!(
            harness.transport.last().body,
            Some(json!({
                "foreign_id": "fid",
                "time": "t",
                "added_targets": ["a"],
                "removed_targets": ["b"],
            }))
        );
    }

    #[tokio::test]
    async fn test_transport_errors_pass_through() {
        let harness = Harness::new();
        let feed = harness.feed("user", "alice");
        harness.transport.respond_with(Err(TransportError::Api {
            status: 404,
            code: Some(16),
            detail: Some("feed not found".into()),
            body: String::new(),
        }));

        let err = feed.get(&ReadOptions::new()).await.unwrap_err();
        match err {
            FeedError::Transport(TransportError::Api { status, code, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(code, Some(16));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_feeds_share_subscription_slot() {
        let harness = Harness::new();
        let first = harness.feed("user", "alice");
        let second = harness.feed("user", "alice");
        assert_eq!(first.channel_name(), second.channel_name());

        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        let handle = first
            .subscribe(move |_: RealtimeMessage| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        harness
            .hub
            .publish("site-42-feed-useralice", RealtimeMessage::default());
        assert_eq!(received.load(Ordering::SeqCst), 1);

        second.unsubscribe().await;
        assert!(handle.is_cancelled());
        assert!(harness.registry.is_empty().await);

        // Second unsubscribe is a no-op.
        first.unsubscribe().await;
    }
}
