//! Bayeux long-polling client for the hosted real-time endpoint.
//!
//! One handshake per client; a background task keeps a `/meta/connect` poll
//! open and dispatches data messages to the callback registered for their
//! channel, in the order the server returns them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::realtime::{
    Callback, ChannelAuth, RealtimeMessage, RealtimeTransport, SubscriptionError,
    SubscriptionHandle,
};

pub const DEFAULT_REALTIME_URL: &str = "https://faye-us-east.stream-io-api.com/faye";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 60;

const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Deserialize)]
struct Incoming {
    channel: String,
    #[serde(rename = "clientId")]
    client_id: Option<String>,
    successful: Option<bool>,
    error: Option<String>,
    data: Option<Value>,
    advice: Option<Advice>,
}

#[derive(Debug, Deserialize)]
struct Advice {
    reconnect: Option<String>,
}

impl Incoming {
    fn is_meta(&self) -> bool {
        self.channel.starts_with("/meta/")
    }

    fn wants_handshake(&self) -> bool {
        self.advice
            .as_ref()
            .and_then(|a| a.reconnect.as_deref())
            .is_some_and(|r| r == "handshake")
    }
}

struct Route {
    id: u64,
    auth: ChannelAuth,
    callback: Callback,
}

struct Session {
    client_id: String,
    poller: JoinHandle<()>,
}

struct Inner {
    http: Client,
    endpoint: Url,
    api_key: String,
    poll_timeout: Duration,
    session: Mutex<Option<Session>>,
    /// Subscription path (`/channel`) → route.
    routes: RwLock<HashMap<String, Route>>,
    next_id: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.poller.abort();
        }
    }
}

impl Inner {
    fn message_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    async fn post(&self, messages: Value, timeout: Duration) -> Result<Vec<Incoming>, SubscriptionError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .timeout(timeout)
            .json(&messages)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn handshake(&self) -> Result<String, SubscriptionError> {
        let request = json!([{
            "channel": "/meta/handshake",
            "version": "1.0",
            "supportedConnectionTypes": ["long-polling"],
            "id": self.message_id(),
        }]);
        let replies = self.post(request, self.poll_timeout).await?;
        let reply = replies
            .into_iter()
            .find(|m| m.channel == "/meta/handshake")
            .ok_or_else(|| SubscriptionError::Handshake("no handshake reply".into()))?;

        match (reply.successful, reply.client_id) {
            (Some(true), Some(client_id)) => {
                debug!("Bayeux handshake complete: {}", client_id);
                Ok(client_id)
            }
            _ => Err(SubscriptionError::Handshake(
                reply.error.unwrap_or_else(|| "handshake refused".into()),
            )),
        }
    }

    async fn send_subscribe(
        &self,
        client_id: &str,
        path: &str,
        auth: &ChannelAuth,
    ) -> Result<(), SubscriptionError> {
        let request = json!([{
            "channel": "/meta/subscribe",
            "clientId": client_id,
            "subscription": path,
            "id": self.message_id(),
            "ext": {
                "user_id": auth.user_id,
                "api_key": self.api_key,
                "signature": auth.token,
            },
        }]);
        let replies = self.post(request, self.poll_timeout).await?;
        let reply = replies.into_iter().find(|m| m.channel == "/meta/subscribe");

        match reply {
            Some(reply) if reply.successful == Some(true) => Ok(()),
            other => Err(SubscriptionError::Rejected {
                channel: path.trim_start_matches('/').to_string(),
                error: other
                    .and_then(|r| r.error)
                    .unwrap_or_else(|| "no subscribe reply".into()),
            }),
        }
    }

    async fn send_unsubscribe(&self, client_id: &str, path: &str) -> Result<(), SubscriptionError> {
        let request = json!([{
            "channel": "/meta/unsubscribe",
            "clientId": client_id,
            "subscription": path,
            "id": self.message_id(),
        }]);
        self.post(request, self.poll_timeout).await.map(|_| ())
    }

    async fn send_disconnect(&self, client_id: &str) -> Result<(), SubscriptionError> {
        let request = json!([{
            "channel": "/meta/disconnect",
            "clientId": client_id,
            "id": self.message_id(),
        }]);
        self.post(request, self.poll_timeout).await.map(|_| ())
    }

    fn routes(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Route>> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn routes_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Route>> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, message: Incoming) {
        let Some(data) = message.data else {
            return;
        };
        let callback = self.routes().get(&message.channel).map(|r| r.callback.clone());
        match callback {
            Some(callback) => callback(RealtimeMessage::from_data(data)),
            None => debug!("Dropping message for unrouted channel {}", message.channel),
        }
    }

    /// Re-handshake and re-subscribe every routed channel.
    async fn recover(&self) -> Result<String, SubscriptionError> {
        let client_id = self.handshake().await?;
        let routes: Vec<(String, ChannelAuth)> = self
            .routes()
            .iter()
            .map(|(path, route)| (path.clone(), route.auth.clone()))
            .collect();
        for (path, auth) in routes {
            if let Err(e) = self.send_subscribe(&client_id, &path, &auth).await {
                warn!("Failed to restore subscription {}: {}", path, e);
            }
        }
        if let Some(session) = self.session.lock().await.as_mut() {
            session.client_id = client_id.clone();
        }
        Ok(client_id)
    }
}

async fn connect_loop(weak: Weak<Inner>, mut client_id: String) {
    loop {
        let Some(inner) = weak.upgrade() else {
            return;
        };

        let request = json!([{
            "channel": "/meta/connect",
            "clientId": client_id,
            "connectionType": "long-polling",
            "id": inner.message_id(),
        }]);
        // Leave the server room to hold the poll open for its full timeout.
        let timeout = inner.poll_timeout + Duration::from_secs(10);

        match inner.post(request, timeout).await {
            Ok(messages) => {
                let mut rehandshake = false;
                for message in messages {
                    if message.is_meta() {
                        if message.successful == Some(false) && message.wants_handshake() {
                            rehandshake = true;
                        }
                        continue;
                    }
                    inner.dispatch(message);
                }

                if rehandshake {
                    info!("Bayeux session expired, handshaking again");
                    match inner.recover().await {
                        Ok(id) => client_id = id,
                        Err(e) => {
                            error!("Bayeux recovery failed: {}", e);
                            tokio::time::sleep(RETRY_DELAY).await;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Bayeux connect failed: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

/// Long-polling real-time transport.
#[derive(Clone)]
pub struct BayeuxClient {
    inner: Arc<Inner>,
}

impl BayeuxClient {
    pub fn new(endpoint: &str, api_key: &str, poll_timeout: Duration) -> Result<Self, SubscriptionError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                endpoint: Url::parse(endpoint)?,
                api_key: api_key.to_string(),
                poll_timeout,
                session: Mutex::new(None),
                routes: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Handshake if needed. The returned guard keeps the session alive until
    /// the caller has routed its channel.
    async fn ensure_session(
        &self,
    ) -> Result<(MutexGuard<'_, Option<Session>>, String), SubscriptionError> {
        let mut session = self.inner.session.lock().await;
        if let Some(existing) = session.as_ref() {
            if !existing.poller.is_finished() {
                let client_id = existing.client_id.clone();
                return Ok((session, client_id));
            }
        }

        let client_id = self.inner.handshake().await?;
        let poller = tokio::spawn(connect_loop(Arc::downgrade(&self.inner), client_id.clone()));
        *session = Some(Session {
            client_id: client_id.clone(),
            poller,
        });
        Ok((session, client_id))
    }
}

#[async_trait]
impl RealtimeTransport for BayeuxClient {
    async fn subscribe(
        &self,
        channel: &str,
        auth: ChannelAuth,
        callback: Callback,
    ) -> Result<Arc<dyn SubscriptionHandle>, SubscriptionError> {
        let (session, client_id) = self.ensure_session().await?;
        let path = format!("/{}", channel);
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);

        // Route first so nothing delivered right after the reply is dropped,
        // and while the session is locked so a concurrent cancel can't end it.
        self.inner.routes_mut().insert(
            path.clone(),
            Route {
                id,
                auth: auth.clone(),
                callback,
            },
        );
        drop(session);

        if let Err(e) = self.inner.send_subscribe(&client_id, &path, &auth).await {
            let mut routes = self.inner.routes_mut();
            if routes.get(&path).is_some_and(|r| r.id == id) {
                routes.remove(&path);
            }
            return Err(e);
        }

        info!("Bayeux subscribed to {}", path);
        Ok(Arc::new(BayeuxSubscription {
            inner: self.inner.clone(),
            channel: channel.to_string(),
            path,
            id,
            cancelled: AtomicBool::new(false),
        }))
    }
}

struct BayeuxSubscription {
    inner: Arc<Inner>,
    channel: String,
    path: String,
    id: u64,
    cancelled: AtomicBool,
}

#[async_trait]
impl SubscriptionHandle for BayeuxSubscription {
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

        let owned = {
            let mut routes = self.inner.routes_mut();
            // A newer subscription may own the path by now.
            let owned = routes.get(&self.path).is_some_and(|r| r.id == self.id);
            if owned {
                routes.remove(&self.path);
            }
            owned
        };
        if !owned {
            return;
        }

        let mut session = self.inner.session.lock().await;
        let Some(client_id) = session.as_ref().map(|s| s.client_id.clone()) else {
            return;
        };

        if let Err(e) = self.inner.send_unsubscribe(&client_id, &self.path).await {
            warn!("Failed to unsubscribe {}: {}", self.path, e);
        }

        // Checked under the session lock: another channel may have been routed
        // onto this session since our route was removed.
        let idle = self.inner.routes().is_empty();
        if idle {
            if let Some(ended) = session.take() {
                ended.poller.abort();
                if let Err(e) = self.inner.send_disconnect(&ended.client_id).await {
                    debug!("Bayeux disconnect failed: {}", e);
                }
            }
        }
    }
}
