//! # Feedwire
//!
//! A client for a hosted activity-feed service: feed reads and writes, follow
//! graph management, activity target edits, and real-time feed updates.
//!
//! ## Architecture
//!
//! ```text
//! ClientContext → Feed → {identity, normalizer, graph, targets} → Transport
//!                      → SubscriptionManager → RealtimeTransport → callback
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Read a feed
//! feedwire --token <TOKEN> get user:alice --limit 10
//!
//! # Follow another feed
//! feedwire --token <TOKEN> follow timeline:alice user:bob
//!
//! # Stream updates
//! feedwire --token <TOKEN> listen user:alice
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Client context and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: Config file loading
//! - [`domain`]: Feed identity and activity models
//! - [`feed`]: Per-feed operations
//! - [`graph`]: Follow/unfollow request construction
//! - [`normalizer`]: Read option normalization
//! - [`realtime`]: Real-time subscriptions
//! - [`targets`]: Activity target mutations
//! - [`transport`]: HTTP transport

/// Client context and error handling.
///
/// The [`ClientContext`](app::ClientContext) struct wires together the
/// transport, the real-time transport and the shared subscription registry.
pub mod app;

/// Command-line interface using clap.
///
/// Every subcommand takes a `slug:user_id` feed and prints JSON:
/// - `get`, `add`, `remove` - Activity reads and writes
/// - `follow`, `unfollow`, `following`, `followers` - Follow graph
/// - `targets` - Edit the "to" targets of an activity
/// - `listen` - Print real-time updates
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/feedwire/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`FeedIdentity`](domain::FeedIdentity): Validated slug, user id and token
/// - [`NewActivity`](domain::NewActivity) / [`Activity`](domain::Activity)
/// - [`FollowRecord`](domain::FollowRecord)
pub mod domain;

/// The [`Feed`](feed::Feed) façade.
pub mod feed;

/// Follow graph requests.
pub mod graph;

/// Read option normalization, including the enrichment rewrite.
pub mod normalizer;

/// Real-time subscriptions.
///
/// - [`SubscriptionManager`](realtime::SubscriptionManager): One live subscription per channel
/// - [`BayeuxClient`](realtime::BayeuxClient): Long-polling transport
/// - [`LocalRealtime`](realtime::LocalRealtime): In-process transport
pub mod realtime;

/// Activity target mutations.
pub mod targets;

/// Request transport.
///
/// - [`Transport`](transport::Transport): Async trait for API calls
/// - [`HttpTransport`](transport::http::HttpTransport): reqwest-based implementation
pub mod transport;

pub use app::{ClientContext, FeedError, Result};
pub use feed::Feed;
