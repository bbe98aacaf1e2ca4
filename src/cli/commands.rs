use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::app::{ClientContext, FeedError, Result};
use crate::domain::{ActivityRef, NewActivity};
use crate::feed::Feed;
use crate::graph::{FollowListOptions, FollowOptions, UnfollowOptions};
use crate::normalizer::{EnrichmentOptions, ReadOptions};
use crate::realtime::RealtimeMessage;
use crate::transport::TransportError;

/// Split a `slug:user_id` argument.
pub fn parse_feed_ref(feed: &str) -> Result<(&str, &str)> {
    feed.split_once(':')
        .filter(|(slug, user_id)| !slug.is_empty() && !user_id.is_empty())
        .ok_or_else(|| {
            FeedError::validation(format!("Expected a feed as slug:user_id, got {:?}", feed))
        })
}

fn open_feed(ctx: &ClientContext, feed: &str, token: &str) -> Result<Feed> {
    let (slug, user_id) = parse_feed_ref(feed)?;
    ctx.feed(slug, user_id, token)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(TransportError::from)?;
    println!("{}", rendered);
    Ok(())
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

pub struct GetArgs {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub id_lt: Option<String>,
    pub id_gt: Option<String>,
    pub ranking: Option<String>,
    pub enrichment: EnrichmentOptions,
    pub mark_read: bool,
    pub mark_seen: bool,
}

impl GetArgs {
    fn into_options(self) -> ReadOptions {
        let mut options = ReadOptions::new().enrichment(self.enrichment);
        if let Some(limit) = self.limit {
            options = options.limit(limit);
        }
        if let Some(offset) = self.offset {
            options = options.offset(offset);
        }
        if let Some(id) = self.id_lt {
            options = options.id_lt(id);
        }
        if let Some(id) = self.id_gt {
            options = options.id_gt(id);
        }
        if let Some(ranking) = self.ranking {
            options = options.ranking(ranking);
        }
        if self.mark_read {
            options = options.mark_read(true);
        }
        if self.mark_seen {
            options = options.mark_seen(true);
        }
        options
    }
}

pub async fn get(ctx: &ClientContext, token: &str, feed: &str, args: GetArgs) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    let response = feed.get(&args.into_options()).await?;
    print_json(&response)
}

pub struct AddArgs {
    pub verb: String,
    pub object: String,
    pub actor: Option<String>,
    pub foreign_id: Option<String>,
    pub time: Option<String>,
    pub to: Vec<String>,
}

impl AddArgs {
    fn into_activity(self) -> NewActivity {
        NewActivity {
            actor: self.actor,
            verb: self.verb,
            object: Value::String(self.object),
            to: self.to,
            foreign_id: self.foreign_id,
            time: self.time,
            ..Default::default()
        }
    }
}

pub async fn add(ctx: &ClientContext, token: &str, feed: &str, args: AddArgs) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    let activity = feed.add_activity(args.into_activity()).await?;
    print_json(&activity)
}

pub async fn remove(
    ctx: &ClientContext,
    token: &str,
    feed: &str,
    activity: &str,
    foreign: bool,
) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    let reference = if foreign {
        ActivityRef::foreign_id(activity)
    } else {
        ActivityRef::id(activity)
    };
    let response = feed.remove_activity(&reference).await?;
    print_json(&response)
}

pub async fn follow(
    ctx: &ClientContext,
    token: &str,
    feed: &str,
    target: &str,
    activity_copy_limit: Option<u32>,
) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    let (slug, user_id) = parse_feed_ref(target)?;
    let options = FollowOptions {
        limit: activity_copy_limit,
    };
    let response = feed.follow(slug, user_id, &options).await?;
    print_json(&response)
}

pub async fn unfollow(
    ctx: &ClientContext,
    token: &str,
    feed: &str,
    target: &str,
    keep_history: bool,
) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    let (slug, user_id) = parse_feed_ref(target)?;
    let response = feed
        .unfollow(slug, user_id, &UnfollowOptions { keep_history })
        .await?;
    print_json(&response)
}

pub fn list_options(limit: Option<u32>, offset: Option<u32>, filter: Vec<String>) -> FollowListOptions {
    FollowListOptions {
        limit,
        offset,
        filter: non_empty(filter),
    }
}

pub async fn following(
    ctx: &ClientContext,
    token: &str,
    feed: &str,
    options: FollowListOptions,
) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    print_json(&feed.following(&options).await?)
}

pub async fn followers(
    ctx: &ClientContext,
    token: &str,
    feed: &str,
    options: FollowListOptions,
) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    print_json(&feed.followers(&options).await?)
}

pub struct TargetArgs {
    pub foreign_id: String,
    pub time: String,
    pub new_targets: Vec<String>,
    pub added_targets: Vec<String>,
    pub removed_targets: Vec<String>,
}

pub async fn targets(ctx: &ClientContext, token: &str, feed: &str, args: TargetArgs) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    let response = feed
        .update_activity_to_targets(
            &args.foreign_id,
            &args.time,
            non_empty(args.new_targets),
            non_empty(args.added_targets),
            non_empty(args.removed_targets),
        )
        .await?;
    print_json(&response)
}

pub async fn listen(ctx: &ClientContext, token: &str, feed: &str) -> Result<()> {
    let feed = open_feed(ctx, feed, token)?;
    let handle = feed
        .subscribe(|message: RealtimeMessage| match serde_json::to_string(&message) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Could not render update: {}", e),
        })
        .await?;
    println!("Listening on {} (Ctrl-C to stop)", handle.channel());

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to wait for Ctrl-C: {}", e);
    }

    feed.unsubscribe().await;
    Ok(())
}
