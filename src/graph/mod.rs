//! Follow-graph request construction.

use serde::Serialize;

use crate::app::Result;
use crate::domain::{feed_id, validate_feed_slug, validate_user_id, FeedIdentity};
use crate::normalizer::Query;
use crate::transport::{ApiRequest, Method};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowOptions {
    /// How many existing activities to copy into the follower feed.
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnfollowOptions {
    /// Keep the activities already copied from the target.
    pub keep_history: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowListOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Restrict results to these feed ids.
    pub filter: Option<Vec<String>>,
}

impl FollowListOptions {
    fn to_query(&self) -> Query {
        let mut query = Query::new();
        query.set_opt("limit", self.limit);
        query.set_opt("offset", self.offset);
        query.set_opt("filter", self.filter.as_ref().map(|ids| ids.join(",")));
        query
    }
}

/// Body of a follow request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowRelation {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_copy_limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Following,
    Followers,
}

impl Direction {
    fn segment(self) -> &'static str {
        match self {
            Self::Following => "following",
            Self::Followers => "followers",
        }
    }
}

/// Builds follow-graph requests with `source` as the subject feed.
pub struct FollowGraph<'a> {
    source: &'a FeedIdentity,
}

impl<'a> FollowGraph<'a> {
    pub fn new(source: &'a FeedIdentity) -> Self {
        Self { source }
    }

    fn target_id(target_slug: &str, target_user_id: &str) -> Result<String> {
        validate_feed_slug(target_slug)?;
        validate_user_id(target_user_id)?;
        Ok(feed_id(target_slug, target_user_id))
    }

    pub fn follow(
        &self,
        target_slug: &str,
        target_user_id: &str,
        options: &FollowOptions,
    ) -> Result<ApiRequest> {
        let relation = FollowRelation {
            target: Self::target_id(target_slug, target_user_id)?,
            activity_copy_limit: options.limit,
        };
        let path = format!("feed/{}/following/", self.source.url_path());
        Ok(ApiRequest::new(Method::Post, path, self.source.signature())
            .with_body(serde_json::json!(relation)))
    }

    pub fn unfollow(
        &self,
        target_slug: &str,
        target_user_id: &str,
        options: &UnfollowOptions,
    ) -> Result<ApiRequest> {
        let target = Self::target_id(target_slug, target_user_id)?;
        let mut query = Query::new();
        if options.keep_history {
            query.set("keep_history", "1");
        }
        let path = format!("feed/{}/following/{}/", self.source.url_path(), target);
        Ok(ApiRequest::new(Method::Delete, path, self.source.signature()).with_query(query))
    }

    pub fn list(&self, direction: Direction, options: &FollowListOptions) -> ApiRequest {
        let path = format!("feed/{}/{}/", self.source.url_path(), direction.segment());
        ApiRequest::new(Method::Get, path, self.source.signature()).with_query(options.to_query())
    }
}
