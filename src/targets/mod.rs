//! Validation and construction of activity "to" target updates.

use std::collections::HashSet;

use serde::Serialize;

use crate::app::{FeedError, Result};
use crate::domain::FeedIdentity;
use crate::transport::{ApiRequest, Method};

/// A validated edit of an activity's "to" list.
///
/// Either `new_targets` replaces the whole list, or `added_targets` and/or
/// `removed_targets` edit it incrementally. Added and removed never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetMutation {
    foreign_id: String,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    added_targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed_targets: Option<Vec<String>>,
}

impl TargetMutation {
    pub fn new(
        foreign_id: &str,
        time: &str,
        new_targets: Option<Vec<String>>,
        added_targets: Option<Vec<String>>,
        removed_targets: Option<Vec<String>>,
    ) -> Result<Self> {
        if foreign_id.is_empty() {
            return Err(FeedError::validation("Missing `foreign_id` parameter"));
        }
        if time.is_empty() {
            return Err(FeedError::validation("Missing `time` parameter"));
        }

        if new_targets.is_none() && added_targets.is_none() && removed_targets.is_none() {
            return Err(FeedError::validation(
                "Provide at least one of `new_targets`, `added_targets` or `removed_targets`",
            ));
        }

        if new_targets.is_some() && (added_targets.is_some() || removed_targets.is_some()) {
            return Err(FeedError::validation(
                "Can't include `added_targets` or `removed_targets` together with `new_targets`",
            ));
        }

        if let (Some(added), Some(removed)) = (&added_targets, &removed_targets) {
            let removed: HashSet<&str> = removed.iter().map(String::as_str).collect();
            if let Some(conflict) = added.iter().find(|id| removed.contains(id.as_str())) {
                return Err(FeedError::validation(format!(
                    "Can't have the same feed id in `added_targets` and `removed_targets`: {}",
                    conflict
                )));
            }
        }

        Ok(Self {
            foreign_id: foreign_id.to_string(),
            time: time.to_string(),
            new_targets,
            added_targets,
            removed_targets,
        })
    }

    /// Replace the whole target list.
    pub fn replace(foreign_id: &str, time: &str, targets: Vec<String>) -> Result<Self> {
        Self::new(foreign_id, time, Some(targets), None, None)
    }

    /// Incremental edit; empty vectors count as not supplied.
    pub fn edit(foreign_id: &str, time: &str, added: Vec<String>, removed: Vec<String>) -> Result<Self> {
        let some_if_any = |ids: Vec<String>| if ids.is_empty() { None } else { Some(ids) };
        Self::new(foreign_id, time, None, some_if_any(added), some_if_any(removed))
    }

    pub fn foreign_id(&self) -> &str {
        &self.foreign_id
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    /// Consume into the request for `feed`.
    pub fn into_request(self, feed: &FeedIdentity) -> ApiRequest {
        let path = format!("feed_targets/{}/activity_to_targets/", feed.url_path());
        ApiRequest::new(Method::Post, path, feed.signature()).with_body(serde_json::json!(self))
    }
}
