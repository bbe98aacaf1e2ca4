use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::app::{FeedError, Result};

/// An activity to be written to a feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewActivity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub verb: String,
    pub object: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_id: Option<String>,
    /// Custom fields, sent as top-level keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewActivity {
    pub fn new(actor: impl Into<String>, verb: impl Into<String>, object: impl Into<Value>) -> Self {
        Self {
            actor: Some(actor.into()),
            verb: verb.into(),
            object: object.into(),
            ..Default::default()
        }
    }

    pub fn with_foreign_id(mut self, foreign_id: impl Into<String>, time: impl Into<String>) -> Self {
        self.foreign_id = Some(foreign_id.into());
        self.time = Some(time.into());
        self
    }

    pub fn with_to(mut self, to: Vec<String>) -> Self {
        self.to = to;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// An activity as stored by the service.
///
/// Enriched reads may replace `actor` and `object` with full objects, so both
/// stay untyped JSON. Everything the service adds beyond the core fields
/// (reaction counts, scores, aggregation data) lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub actor: Value,
    pub verb: String,
    pub object: Value,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to an activity for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityRef {
    ById(String),
    ByForeignId(String),
}

impl ActivityRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self::ById(id.into())
    }

    pub fn foreign_id(foreign_id: impl Into<String>) -> Self {
        Self::ByForeignId(foreign_id.into())
    }

    /// Path segment identifying the activity.
    pub fn path_fragment(&self) -> &str {
        match self {
            Self::ById(id) | Self::ByForeignId(id) => id,
        }
    }

    /// The fragment percent-encoded as a single path segment.
    ///
    /// Dot segments can't be expressed at all: URL resolution collapses them
    /// even when escaped.
    pub fn path_segment(&self) -> Result<String> {
        let raw = self.path_fragment();
        if raw.is_empty() || raw == "." || raw == ".." {
            return Err(FeedError::validation(format!(
                "Invalid activity reference {:?}",
                raw
            )));
        }
        let encoded: String = form_urlencoded::byte_serialize(raw.as_bytes()).collect();
        // byte_serialize writes spaces as '+'; a literal '+' comes out as %2B.
        Ok(encoded.replace('+', "%20"))
    }

    /// Whether the service must resolve the fragment as a foreign id.
    pub fn is_foreign(&self) -> bool {
        matches!(self, Self::ByForeignId(_))
    }
}

/// Page of activities returned by a feed read.
///
/// `results` holds flat, aggregated or notification groups depending on the
/// feed type; `unread`/`unseen` are only present on notification feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unseen: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddActivitiesResponse {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveActivityResponse {
    pub removed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of a target update: the (possibly updated) activity plus what changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetUpdateResponse {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(flatten)]
    pub activity: Map<String, Value>,
}

/// Bare acknowledgement returned by follow/unfollow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
