use std::fmt;

use crate::app::{FeedError, Result};

const SEPARATOR: char = ':';

/// Opaque request signature for a feed: `"{slug}{user_id} {token}"`.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    fn new(together: &str, token: &str) -> Self {
        Self(format!("{} {}", together, token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token half of the signature.
    pub fn token(&self) -> &str {
        self.0.split_once(' ').map(|(_, token)| token).unwrap_or_default()
    }

    /// Whether the token is a JWT (three non-empty dot-separated segments).
    pub fn is_jwt(&self) -> bool {
        let parts: Vec<&str> = self.token().split('.').collect();
        parts.len() == 3 && parts.iter().all(|p| !p.is_empty())
    }
}

// Keep tokens out of logs.
impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signature(..)")
    }
}

/// A validated `(slug, user_id)` pair addressing one feed.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedIdentity {
    slug: String,
    user_id: String,
    token: String,
    signature: Signature,
}

impl FeedIdentity {
    pub fn new(slug: &str, user_id: &str, token: &str) -> Result<Self> {
        if slug.is_empty() || user_id.is_empty() {
            return Err(FeedError::configuration(
                "Please provide a feed slug and user id, ie feed(\"user\", \"1\")",
            ));
        }

        if slug.contains(SEPARATOR) {
            return Err(FeedError::configuration(format!(
                "Please initialize the feed using feed(\"user\", \"1\") not feed(\"user:1\"), got {:?}",
                slug
            )));
        }

        validate_feed_slug(slug)?;
        validate_user_id(user_id)?;

        if token.is_empty() {
            return Err(FeedError::configuration(
                "Missing token, in client side mode please provide a feed secret",
            ));
        }

        let together = format!("{}{}", slug, user_id);
        Ok(Self {
            slug: slug.to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            signature: Signature::new(&together, token),
        })
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Composite id, `slug:user_id`.
    pub fn id(&self) -> String {
        feed_id(&self.slug, &self.user_id)
    }

    /// Path fragment, `slug/user_id`.
    pub fn url_path(&self) -> String {
        format!("{}/{}", self.slug, self.user_id)
    }

    /// Composite id with the separator stripped.
    pub fn together(&self) -> String {
        format!("{}{}", self.slug, self.user_id)
    }

    /// Real-time channel for this feed under the given application.
    pub fn channel_name(&self, app_id: &str) -> String {
        format!("site-{}-feed-{}", app_id, self.together())
    }
}

impl fmt::Debug for FeedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedIdentity")
            .field("slug", &self.slug)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for FeedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.slug, SEPARATOR, self.user_id)
    }
}

pub fn feed_id(slug: &str, user_id: &str) -> String {
    format!("{}{}{}", slug, SEPARATOR, user_id)
}

/// Slugs are restricted to letters, digits and `_`.
pub fn validate_feed_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FeedError::validation(format!(
            "Invalid feed slug, please use letters, numbers or _: {:?}",
            slug
        )));
    }
    Ok(())
}

/// User ids additionally allow `-`.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty()
        || !user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(FeedError::validation(format!(
            "Invalid user id, please use letters, numbers, - or _: {:?}",
            user_id
        )));
    }
    Ok(())
}
