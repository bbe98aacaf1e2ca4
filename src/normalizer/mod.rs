//! Read-option normalization.
//!
//! Turns typed [`ReadOptions`] into the ordered [`Query`] the transport sends
//! and picks the read endpoint. Normalization never fails.

pub mod enrich;
pub mod query;

pub use enrich::EnrichmentOptions;
pub use query::{Query, QueryValue};

/// Id-based cursor. Any combination of bounds is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    pub id_lt: Option<String>,
    pub id_lte: Option<String>,
    pub id_gt: Option<String>,
    pub id_gte: Option<String>,
    pub limit: Option<u32>,
}

/// Options for ranked feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ranking {
    pub offset: Option<u32>,
    pub ranking: Option<String>,
    pub session: Option<String>,
}

/// `mark_read` / `mark_seen` value on notification feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationMarking {
    All(bool),
    Current,
    Ids(Vec<String>),
}

impl NotificationMarking {
    fn to_query_value(&self) -> QueryValue {
        match self {
            Self::All(flag) => QueryValue::Bool(*flag),
            Self::Current => QueryValue::Str("current".to_string()),
            Self::Ids(ids) => QueryValue::Str(ids.join(",")),
        }
    }
}

impl From<bool> for NotificationMarking {
    fn from(flag: bool) -> Self {
        Self::All(flag)
    }
}

impl From<Vec<String>> for NotificationMarking {
    fn from(ids: Vec<String>) -> Self {
        Self::Ids(ids)
    }
}

impl From<Vec<&str>> for NotificationMarking {
    fn from(ids: Vec<&str>) -> Self {
        Self::Ids(ids.into_iter().map(String::from).collect())
    }
}

/// Everything a feed read accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub pagination: Pagination,
    pub ranking: Ranking,
    pub enrichment: EnrichmentOptions,
    pub mark_read: Option<NotificationMarking>,
    pub mark_seen: Option<NotificationMarking>,
    /// Keys this crate does not know about, sent as-is.
    pub extra: Vec<(String, QueryValue)>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.pagination.limit = Some(limit);
        self
    }

    pub fn id_lt(mut self, id: impl Into<String>) -> Self {
        self.pagination.id_lt = Some(id.into());
        self
    }

    pub fn id_lte(mut self, id: impl Into<String>) -> Self {
        self.pagination.id_lte = Some(id.into());
        self
    }

    pub fn id_gt(mut self, id: impl Into<String>) -> Self {
        self.pagination.id_gt = Some(id.into());
        self
    }

    pub fn id_gte(mut self, id: impl Into<String>) -> Self {
        self.pagination.id_gte = Some(id.into());
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.ranking.offset = Some(offset);
        self
    }

    pub fn ranking(mut self, ranking: impl Into<String>) -> Self {
        self.ranking.ranking = Some(ranking.into());
        self
    }

    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.ranking.session = Some(session.into());
        self
    }

    pub fn enrichment(mut self, enrichment: EnrichmentOptions) -> Self {
        self.enrichment = enrichment;
        self
    }

    pub fn mark_read(mut self, marking: impl Into<NotificationMarking>) -> Self {
        self.mark_read = Some(marking.into());
        self
    }

    pub fn mark_seen(mut self, marking: impl Into<NotificationMarking>) -> Self {
        self.mark_seen = Some(marking.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEndpoint {
    Plain,
    Enriched,
}

impl ReadEndpoint {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Plain => "feed/",
            Self::Enriched => "enrich/feed/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRead {
    pub endpoint: ReadEndpoint,
    pub query: Query,
}

pub fn normalize(options: &ReadOptions, enrich_by_default: bool) -> NormalizedRead {
    let mut query = Query::new();

    let page = &options.pagination;
    query.set_opt("id_lt", page.id_lt.clone());
    query.set_opt("id_lte", page.id_lte.clone());
    query.set_opt("id_gt", page.id_gt.clone());
    query.set_opt("id_gte", page.id_gte.clone());
    query.set_opt("limit", page.limit);

    let ranking = &options.ranking;
    query.set_opt("offset", ranking.offset);
    query.set_opt("ranking", ranking.ranking.clone());
    query.set_opt("session", ranking.session.clone());

    query.set_opt("mark_read", options.mark_read.as_ref().map(|m| m.to_query_value()));
    query.set_opt("mark_seen", options.mark_seen.as_ref().map(|m| m.to_query_value()));

    options.enrichment.rewrite(&mut query);

    for (key, value) in &options.extra {
        if !query.contains(key) {
            query.set(key.clone(), value.clone());
        }
    }

    let endpoint = if options.enrichment.use_enriched_endpoint(enrich_by_default) {
        ReadEndpoint::Enriched
    } else {
        ReadEndpoint::Plain
    };

    NormalizedRead { endpoint, query }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_read_list_is_joined() {
        let read = normalize(&ReadOptions::new().mark_read(vec!["id1", "id2"]), false);
        assert_eq!(
            read.query.get("mark_read"),
            Some(&QueryValue::Str("id1,id2".into()))
        );
    }

    #[test]
    fn test_mark_read_bool_stays_bool() {
        let read = normalize(&ReadOptions::new().mark_read(true), false);
        assert_eq!(read.query.get("mark_read"), Some(&QueryValue::Bool(true)));
    }

    #[test]
    fn test_mark_seen_current_passes_through() {
        let options = ReadOptions::new().mark_seen(NotificationMarking::Current);
        let read = normalize(&options, false);
        assert_eq!(
            read.query.get("mark_seen"),
            Some(&QueryValue::Str("current".into()))
        );
    }

    #[test]
    fn test_endpoint_selection() {
        let plain = normalize(&ReadOptions::new(), false);
        assert_eq!(plain.endpoint, ReadEndpoint::Plain);
        assert!(plain.query.is_empty());

        let enriched = normalize(
            &ReadOptions::new().enrichment(EnrichmentOptions::new().with_recent_reactions(true)),
            false,
        );
        assert_eq!(enriched.endpoint, ReadEndpoint::Enriched);
        assert_eq!(enriched.endpoint.prefix(), "enrich/feed/");
        assert_eq!(
            enriched.query.get("withRecentReactions"),
            Some(&QueryValue::Bool(true))
        );
    }

    #[test]
    fn test_enrich_by_default() {
        let read = normalize(&ReadOptions::new(), true);
        assert_eq!(read.endpoint, ReadEndpoint::Enriched);
    }

    #[test]
    fn test_pagination_passes_through_combined() {
        let options = ReadOptions::new().id_lte("b").id_gte("a").limit(25).offset(5);
        let read = normalize(&options, false);
        assert_eq!(
            read.query.to_pairs(),
            vec![
                ("id_lte".to_string(), "b".to_string()),
                ("id_gte".to_string(), "a".to_string()),
                ("limit".to_string(), "25".to_string()),
                ("offset".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let options = ReadOptions::new()
            .ranking("popular")
            .param("external_ranking_vars", "{\"boost\":2}")
            .param("ranking", "ignored");
        let read = normalize(&options, false);
        assert_eq!(
            read.query.get("external_ranking_vars"),
            Some(&QueryValue::Str("{\"boost\":2}".into()))
        );
        assert_eq!(read.query.get("ranking"), Some(&QueryValue::Str("popular".into())));
    }
}
