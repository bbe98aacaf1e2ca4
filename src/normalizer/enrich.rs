use crate::normalizer::query::Query;

/// Reaction enrichment flags for reads.
///
/// The service expects the camel-cased parameter names; [`rewrite`](Self::rewrite)
/// produces them, folding the legacy `ownReactions` alias into `withOwnReactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentOptions {
    /// Forces the endpoint choice. Never sent on the wire.
    pub enrich: Option<bool>,
    pub with_own_reactions: Option<bool>,
    /// Deprecated spelling of `with_own_reactions`.
    pub own_reactions: Option<bool>,
    pub with_own_children: Option<bool>,
    pub with_reaction_counts: Option<bool>,
    pub with_recent_reactions: Option<bool>,
    pub recent_reactions_limit: Option<u32>,
    pub reaction_kinds_filter: Option<String>,
}

impl EnrichmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enrich(mut self, enrich: bool) -> Self {
        self.enrich = Some(enrich);
        self
    }

    pub fn with_own_reactions(mut self, value: bool) -> Self {
        self.with_own_reactions = Some(value);
        self
    }

    pub fn with_own_children(mut self, value: bool) -> Self {
        self.with_own_children = Some(value);
        self
    }

    pub fn with_reaction_counts(mut self, value: bool) -> Self {
        self.with_reaction_counts = Some(value);
        self
    }

    pub fn with_recent_reactions(mut self, value: bool) -> Self {
        self.with_recent_reactions = Some(value);
        self
    }

    pub fn recent_reactions_limit(mut self, limit: u32) -> Self {
        self.recent_reactions_limit = Some(limit);
        self
    }

    pub fn reaction_kinds_filter(mut self, kinds: impl Into<String>) -> Self {
        self.reaction_kinds_filter = Some(kinds.into());
        self
    }

    fn own_reactions_flag(&self) -> Option<bool> {
        self.with_own_reactions.or(self.own_reactions)
    }

    /// Whether any reaction flag asks for an enriched read. Presence counts,
    /// not value: `with_reaction_counts(false)` still triggers.
    pub fn triggers_enrichment(&self) -> bool {
        self.own_reactions_flag().is_some()
            || self.with_own_children.is_some()
            || self.with_reaction_counts.is_some()
            || self.with_recent_reactions.is_some()
    }

    /// Endpoint decision: an explicit `enrich` wins, then the flags, then the default.
    pub fn use_enriched_endpoint(&self, enrich_by_default: bool) -> bool {
        match self.enrich {
            Some(explicit) => explicit,
            None => enrich_by_default || self.triggers_enrichment(),
        }
    }

    /// Write the wire parameters for these flags into `query`.
    pub fn rewrite(&self, query: &mut Query) {
        query.set_opt("withOwnReactions", self.own_reactions_flag());
        query.set_opt("withOwnChildren", self.with_own_children);
        query.set_opt("withReactionCounts", self.with_reaction_counts);
        query.set_opt("withRecentReactions", self.with_recent_reactions);
        query.set_opt("recentReactionsLimit", self.recent_reactions_limit);
        query.set_opt("reactionKindsFilter", self.reaction_kinds_filter.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::query::QueryValue;

    #[test]
    fn test_no_flags_is_plain() {
        let options = EnrichmentOptions::new();
        assert!(!options.triggers_enrichment());
        assert!(!options.use_enriched_endpoint(false));
        assert!(options.use_enriched_endpoint(true));
    }

    #[test]
    fn test_presence_triggers() {
        assert!(EnrichmentOptions::new()
            .with_reaction_counts(false)
            .use_enriched_endpoint(false));
        assert!(EnrichmentOptions::new()
            .with_own_children(true)
            .use_enriched_endpoint(false));
    }

    #[test]
    fn test_limit_and_filter_alone_do_not_trigger() {
        let options = EnrichmentOptions::new()
            .recent_reactions_limit(5)
            .reaction_kinds_filter("like,comment");
        assert!(!options.triggers_enrichment());
    }

    #[test]
    fn test_explicit_enrich_wins() {
        let options = EnrichmentOptions::new().enrich(false).with_recent_reactions(true);
        assert!(!options.use_enriched_endpoint(true));
        assert!(EnrichmentOptions::new().enrich(true).use_enriched_endpoint(false));
    }

    #[test]
    fn test_rewrite_folds_legacy_alias() {
        let options = EnrichmentOptions {
            own_reactions: Some(true),
            enrich: Some(true),
            ..Default::default()
        };
        let mut query = Query::new();
        options.rewrite(&mut query);

        assert_eq!(query.get("withOwnReactions"), Some(&QueryValue::Bool(true)));
        assert!(!query.contains("ownReactions"));
        assert!(!query.contains("enrich"));
        assert_eq!(query.len(), 1);
    }

    #[test]
    fn test_rewrite_prefers_new_spelling() {
        let options = EnrichmentOptions {
            own_reactions: Some(true),
            with_own_reactions: Some(false),
            ..Default::default()
        };
        let mut query = Query::new();
        options.rewrite(&mut query);
        assert_eq!(query.get("withOwnReactions"), Some(&QueryValue::Bool(false)));
    }
}
