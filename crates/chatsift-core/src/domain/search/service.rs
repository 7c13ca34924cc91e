//! Scoped search orchestration
//!
//! Resolves the requester's visible chats, compiles the parsed query into a
//! predicate and runs it against the message store.

use serde::Serialize;
use tracing::debug;

use super::normalizer::ScriptNormalizer;
use super::query::ParsedQuery;
use crate::config::MAX_PAGE_SIZE;
use crate::domain::membership::MembershipRegistry;
use crate::domain::message::{MessageHit, MessageStore, SearchPredicate};
use crate::error::Result;

/// A page of hits for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultPage {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub hits: Vec<MessageHit>,
}

impl ResultPage {
    /// Number of pages needed for `total` hits
    pub fn total_pages(&self) -> i64 {
        let size = i64::from(self.page_size.max(1));
        (self.total + size - 1) / size
    }
}

/// Result of a search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// The requester is not a member of any enabled chat
    NoMembership,
    Page(ResultPage),
}

/// Search service over the membership registry and message store
#[derive(Debug, Clone)]
pub struct SearchService {
    registry: MembershipRegistry,
    store: MessageStore,
    normalizer: ScriptNormalizer,
    page_size: u32,
}

impl SearchService {
    pub fn new(registry: MembershipRegistry, store: MessageStore) -> Self {
        Self {
            registry,
            store,
            normalizer: ScriptNormalizer::default(),
            page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_normalizer(mut self, normalizer: ScriptNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Page size, clamped to `1..=MAX_PAGE_SIZE`
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Build the store predicate for a parsed query over the given scope
    pub fn compile(&self, query: &ParsedQuery, scope: Vec<i64>) -> SearchPredicate {
        SearchPredicate {
            chat_ids: scope,
            username: query.username().map(str::to_string),
            from_id: query.peer_id(),
            token_variants: query
                .tokens
                .iter()
                .map(|token| self.normalizer.variants(token))
                .collect(),
        }
    }

    /// Answer a raw query line on behalf of `requester`
    pub async fn search(&self, requester: i64, line: &str) -> Result<SearchOutcome> {
        let scope = self.registry.search_scope(requester).await?;
        if scope.is_empty() {
            debug!(requester, "Search from peer without memberships");
            return Ok(SearchOutcome::NoMembership);
        }

        let query = ParsedQuery::parse(line);
        let predicate = self.compile(&query, scope);
        let page = self
            .store
            .search(
                &predicate,
                query.offset(self.page_size),
                i64::from(self.page_size),
            )
            .await?;

        debug!(
            requester,
            chats = predicate.chat_ids.len(),
            tokens = query.tokens.len(),
            page = query.page,
            total = page.total,
            "Search executed"
        );

        Ok(SearchOutcome::Page(ResultPage {
            page: query.page,
            page_size: self.page_size,
            total: page.total,
            hits: page.hits,
        }))
    }
}
