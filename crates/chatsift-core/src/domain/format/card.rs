//! Search response rendering

use chrono_tz::Tz;
use serde::Serialize;

use super::link::LinkCodec;
use super::text::{
    expandable_quote, truncate_graphemes, via_line, BODY_CLUSTERS, TITLE_CLUSTERS,
};
use crate::config::Config;
use crate::domain::message::{row_id, MessageHit};
use crate::domain::search::{ResultPage, SearchOutcome};
use crate::error::{Error, Result};

/// Id of the header / info card
pub const INFO_CARD_ID: &str = "info";
/// Timestamp layout used in hit descriptions
pub const DESCRIPTION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const NO_RESULTS_TITLE: &str = "No results found";
pub const NO_RESULTS_DESCRIPTION: &str = "Please refine your search query and try again";

/// One entry of a search response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Card {
    /// Header or notice; not meant to be sent
    Info {
        id: String,
        title: String,
        description: Option<String>,
    },
    /// A single hit; `body` is MarkdownV2
    Hit {
        id: String,
        title: String,
        description: String,
        body: String,
    },
    Sticker {
        id: String,
        file_id: String,
    },
}

impl Card {
    pub fn id(&self) -> &str {
        match self {
            Self::Info { id, .. } | Self::Hit { id, .. } | Self::Sticker { id, .. } => id,
        }
    }
}

/// Rendered answer to a search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResponse {
    pub cards: Vec<Card>,
    /// Seconds the client may cache this answer
    pub cache_time: u32,
    pub is_personal: bool,
}

/// Turns search outcomes into cards
#[derive(Debug, Clone)]
pub struct ResultFormatter {
    tz: Tz,
    links: LinkCodec,
    sticker_file_id: String,
    result_cache_secs: u32,
    sentinel_cache_secs: u32,
}

impl ResultFormatter {
    pub fn new(tz: Tz, links: LinkCodec, sticker_file_id: impl Into<String>) -> Self {
        Self {
            tz,
            links,
            sticker_file_id: sticker_file_id.into(),
            result_cache_secs: 15,
            sentinel_cache_secs: 300,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let tz = config
            .format
            .tz()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        let links = LinkCodec::new(&config.format.link_base)?;
        Ok(Self::new(tz, links, config.format.unauthorized_sticker.clone())
            .with_cache_times(config.cache.result_secs, config.cache.sentinel_secs))
    }

    pub fn with_cache_times(mut self, result_secs: u32, sentinel_secs: u32) -> Self {
        self.result_cache_secs = result_secs;
        self.sentinel_cache_secs = sentinel_secs;
        self
    }

    pub fn links(&self) -> &LinkCodec {
        &self.links
    }

    pub fn render(&self, outcome: &SearchOutcome) -> SearchResponse {
        match outcome {
            SearchOutcome::NoMembership => self.unauthorized(),
            SearchOutcome::Page(page) if page.hits.is_empty() => self.no_results(),
            SearchOutcome::Page(page) => self.page(page),
        }
    }

    /// Sticker sentinel for requesters without any membership
    pub fn unauthorized(&self) -> SearchResponse {
        SearchResponse {
            cards: vec![Card::Sticker {
                id: INFO_CARD_ID.to_string(),
                file_id: self.sticker_file_id.clone(),
            }],
            cache_time: self.sentinel_cache_secs,
            is_personal: true,
        }
    }

    pub fn no_results(&self) -> SearchResponse {
        SearchResponse {
            cards: vec![Card::Info {
                id: INFO_CARD_ID.to_string(),
                title: NO_RESULTS_TITLE.to_string(),
                description: Some(NO_RESULTS_DESCRIPTION.to_string()),
            }],
            cache_time: self.sentinel_cache_secs,
            is_personal: true,
        }
    }

    fn page(&self, page: &ResultPage) -> SearchResponse {
        let mut cards = Vec::with_capacity(page.hits.len() + 1);
        cards.push(Card::Info {
            id: INFO_CARD_ID.to_string(),
            title: format!(
                "Total {}, Page {} / {}",
                page.total,
                page.page,
                page.total_pages()
            ),
            description: None,
        });
        cards.extend(page.hits.iter().map(|hit| self.hit(hit)));

        SearchResponse {
            cards,
            cache_time: self.result_cache_secs,
            is_personal: true,
        }
    }

    /// Render one hit as a card
    pub fn hit(&self, hit: &MessageHit) -> Card {
        let local = hit.sent_at().with_timezone(&self.tz);
        let quote = expandable_quote(&truncate_graphemes(&hit.text, BODY_CLUSTERS));
        let link = self.links.build(hit.chat_id, hit.msg_id);

        Card::Hit {
            id: row_id(hit.chat_id, hit.msg_id),
            title: truncate_graphemes(&hit.text, TITLE_CLUSTERS),
            description: format!(
                "{} {}@{}",
                local.format(DESCRIPTION_TIME_FORMAT),
                hit.full_name,
                hit.chat_title
            ),
            body: via_line(&quote, &hit.full_name, &link),
        }
    }
}
