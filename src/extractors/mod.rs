//! C2: per-source extraction. Five sources, one shared shape.
//!
//! Grounded on the REDESIGN FLAGS call to replace the original's five
//! structurally-similar parser methods (`parse_web_data`, `parse_rss_feed`,
//! `parse_telegram`, `VKParser::parse_vk_group`,
//! `LocalNewsParser::parse_local_news_site`) with one capability trait
//! instead of duck-typed dict builders repeated per source.

mod local_news;
mod rss;
mod telegram;
mod vk;
mod web;

pub use local_news::LocalNewsExtractor;
pub use rss::RssExtractor;
pub use telegram::TelegramExtractor;
pub use vk::VkExtractor;
pub use web::WebSearchExtractor;

use crate::context::Context;
use crate::error::HttpError;

/// A single scraped item before date/case/location resolution (C3's
/// input). Distinct from `DraftRecord`: nothing here has been
/// interpreted yet, only located on the page.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub raw_text: String,
    pub candidate_date_text: String,
    pub url: String,
    pub title_guess: String,
    pub source_tag: String,
}

/// Outcome of one source's fetch+scrape pass, reported up to the
/// scheduler for per-source counters (spec.md §4.7).
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub raw_records: Vec<RawRecord>,
    pub fetch_error: Option<String>,
}

impl ExtractOutcome {
    fn ok(raw_records: Vec<RawRecord>) -> Self {
        Self {
            raw_records,
            fetch_error: None,
        }
    }

    fn failed(err: HttpError) -> Self {
        Self {
            raw_records: Vec::new(),
            fetch_error: Some(err.to_string()),
        }
    }
}

/// Capability shared by every ingestion source (spec.md §4.2). A source
/// fetches its raw medium (HTML search page, RSS/Atom feed, Telegram web
/// mirror, VK wall, generic local news site) and produces `RawRecord`s
/// gated by the tick-activity keyword set; it never resolves dates,
/// cases, or locations itself -- that is C3's job.
#[async_trait::async_trait]
pub trait SourceExtractor: Send + Sync {
    /// Stable tag stored on every produced record (spec.md `source` field).
    fn source_tag(&self) -> &str;

    /// Config key this extractor looks itself up under in
    /// `parsing.sources.*` (spec.md §6).
    fn config_key(&self) -> &str;

    async fn fetch_list(&self, ctx: &Context) -> ExtractOutcome;
}

fn keyword_gate(text: &str) -> bool {
    let lower = text.to_lowercase();
    crate::fact_extractor::TICK_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
