//! RSS/Atom extractor, grounded on `network.rs::fetch_rss`/`parse_rss`
//! (feed-rs over raw bytes) and `parser.py::parse_rss_feed`'s
//! keyword-gated entry filter.

use super::{keyword_gate, ExtractOutcome, RawRecord, SourceExtractor};
use crate::context::Context;
use crate::fetcher;

const DEFAULT_RSS_URL: &str = "https://72.rospotrebnadzor.ru/rss/";

pub struct RssExtractor {
    tag: String,
}

impl RssExtractor {
    pub fn new() -> Self {
        Self {
            tag: "rospotrebnadzor-rss".to_string(),
        }
    }
}

impl Default for RssExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceExtractor for RssExtractor {
    fn source_tag(&self) -> &str {
        &self.tag
    }

    fn config_key(&self) -> &str {
        "rss"
    }

    async fn fetch_list(&self, ctx: &Context) -> ExtractOutcome {
        let cfg = ctx.source_config(self.config_key());
        let rss_url = cfg.rss_url.clone().unwrap_or_else(|| DEFAULT_RSS_URL.to_string());

        let bytes = match fetcher::fetch_bytes(&ctx.http, &rss_url, &ctx.config.parsing).await {
            Ok(b) => b,
            Err(e) => return ExtractOutcome::failed(e),
        };

        let feed = match feed_rs::parser::parse(bytes.as_slice()) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("rss {rss_url}: parse failure: {e}");
                return ExtractOutcome::ok(Vec::new());
            }
        };

        let mut raw_records = Vec::new();
        for entry in feed.entries.into_iter().take(cfg.max_items) {
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let description = entry.summary.map(|s| s.content).unwrap_or_default();
            let combined = format!("{title} {description}");

            if !keyword_gate(&combined) {
                continue;
            }

            let date_text = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let url = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();

            raw_records.push(RawRecord {
                raw_text: crate::textutil::clean_text(&combined),
                candidate_date_text: date_text,
                url,
                title_guess: crate::textutil::clean_text(&title),
                source_tag: self.tag.clone(),
            });
        }

        ExtractOutcome::ok(raw_records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_gate_filters_unrelated_entries() {
        assert!(!keyword_gate("обычная новость о погоде"));
        assert!(keyword_gate("зафиксированы укусы клещей"));
    }
}
