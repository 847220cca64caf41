//! Telegram web-mirror extractor, grounded on `network.rs::fetch_telegram`/
//! `parse_telegram_html` (message wrap/text/date selectors) and
//! `parser.py::parse_telegram`'s keyword gate and `datetime` attribute
//! parse on the `<time>` tag.

use super::{keyword_gate, ExtractOutcome, RawRecord, SourceExtractor};
use crate::context::Context;
use crate::fetcher;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

const DEFAULT_CHANNEL_URL: &str = "https://t.me/s/tu_ymen72";

static MESSAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.tgme_widget_message").unwrap());
static TEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.tgme_widget_message_text").unwrap());
static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("time.time").unwrap());
static DATE_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(".tgme_widget_message_date").unwrap());

pub struct TelegramExtractor {
    tag: String,
}

impl TelegramExtractor {
    pub fn new() -> Self {
        Self {
            tag: "telegram-tumen72".to_string(),
        }
    }
}

impl Default for TelegramExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceExtractor for TelegramExtractor {
    fn source_tag(&self) -> &str {
        &self.tag
    }

    fn config_key(&self) -> &str {
        "telegram"
    }

    async fn fetch_list(&self, ctx: &Context) -> ExtractOutcome {
        let cfg = ctx.source_config(self.config_key());
        let url = cfg.url.clone().unwrap_or_else(|| DEFAULT_CHANNEL_URL.to_string());

        let html = match fetcher::fetch_text(&ctx.http, &url, &ctx.config.parsing).await {
            Ok(h) => h,
            Err(e) => return ExtractOutcome::failed(e),
        };

        let document = Html::parse_document(&html);
        let mut raw_records = Vec::new();

        for message in document.select(&MESSAGE_SELECTOR).take(cfg.max_items) {
            let Some(text_el) = message.select(&TEXT_SELECTOR).next() else {
                continue;
            };
            let text = crate::textutil::clean_text(&text_el.text().collect::<String>());
            if text.is_empty() || !keyword_gate(&text) {
                continue;
            }

            let date_text = message
                .select(&TIME_SELECTOR)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .unwrap_or_default()
                .to_string();

            // Per-message permalink, not the channel URL -- every message
            // on the page would otherwise collide on the same dedup key.
            let message_url = message
                .select(&DATE_LINK_SELECTOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| href.to_string())
                .unwrap_or_default();

            raw_records.push(RawRecord {
                raw_text: text.clone(),
                candidate_date_text: date_text,
                url: message_url,
                title_guess: text,
                source_tag: self.tag.clone(),
            });
        }

        ExtractOutcome::ok(raw_records)
    }
}
