//! Rospotrebnadzor search-page extractor, grounded on
//! `parser.py::parse_web_data`: try a fallback chain of search URLs
//! against the configured base, scan each hit for a news-item card using
//! a fallback chain of CSS selectors (the original's
//! `find_all('div', class_='search-item') or find_all(...) or
//! find_all('article')`), one `RawRecord` per card.

use super::{ExtractOutcome, RawRecord, SourceExtractor};
use crate::context::Context;
use crate::fetcher;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

const DEFAULT_BASE_URL: &str = "https://72.rospotrebnadzor.ru";

const SEARCH_PATHS: &[&str] = &[
    "/search/?q=%D0%BA%D0%BB%D0%B5%D1%89%D0%B8",
    "/search/?q=%D0%BA%D0%BB%D0%B5%D1%89",
    "/search/",
    "/news/",
    "/press/",
    "/",
];

static ITEM_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        Selector::parse("div.search-item").unwrap(),
        Selector::parse("div.news-item").unwrap(),
        Selector::parse("article").unwrap(),
    ]
});

static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        Selector::parse("a.search-title").unwrap(),
        Selector::parse("a.title").unwrap(),
        Selector::parse("h3").unwrap(),
        Selector::parse("h2").unwrap(),
        Selector::parse("a").unwrap(),
    ]
});

static DATE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        Selector::parse("div.search-date").unwrap(),
        Selector::parse("div.date").unwrap(),
        Selector::parse("time").unwrap(),
    ]
});

static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        Selector::parse("div.search-text").unwrap(),
        Selector::parse("div.content").unwrap(),
        Selector::parse("p").unwrap(),
    ]
});

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

pub struct WebSearchExtractor {
    tag: String,
}

impl WebSearchExtractor {
    pub fn new() -> Self {
        Self {
            tag: "rospotrebnadzor-web".to_string(),
        }
    }
}

impl Default for WebSearchExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn first_match<'a>(
    fragment: scraper::ElementRef<'a>,
    selectors: &[Selector],
) -> Option<scraper::ElementRef<'a>> {
    selectors.iter().find_map(|sel| fragment.select(sel).next())
}

#[async_trait::async_trait]
impl SourceExtractor for WebSearchExtractor {
    fn source_tag(&self) -> &str {
        &self.tag
    }

    fn config_key(&self) -> &str {
        "web"
    }

    async fn fetch_list(&self, ctx: &Context) -> ExtractOutcome {
        let cfg = ctx.source_config(self.config_key());
        let base_url = cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut body = None;
        let mut last_err = None;
        for path in SEARCH_PATHS {
            let url = format!("{base_url}{path}");
            match fetcher::fetch_text(&ctx.http, &url, &ctx.config.parsing).await {
                Ok(html) => {
                    body = Some(html);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }

        let html = match body {
            Some(h) => h,
            None => {
                return ExtractOutcome::failed(last_err.unwrap_or(crate::error::HttpError::TooManyRetries));
            }
        };

        let document = Html::parse_document(&html);
        let items = ITEM_SELECTORS
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|v| !v.is_empty())
            .unwrap_or_default();

        if items.is_empty() {
            log::debug!("web[{}]: {}", base_url, crate::error::ParseError::Empty);
        }

        let mut raw_records = Vec::new();
        for item in items.into_iter().take(cfg.max_items) {
            let title = first_match(item, &TITLE_SELECTORS)
                .map(|e| crate::textutil::clean_text(&e.text().collect::<String>()))
                .unwrap_or_default();
            let date_text = first_match(item, &DATE_SELECTORS)
                .map(|e| crate::textutil::clean_text(&e.text().collect::<String>()))
                .unwrap_or_default();
            let content = first_match(item, &CONTENT_SELECTORS)
                .map(|e| crate::textutil::clean_text(&e.text().collect::<String>()))
                .unwrap_or_default();
            let link = item
                .select(&LINK_SELECTOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| {
                    if href.starts_with("http") {
                        href.to_string()
                    } else {
                        format!("{base_url}{href}")
                    }
                })
                .unwrap_or_default();

            if title.is_empty() && content.is_empty() {
                log::debug!("web[{}]: {}", base_url, crate::error::ParseError::SelectorMiss);
                continue;
            }

            raw_records.push(RawRecord {
                raw_text: format!("{title} {content}"),
                candidate_date_text: date_text,
                url: link,
                title_guess: title,
                source_tag: self.tag.clone(),
            });
        }

        ExtractOutcome::ok(raw_records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn item_selector_fallback_prefers_search_item() {
        let html = Html::parse_document(
            r#"<html><body><div class="search-item"><a class="search-title" href="/a">Клещи в Тюмени</a><div class="search-date">15.06.2024</div></div></body></html>"#,
        );
        let items = ITEM_SELECTORS
            .iter()
            .map(|sel| html.select(sel).collect::<Vec<_>>())
            .find(|v| !v.is_empty())
            .unwrap();
        assert_eq!(items.len(), 1);
    }
}
