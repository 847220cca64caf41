//! Generic local news-site extractor, grounded on
//! `local_news_parser.py::parse_local_news_site`: try a handful of search
//! URL shapes against the configured base, falling back to the home page,
//! then scan for article-like containers by a regex over the `class`
//! attribute (`article|news|item|post`).

use super::{keyword_gate, ExtractOutcome, RawRecord, SourceExtractor};
use crate::context::Context;
use crate::fetcher;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

const SEARCH_QUERY: &str = "%D0%BA%D0%BB%D0%B5%D1%89";

static CONTAINER_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("article, div").unwrap());
static ARTICLE_CLASS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)article|news|item|post").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, a").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

pub struct LocalNewsExtractor {
    tag: String,
}

impl LocalNewsExtractor {
    pub fn new() -> Self {
        Self {
            tag: "local-news-site".to_string(),
        }
    }
}

impl Default for LocalNewsExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn search_candidates(base_url: &str) -> Vec<String> {
    vec![
        format!("{base_url}/search?q={SEARCH_QUERY}"),
        format!("{base_url}/search/?query={SEARCH_QUERY}"),
        format!("{base_url}/news/?search={SEARCH_QUERY}"),
        format!("{base_url}/?s={SEARCH_QUERY}"),
        base_url.to_string(),
    ]
}

#[async_trait::async_trait]
impl SourceExtractor for LocalNewsExtractor {
    fn source_tag(&self) -> &str {
        &self.tag
    }

    fn config_key(&self) -> &str {
        "local_news"
    }

    async fn fetch_list(&self, ctx: &Context) -> ExtractOutcome {
        let cfg = ctx.source_config(self.config_key());
        let Some(base_url) = cfg.base_url.clone() else {
            return ExtractOutcome::ok(Vec::new());
        };

        let mut html = None;
        let mut last_err = None;
        for url in search_candidates(&base_url) {
            match fetcher::fetch_text(&ctx.http, &url, &ctx.config.parsing).await {
                Ok(h) => {
                    html = Some(h);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }

        let html = match html {
            Some(h) => h,
            None => return ExtractOutcome::failed(last_err.unwrap_or(crate::error::HttpError::TooManyRetries)),
        };

        let document = Html::parse_document(&html);
        let articles: Vec<_> = document
            .select(&CONTAINER_SELECTOR)
            .filter(|el| {
                el.value()
                    .attr("class")
                    .map(|c| ARTICLE_CLASS_PATTERN.is_match(c))
                    .unwrap_or(false)
            })
            .take(cfg.max_items)
            .collect();

        let mut raw_records = Vec::new();
        for article in articles {
            let title = article
                .select(&TITLE_SELECTOR)
                .next()
                .map(|e| crate::textutil::clean_text(&e.text().collect::<String>()))
                .unwrap_or_default();
            let body = crate::textutil::clean_text(&article.text().collect::<String>());

            if !keyword_gate(&body) {
                continue;
            }

            let link = article
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

            raw_records.push(RawRecord {
                raw_text: body,
                candidate_date_text: String::new(),
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

    #[test]
    fn search_candidates_fall_back_to_base() {
        let urls = search_candidates("https://example-news.ru");
        assert_eq!(urls.last().unwrap(), "https://example-news.ru");
        assert_eq!(urls.len(), 5);
    }
}
