//! VK public-wall extractor, grounded on `vk_parser.py::parse_vk_group`:
//! VK's markup isn't stable, so the original matches post containers by a
//! regex over the `class` attribute rather than a fixed selector. `scraper`
//! selectors can't express that directly, so this scans every `div` and
//! filters by a compiled regex against its class list, same as the source.

use super::{keyword_gate, ExtractOutcome, RawRecord, SourceExtractor};
use crate::context::Context;
use crate::fetcher;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static DIV_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static POST_CLASS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)post|wall_item|post_content").unwrap());
static TEXT_CLASS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)text|post_text|wall_post_text").unwrap());
static POST_LINK_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wall-|post_id").unwrap());

pub struct VkExtractor {
    tag: String,
}

impl VkExtractor {
    pub fn new() -> Self {
        Self {
            tag: "vk-public-wall".to_string(),
        }
    }
}

impl Default for VkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn has_class_matching(element: &scraper::ElementRef, pattern: &Regex) -> bool {
    element
        .value()
        .attr("class")
        .map(|classes| pattern.is_match(classes))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl SourceExtractor for VkExtractor {
    fn source_tag(&self) -> &str {
        &self.tag
    }

    fn config_key(&self) -> &str {
        "vk"
    }

    async fn fetch_list(&self, ctx: &Context) -> ExtractOutcome {
        let cfg = ctx.source_config(self.config_key());
        let Some(group_url) = cfg.url.clone() else {
            return ExtractOutcome::ok(Vec::new());
        };

        let html = match fetcher::fetch_text(&ctx.http, &group_url, &ctx.config.parsing).await {
            Ok(h) => h,
            Err(e) => return ExtractOutcome::failed(e),
        };

        let document = Html::parse_document(&html);
        let posts: Vec<_> = document
            .select(&DIV_SELECTOR)
            .filter(|el| has_class_matching(el, &POST_CLASS_PATTERN))
            .take(cfg.max_items)
            .collect();

        let mut raw_records = Vec::new();
        for post in posts {
            let text = post
                .select(&DIV_SELECTOR)
                .find(|el| has_class_matching(el, &TEXT_CLASS_PATTERN))
                .map(|el| crate::textutil::clean_text(&el.text().collect::<String>()))
                .unwrap_or_default();

            if text.is_empty() || !keyword_gate(&text) {
                continue;
            }

            // Per-post permalink when the markup exposes one; otherwise
            // leave it empty so dedup falls through to the fuzzy
            // (source, title, date) key instead of colliding on the
            // shared group URL.
            let post_url = post
                .select(&ANCHOR_SELECTOR)
                .find(|a| a.value().attr("href").map(|h| POST_LINK_PATTERN.is_match(h)).unwrap_or(false))
                .and_then(|a| a.value().attr("href"))
                .map(|href| {
                    if href.starts_with("http") {
                        href.to_string()
                    } else {
                        format!("https://vk.com{href}")
                    }
                })
                .unwrap_or_default();

            raw_records.push(RawRecord {
                raw_text: text.clone(),
                candidate_date_text: String::new(),
                url: post_url,
                title_guess: text,
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
    fn class_regex_matches_varied_markup() {
        let html = Html::parse_document(
            r#"<html><body><div class="wall_item"><div class="wall_post_text">укусы клещей в Тюмени</div></div></body></html>"#,
        );
        let posts: Vec<_> = html
            .select(&DIV_SELECTOR)
            .filter(|el| has_class_matching(el, &POST_CLASS_PATTERN))
            .collect();
        assert_eq!(posts.len(), 1);
    }

    #[test]
    fn post_permalink_is_preferred_over_group_url() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="wall_item">
                    <a href="/wall-12345_678">ссылка</a>
                    <div class="wall_post_text">укусы клещей в Тюмени</div>
                </div>
            </body></html>"#,
        );
        let post = html.select(&DIV_SELECTOR).find(|el| has_class_matching(el, &POST_CLASS_PATTERN)).unwrap();
        let href = post
            .select(&ANCHOR_SELECTOR)
            .find(|a| a.value().attr("href").map(|h| POST_LINK_PATTERN.is_match(h)).unwrap_or(false))
            .and_then(|a| a.value().attr("href"))
            .unwrap();
        assert_eq!(href, "/wall-12345_678");
    }

    #[test]
    fn missing_permalink_yields_no_href_match() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="wall_item">
                    <div class="wall_post_text">укусы клещей без ссылки</div>
                </div>
            </body></html>"#,
        );
        let post = html.select(&DIV_SELECTOR).find(|el| has_class_matching(el, &POST_CLASS_PATTERN)).unwrap();
        let found = post
            .select(&ANCHOR_SELECTOR)
            .find(|a| a.value().attr("href").map(|h| POST_LINK_PATTERN.is_match(h)).unwrap_or(false));
        assert!(found.is_none());
    }
}
