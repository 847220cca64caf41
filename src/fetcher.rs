//! C1: HTTP fetcher with retry/backoff.
//!
//! Grounded on `network.rs::fetch_with_retry`/`check_status`, generalized
//! from a single hard-coded `Client` into a shared, injectable one, and
//! from Fibonacci "stealth" delays into the plain linear backoff spec.md
//! §4.1 mandates. The rotating user-agent pool mirrors `parser.py`'s
//! `fake_useragent.UserAgent().random` on every attempt.

use crate::config::ParsingConfig;
use crate::error::HttpError;
use crate::textutil::linear_backoff_delay;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Rotated per attempt; static to avoid rebuilding the pool on every call.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

pub fn build_client() -> Client {
    Client::builder()
        .gzip(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(3))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(5)
        .build()
        .expect("static client configuration is always valid")
}

fn user_agent_for_attempt(attempt: u32) -> &'static str {
    USER_AGENTS[attempt as usize % USER_AGENTS.len()]
}

fn classify_status(status: StatusCode) -> Result<(), HttpError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(HttpError::HttpStatus(status.as_u16()))
    }
}

/// GET `url` as text, retrying on network errors and 5xx/429 up to
/// `cfg.retry_count` times with linear backoff; a definitive 4xx aborts
/// immediately (spec.md §4.1 "retry policy").
pub async fn fetch_text(client: &Client, url: &str, cfg: &ParsingConfig) -> Result<String, HttpError> {
    fetch_with(client, url, cfg, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8").await
}

/// GET `url` as text with an RSS-flavored `Accept` header.
pub async fn fetch_feed_text(client: &Client, url: &str, cfg: &ParsingConfig) -> Result<String, HttpError> {
    fetch_with(client, url, cfg, "application/rss+xml,application/xml,text/xml;q=0.9,*/*;q=0.8").await
}

async fn fetch_with(
    client: &Client,
    url: &str,
    cfg: &ParsingConfig,
    accept: &str,
) -> Result<String, HttpError> {
    let mut last_err = HttpError::TooManyRetries;

    for attempt in 0..cfg.retry_count {
        if attempt > 0 {
            linear_backoff_delay(cfg.retry_delay.saturating_mul(1000), attempt - 1).await;
        }

        let result = client
            .get(url)
            .header("User-Agent", user_agent_for_attempt(attempt))
            .header("Accept", accept)
            .header("Accept-Language", "ru-RU,ru;q=0.8,en-US;q=0.5,en;q=0.3")
            .timeout(Duration::from_secs(cfg.timeout))
            .send()
            .await;

        match result {
            Ok(response) => match classify_status(response.status()) {
                Ok(()) => match response.text().await {
                    Ok(body) => return Ok(body),
                    Err(e) => {
                        last_err = HttpError::Transport(e);
                        continue;
                    }
                },
                Err(e) if e.is_terminal() => {
                    log::warn!("fetch {url}: terminal status, not retrying: {e}");
                    return Err(e);
                }
                Err(e) => {
                    log::debug!("fetch {url}: attempt {attempt} failed: {e}");
                    last_err = e;
                }
            },
            Err(e) if e.is_timeout() => {
                last_err = HttpError::Timeout;
            }
            Err(e) if e.is_connect() => {
                last_err = HttpError::ConnectionReset;
            }
            Err(e) => {
                last_err = HttpError::Transport(e);
            }
        }
    }

    log::warn!("fetch {url}: exhausted {} retries: {last_err}", cfg.retry_count);
    Err(last_err)
}

/// GET `url` as raw bytes (feed parsers want bytes, not `String`, since
/// `feed-rs` handles encoding detection itself).
pub async fn fetch_bytes(client: &Client, url: &str, cfg: &ParsingConfig) -> Result<Vec<u8>, HttpError> {
    let mut last_err = HttpError::TooManyRetries;

    for attempt in 0..cfg.retry_count {
        if attempt > 0 {
            linear_backoff_delay(cfg.retry_delay.saturating_mul(1000), attempt - 1).await;
        }

        let result = client
            .get(url)
            .header("User-Agent", user_agent_for_attempt(attempt))
            .header("Accept", "application/rss+xml,application/xml,text/xml;q=0.9,*/*;q=0.8")
            .timeout(Duration::from_secs(cfg.timeout))
            .send()
            .await;

        match result {
            Ok(response) => match classify_status(response.status()) {
                Ok(()) => match response.bytes().await {
                    Ok(bytes) => return Ok(bytes.to_vec()),
                    Err(e) => {
                        last_err = HttpError::Transport(e);
                        continue;
                    }
                },
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => last_err = e,
            },
            Err(e) if e.is_timeout() => last_err = HttpError::Timeout,
            Err(e) if e.is_connect() => last_err = HttpError::ConnectionReset,
            Err(e) => last_err = HttpError::Transport(e),
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agents_rotate() {
        let a = user_agent_for_attempt(0);
        let b = user_agent_for_attempt(1);
        assert_ne!(a, b);
        assert_eq!(user_agent_for_attempt(0), user_agent_for_attempt(USER_AGENTS.len() as u32));
    }

    #[test]
    fn classify_status_accepts_2xx_only() {
        assert!(classify_status(StatusCode::OK).is_ok());
        assert!(classify_status(StatusCode::NOT_FOUND).is_err());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR).is_err());
    }

    #[test]
    fn terminal_status_short_circuits() {
        let err = HttpError::HttpStatus(404);
        assert!(err.is_terminal());
        let err = HttpError::HttpStatus(429);
        assert!(!err.is_terminal());
        let err = HttpError::HttpStatus(503);
        assert!(!err.is_terminal());
    }
}
