//! Text cleanup and retry-delay helpers shared by the fetcher and extractors.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Minimum delay floor (prevents zero/negative delays)
const MIN_DELAY_MS: u64 = 100;

/// Linear backoff with jitter: `attempt` is 0-based attempt number already made.
/// `delay = base_ms * (attempt + 1)`, jittered by +/-50%.
#[inline]
pub async fn linear_backoff_delay(base_ms: u64, attempt: u32) {
    let delay = jitter_ms(base_ms.saturating_mul(u64::from(attempt) + 1));
    sleep(Duration::from_millis(delay.max(MIN_DELAY_MS))).await;
}

/// Truncate text to max length with ellipsis.
/// Handles UTF-8 safely by finding char boundaries.
#[inline]
pub fn truncate_text(text: &str, max_len: usize) -> String {
    let trimmed = text.trim();

    if trimmed.len() <= max_len {
        return trimmed.to_string();
    }

    // Find safe truncation point (char boundary)
    let mut end = max_len.saturating_sub(3);
    while end > 0 && !trimmed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &trimmed[..end])
}

/// Clean and normalize text content
/// - Removes excessive whitespace
/// - Strips HTML artifacts
/// - Normalizes line breaks
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
}

/// Calculate jitter for retry backoff
#[inline]
pub fn jitter_ms(base: u64) -> u64 {
    let mut rng = rand::thread_rng();
    let jitter: f64 = rng.gen_range(0.5..1.5);
    ((base as f64) * jitter) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_handles_utf8() {
        let russian = "Привет мир это тест очень длинного текста";
        let truncated = truncate_text(russian, 20);
        assert!(truncated.len() <= 23); // 20 + "..."
        assert!(truncated.is_char_boundary(truncated.len()));
    }

    #[test]
    fn test_clean_text() {
        let dirty = "  Hello   &amp;  World  \n\n  Test  ";
        let clean = clean_text(dirty);
        assert_eq!(clean, "Hello & World Test");
    }
}