//! C3: fact extraction — date, case count, locality from free-form text.
//!
//! Grounded on `parser.py::extract_case_number`/`extract_location` and
//! the RSS/web/Telegram date-handling scattered across the original
//! parsers; the cascade below is spec.md §4.3's reconciliation of those
//! variants, implemented once instead of per-source.

use crate::extractors::RawRecord;
use crate::gazetteer;
use crate::model::DraftRecord;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered case-count regex cascade (spec.md §4.3, verbatim from the
/// canonical reconciliation — do not reorder).
static CASE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)зарегистрировано\D*(\d+)\D*обращ").unwrap(),
        Regex::new(r"(?i)выявлено\D*(\d+)\D*случа").unwrap(),
        Regex::new(r"(?i)(\d+)\D*укус").unwrap(),
        Regex::new(r"(?i)клещ\D*(\d+)").unwrap(),
        Regex::new(r"(?i)(\d+)\s*(?:случа|обращени)").unwrap(),
        Regex::new(r"(?i)(\d+)\s*(?:человек|жител)").unwrap(),
        Regex::new(r"(?i)обратилось\D*(\d+)").unwrap(),
        Regex::new(r"(?i)поступило\D*(\d+)\D*обращ").unwrap(),
        Regex::new(r"(?i)(\d+)\D*пострадал").unwrap(),
        Regex::new(r"(?i)(\d+)\D*присасыван").unwrap(),
    ]
});

/// Second-sweep keywords: find the first number in short proximity.
const PROXIMITY_KEYWORDS: &[&str] = &["клещ", "укус", "обращение", "случай", "присасывание"];

/// Keywords that gate "qualitative mention" (spec.md §4.2 keyword gate).
pub const TICK_KEYWORDS: &[&str] = &["клещ", "укус", "энцефалит", "присасыван"];

static PROXIMITY_PATTERN_CACHE: Lazy<Vec<(String, Regex)>> = Lazy::new(|| {
    PROXIMITY_KEYWORDS
        .iter()
        .map(|kw| {
            let pattern = format!(r"(?i){kw}[^\d]{{0,20}}(\d{{1,4}})");
            (kw.to_string(), Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Extract a case count from `text`, or `None` if no number was found at
/// all (caller decides whether that means "no mention" or "cases=0").
pub fn extract_case_number(text: &str) -> Option<u32> {
    let mut saw_candidate = false;
    for pattern in CASE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(num) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
                saw_candidate = true;
                if num > 0 && num <= 10_000 {
                    return Some(num);
                }
            }
        }
    }
    for (_, pattern) in PROXIMITY_PATTERN_CACHE.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(num) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
                saw_candidate = true;
                if num > 0 && num <= 10_000 {
                    return Some(num);
                }
            }
        }
    }
    if saw_candidate {
        log::debug!("fact_extractor: {}", crate::error::ParseError::AmbiguousNumber);
    }
    None
}

/// Resolve the case count for a combined title+content blob: a matched
/// number wins; absent a match but keyword-gated, the mention is
/// qualitative (`cases = 0`); absent both, `None` (no tick-related
/// content at all).
pub fn resolve_cases(text: &str) -> Option<u32> {
    if let Some(n) = extract_case_number(text) {
        return Some(n);
    }
    let lower = text.to_lowercase();
    if TICK_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Some(0)
    } else {
        None
    }
}

static DATE_DMY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").unwrap());
static DATE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());
static DATE_MARKER_WORDS: &[&str] = &["дата", "опубликовано", "от"];
static URL_DATE_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").unwrap());

const RU_MONTH_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

static RU_MONTH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s+([а-яё]+)\s+(\d{4})").unwrap()
});

/// Fuzzy parse of a candidate date string: `DD.MM.YYYY`, ISO `YYYY-MM-DD`,
/// or `D month_name YYYY` (Russian genitive month names).
pub fn fuzzy_parse_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = DATE_DMY.captures(text) {
        let d = caps[1].parse().ok()?;
        let m = caps[2].parse().ok()?;
        let y = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    if let Some(caps) = DATE_ISO.captures(text) {
        let y = caps[1].parse().ok()?;
        let m = caps[2].parse().ok()?;
        let d = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    if let Some(caps) = RU_MONTH_DATE.captures(&text.to_lowercase()) {
        let d = caps[1].parse().ok()?;
        let month_word = &caps[2];
        let y: i32 = caps[3].parse().ok()?;
        let m = RU_MONTH_GENITIVE
            .iter()
            .position(|mw| *mw == month_word)
            .map(|i| i as u32 + 1)?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    None
}

/// Regex scan of body text for a date, accepted only when surrounding
/// context carries a date-marker word or the matched year is plausible
/// (spec.md §4.3 step 2).
fn scan_body_for_date(text: &str, current_year: i32) -> Option<NaiveDate> {
    let window = &text[..text.len().min(2000)];
    let lower = window.to_lowercase();
    let has_marker = DATE_MARKER_WORDS.iter().any(|w| lower.contains(w));

    for caps in DATE_DMY.captures_iter(window) {
        let y: i32 = caps[3].parse().ok()?;
        if has_marker || (2020..=current_year).contains(&y) {
            let d = caps[1].parse().ok()?;
            let m = caps[2].parse().ok()?;
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Some(date);
            }
        }
    }
    for caps in DATE_ISO.captures_iter(window) {
        let y: i32 = caps[1].parse().ok()?;
        if has_marker || (2020..=current_year).contains(&y) {
            let m = caps[2].parse().ok()?;
            let d = caps[3].parse().ok()?;
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Some(date);
            }
        }
    }
    None
}

fn url_path_date(url: &str) -> Option<NaiveDate> {
    let caps = URL_DATE_PATH.captures(url)?;
    let y = caps[1].parse().ok()?;
    let m = caps[2].parse().ok()?;
    let d = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Resolve a date for `raw` using the first-success-wins cascade from
/// spec.md §4.3: fuzzy candidate text, body regex scan, URL path
/// pattern, then (already folded into `candidate_date_text` by the RSS
/// extractor) the feed's `published_parsed` tuple.
pub fn resolve_date(raw: &RawRecord, today: NaiveDate) -> Option<NaiveDate> {
    let resolved = fuzzy_parse_date(&raw.candidate_date_text)
        .or_else(|| scan_body_for_date(&raw.raw_text, today.year()))
        .or_else(|| url_path_date(&raw.url));

    resolved.filter(|d| *d >= NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() && *d <= today)
}

/// Full C3 pipeline: turn a `RawRecord` into a `DraftRecord`, or `None`
/// when no usable date could be resolved at all (the record is dropped
/// before it even reaches the validator).
pub fn extract(raw: &RawRecord, today: NaiveDate) -> Option<DraftRecord> {
    let date = match resolve_date(raw, today) {
        Some(d) => d,
        None => {
            log::debug!(
                "fact_extractor[{}]: {} ({})",
                raw.source_tag,
                crate::error::ParseError::UnparseableDate,
                raw.url
            );
            return None;
        }
    };
    let combined = format!("{} {}", raw.title_guess, raw.raw_text);
    let cases = resolve_cases(&combined);
    let location = gazetteer::extract_location(&combined);

    Some(DraftRecord {
        date: Some(date),
        cases,
        source: raw.source_tag.clone(),
        title: truncate_field(&raw.title_guess, 200),
        content: truncate_field(&raw.raw_text, 5000),
        url: raw.url.clone(),
        location,
    })
}

fn truncate_field(s: &str, max_len: usize) -> String {
    crate::textutil::truncate_text(s.trim(), max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, body: &str, date_text: &str, url: &str) -> RawRecord {
        RawRecord {
            raw_text: body.to_string(),
            candidate_date_text: date_text.to_string(),
            url: url.to_string(),
            title_guess: title.to_string(),
            source_tag: "rospotrebnadzor-web".to_string(),
        }
    }

    #[test]
    fn extracts_registered_appeals() {
        let text = "В Тюмени зарегистрировано 73 обращения по поводу укусов клещей";
        assert_eq!(extract_case_number(text), Some(73));
    }

    #[test]
    fn extracts_detected_cases() {
        assert_eq!(extract_case_number("выявлено 12 случаев энцефалита"), Some(12));
    }

    #[test]
    fn rejects_out_of_bounds_numbers() {
        assert_eq!(extract_case_number("укусов клещей 20000"), None);
    }

    #[test]
    fn proximity_sweep_catches_loose_mentions() {
        assert_eq!(extract_case_number("клещевой случай номер 4 зафиксирован"), Some(4));
    }

    #[test]
    fn resolve_cases_falls_back_to_qualitative_zero() {
        assert_eq!(resolve_cases("просто упоминание клеща без цифр"), Some(0));
    }

    #[test]
    fn resolve_cases_none_without_keywords() {
        assert_eq!(resolve_cases("обычная новость о погоде"), None);
    }

    #[test]
    fn date_dmy_parses() {
        assert_eq!(
            fuzzy_parse_date("15.06.2024"),
            NaiveDate::from_ymd_opt(2024, 6, 15)
        );
    }

    #[test]
    fn date_iso_parses() {
        assert_eq!(
            fuzzy_parse_date("2024-06-15"),
            NaiveDate::from_ymd_opt(2024, 6, 15)
        );
    }

    #[test]
    fn date_russian_month_parses() {
        assert_eq!(
            fuzzy_parse_date("15 июня 2024"),
            NaiveDate::from_ymd_opt(2024, 6, 15)
        );
    }

    #[test]
    fn url_path_date_used_as_fallback() {
        let r = raw("тест", "просто текст без дат клещ", "", "https://x.ru/2024/06/15/article");
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(resolve_date(&r, today), NaiveDate::from_ymd_opt(2024, 6, 15));
    }

    #[test]
    fn future_and_ancient_dates_rejected_not_coerced() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let future = raw("x", "клещ", "01.01.2099", "https://x.ru");
        assert_eq!(resolve_date(&future, today), None);
        let ancient = raw("x", "клещ", "01.01.2019", "https://x.ru");
        assert_eq!(resolve_date(&ancient, today), None);
    }

    #[test]
    fn end_to_end_basic_ingest() {
        let r = raw(
            "В Тюмени зарегистрировано 73 обращения по поводу укусов клещей",
            "В Тюмени зарегистрировано 73 обращения по поводу укусов клещей",
            "15.06.2024",
            "https://72.rospotrebnadzor.ru/content/1",
        );
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let draft = extract(&r, today).unwrap();
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 6, 15));
        assert_eq!(draft.cases, Some(73));
        assert_eq!(draft.location.as_deref(), Some("Тюмень"));
    }
}
