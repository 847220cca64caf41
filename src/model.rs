//! Normalized record model and the derived read-side types.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identity for a `Record`. Never reused across the
/// lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Risk tier derived purely from `cases`. See [`risk_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    None,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Russian label used for display; compared internally by the enum variant, never the string.
    pub fn label_ru(self) -> &'static str {
        match self {
            RiskLevel::None => "Нет данных",
            RiskLevel::Low => "Низкий",
            RiskLevel::Moderate => "Умеренный",
            RiskLevel::High => "Высокий",
            RiskLevel::VeryHigh => "Очень высокий",
        }
    }
}

/// Configurable thresholds backing [`risk_for`] (spec.md §4.8).
#[derive(Debug, Clone, Copy)]
pub struct RiskThresholds {
    pub low: u32,
    pub moderate: u32,
    pub high: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 50,
            moderate: 100,
            high: 150,
        }
    }
}

/// Pure function: `risk_level = risk_for(cases)`. Idempotent, boundary-tested.
pub fn risk_for(cases: u32, thresholds: &RiskThresholds) -> RiskLevel {
    if cases == 0 {
        RiskLevel::None
    } else if cases < thresholds.low {
        RiskLevel::Low
    } else if cases < thresholds.moderate {
        RiskLevel::Moderate
    } else if cases < thresholds.high {
        RiskLevel::High
    } else {
        RiskLevel::VeryHigh
    }
}

/// Tick-activity season for the Tyumen region: Apr 20 - Oct 10 inclusive.
pub fn is_in_season(date: NaiveDate) -> bool {
    match date.month() {
        5..=9 => true,
        4 => date.day() >= 20,
        10 => date.day() <= 10,
        _ => false,
    }
}

/// A partial, not-yet-validated observation produced by C3 (the fact
/// extractor). Distinct from [`Record`] per the REDESIGN FLAGS: stages
/// that can fail or omit fields use this draft shape rather than a
/// duck-typed dictionary.
#[derive(Debug, Clone, Default)]
pub struct DraftRecord {
    pub date: Option<NaiveDate>,
    pub cases: Option<u32>,
    pub source: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub location: Option<String>,
}

/// The normalized, validated unit of observation stored by C6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub date: NaiveDate,
    pub cases: u32,
    pub risk_level: RiskLevel,
    pub source: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub location: Option<String>,
    pub first_seen_at: chrono::DateTime<chrono::Utc>,
    pub last_updated_at: chrono::DateTime<chrono::Utc>,
}

impl Record {
    /// Field maximums from spec.md §3.
    pub const MAX_TITLE_LEN: usize = 200;
    pub const MAX_CONTENT_LEN: usize = 5000;
    pub const MAX_CASES: u32 = 10_000;
}

/// Mutable fields the deduplicator is allowed to update on a re-observed row.
#[derive(Debug, Clone)]
pub struct MutableFields {
    pub cases: u32,
    pub content: String,
    pub risk_level: RiskLevel,
}

/// Tagged rejection reasons for C4, replacing stringly-typed error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    MissingField,
    BadType,
    NegativeCases,
    ImplausibleCases,
    FutureDate,
    AncientDate,
    OffSeasonWithCases,
    BadURL,
    OversizedField,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::MissingField => "MissingField",
            RejectionReason::BadType => "BadType",
            RejectionReason::NegativeCases => "NegativeCases",
            RejectionReason::ImplausibleCases => "ImplausibleCases",
            RejectionReason::FutureDate => "FutureDate",
            RejectionReason::AncientDate => "AncientDate",
            RejectionReason::OffSeasonWithCases => "OffSeasonWithCases",
            RejectionReason::BadURL => "BadURL",
            RejectionReason::OversizedField => "OversizedField",
        };
        write!(f, "{s}")
    }
}

/// Derived, read-only ISO-week aggregation (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekBucket {
    pub iso_year: i32,
    pub iso_week: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cases_sum: u32,
    pub record_count: u32,
    pub risk_level: RiskLevel,
}

/// Derived forecast point (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_cases: u32,
    pub week_index: u32,
    pub is_forecast: bool,
}

/// News item kind (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsKind {
    Spike,
    DailySpike,
    Activity,
    Trend,
    Summary,
}

/// News item priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Derived human-readable news item (spec.md §3/§4.10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub text: String,
    pub date: NaiveDate,
    pub location: Option<String>,
    pub cases: u32,
    pub kind: NewsKind,
    pub priority: Priority,
}

/// Russian month names, 1-indexed lookup at `RU_MONTHS[month - 1]`.
pub const RU_MONTHS: [&str; 12] = [
    "январь",
    "февраль",
    "март",
    "апрель",
    "май",
    "июнь",
    "июль",
    "август",
    "сентябрь",
    "октябрь",
    "ноябрь",
    "декабрь",
];

/// `DD.MM.YYYY` formatting used throughout the read API (spec.md §6 Locale).
pub fn format_date_ru(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}
