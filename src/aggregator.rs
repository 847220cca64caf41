//! C8: weekly aggregator — folds records into ISO-week buckets.
//!
//! Grounded on `database.py::get_all_data_grouped_by_week` (pandas
//! groupby on `%Y-%U`), reimplemented against `chrono`'s ISO week number
//! directly instead of a dataframe library.

use crate::model::{risk_for, Record, RiskThresholds, WeekBucket};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;

struct Builder {
    iso_year: i32,
    iso_week: u32,
    min_date: NaiveDate,
    max_date: NaiveDate,
    cases_sum: u32,
    record_count: u32,
}

/// Fold `records` into ISO-week buckets, sorted by `start_date`
/// (spec.md §4.8). Conserves total cases: `sum(bucket.cases) ==
/// sum(record.cases)`.
pub fn group_by_iso_week(records: &[Record], thresholds: &RiskThresholds) -> Vec<WeekBucket> {
    let mut buckets: BTreeMap<(i32, u32), Builder> = BTreeMap::new();

    for r in records {
        let iso = r.date.iso_week();
        let key = (iso.year(), iso.week());
        let entry = buckets.entry(key).or_insert_with(|| Builder {
            iso_year: iso.year(),
            iso_week: iso.week(),
            min_date: r.date,
            max_date: r.date,
            cases_sum: 0,
            record_count: 0,
        });
        entry.min_date = entry.min_date.min(r.date);
        entry.max_date = entry.max_date.max(r.date);
        entry.cases_sum += r.cases;
        entry.record_count += 1;
    }

    buckets
        .into_values()
        .map(|b| {
            let start_date = week_monday(b.iso_year, b.iso_week);
            WeekBucket {
                iso_year: b.iso_year,
                iso_week: b.iso_week,
                start_date,
                end_date: start_date + Duration::days(6),
                cases_sum: b.cases_sum,
                record_count: b.record_count,
                risk_level: risk_for(b.cases_sum, thresholds),
            }
        })
        .collect()
}

fn week_monday(iso_year: i32, iso_week: u32) -> NaiveDate {
    NaiveDate::from_isoywd_opt(iso_year, iso_week, Weekday::Mon)
        .expect("iso year/week pair produced by iso_week() is always valid")
}

/// `"DD.MM-DD.MM"` label used by the `get_graph_data` read API.
pub fn week_label(bucket: &WeekBucket) -> String {
    format!(
        "{}-{}",
        bucket.start_date.format("%d.%m"),
        bucket.end_date.format("%d.%m")
    )
}
