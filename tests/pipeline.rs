//! End-to-end pipeline scenarios, run against a temporary `sled` store.

use chrono::{Datelike, NaiveDate};
use mite_tmn_monitor::extractors::RawRecord;
use mite_tmn_monitor::model::{RejectionReason, RiskLevel, RiskThresholds};
use mite_tmn_monitor::store::Store;
use mite_tmn_monitor::{aggregator, fact_extractor, forecaster, validator};

fn raw(text: &str, date_text: &str, url: &str, title: &str, source: &str) -> RawRecord {
    RawRecord {
        raw_text: text.to_string(),
        candidate_date_text: date_text.to_string(),
        url: url.to_string(),
        title_guess: title.to_string(),
        source_tag: source.to_string(),
    }
}

#[test]
fn basic_ingest_matches_literal_scenario() {
    let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let thresholds = RiskThresholds::default();

    let r = raw(
        "В Тюмени зарегистрировано 73 обращения по поводу укусов клещей",
        "15.06.2024",
        "https://72.rospotrebnadzor.ru/news/1",
        "В Тюмени зарегистрировано 73 обращения по поводу укусов клещей",
        "rospotrebnadzor-web",
    );

    let draft = fact_extractor::extract(&r, today).expect("date should resolve");
    let record = validator::validate(draft, today, &thresholds).expect("should validate");

    assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
    assert_eq!(record.cases, 73);
    assert_eq!(record.risk_level, RiskLevel::Moderate);
    assert_eq!(record.location.as_deref(), Some("Тюмень"));
    assert_eq!(record.source, "rospotrebnadzor-web");
}

#[test]
fn dedup_by_url_updates_in_place() {
    let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let thresholds = RiskThresholds::default();
    let store = Store::open_temporary().unwrap();

    let first = raw(
        "зарегистрировано 73 укуса клеща",
        "15.06.2024",
        "https://72.rospotrebnadzor.ru/news/dup",
        "Новость",
        "rospotrebnadzor-web",
    );
    let draft1 = fact_extractor::extract(&first, today).unwrap();
    let record1 = validator::validate(draft1, today, &thresholds).unwrap();
    store.insert(record1).unwrap();

    let second = raw(
        "зарегистрировано 80 укусов клеща",
        "15.06.2024",
        "https://72.rospotrebnadzor.ru/news/dup",
        "Новость",
        "rospotrebnadzor-web",
    );
    let draft2 = fact_extractor::extract(&second, today).unwrap();
    let record2 = validator::validate(draft2, today, &thresholds).unwrap();

    let existing = store.get_by_url(&record2.url).unwrap().expect("row should already exist");
    assert_eq!(existing.cases, 73);

    let mut dedup = mite_tmn_monitor::dedup::Deduplicator::new();
    match dedup.classify(record2, &store) {
        mite_tmn_monitor::dedup::DedupOutcome::Update { id, fields } => {
            store.update_mutable(id, fields).unwrap();
        }
        _ => panic!("expected an update outcome"),
    }

    let rows = store.query_recent(10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cases, 80);
}

#[test]
fn off_season_mention_with_cases_is_rejected() {
    let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let thresholds = RiskThresholds::default();

    let r = raw("зафиксировано 25 укусов клещей", "15.01.2024", "", "Зимняя новость", "local-news-site");
    let draft = fact_extractor::extract(&r, today).unwrap();
    let err = validator::validate(draft, today, &thresholds).unwrap_err();
    assert_eq!(err, RejectionReason::OffSeasonWithCases);
}

#[test]
fn weekly_aggregation_sums_cases_into_iso_week_buckets() {
    let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let thresholds = RiskThresholds::default();
    let store = Store::open_temporary().unwrap();

    for (date_text, text, url) in [
        ("10.06.2024", "зарегистрировано 10 укусов клещей", "https://x/1"),
        ("12.06.2024", "зарегистрировано 5 укусов клещей", "https://x/2"),
        ("18.06.2024", "зарегистрировано 7 укусов клещей", "https://x/3"),
    ] {
        let r = raw(text, date_text, url, "Новость", "rospotrebnadzor-web");
        let draft = fact_extractor::extract(&r, today).unwrap();
        let record = validator::validate(draft, today, &thresholds).unwrap();
        store.insert(record).unwrap();
    }

    let records = store.query_recent(100).unwrap();
    let buckets = aggregator::group_by_iso_week(&records, &thresholds);

    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].cases_sum, 15);
    assert_eq!(buckets[1].cases_sum, 7);

    let total_from_buckets: u32 = buckets.iter().map(|b| b.cases_sum).sum();
    let total_from_records: u32 = records.iter().map(|r| r.cases).sum();
    assert_eq!(total_from_buckets, total_from_records);
}

#[test]
fn forecast_shape_matches_horizon_with_sufficient_history() {
    let mut buckets = Vec::new();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    for week in 0..20 {
        let week_start = start + chrono::Duration::days(week * 7);
        let iso = week_start.iso_week();
        buckets.push(mite_tmn_monitor::model::WeekBucket {
            iso_year: iso.year(),
            iso_week: iso.week(),
            start_date: week_start,
            end_date: week_start + chrono::Duration::days(6),
            cases_sum: 40,
            record_count: 1,
            risk_level: RiskLevel::Moderate,
        });
    }

    let points = forecaster::forecast(&buckets, 52);
    assert_eq!(points.len(), 52);

    let last_historical = buckets.last().unwrap().start_date;
    assert_eq!(points[0].date, last_historical + chrono::Duration::days(7));
    for w in points.windows(2) {
        assert_eq!((w[1].date - w[0].date).num_days(), 7);
    }
    assert!(points.iter().all(|p| p.is_forecast));
}
