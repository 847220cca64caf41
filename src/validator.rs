//! C4: record validator — applies spec.md §3 invariants, grounded on
//! `data_verifier.py::verify_data_quality`.

use crate::model::{is_in_season, risk_for, DraftRecord, Record, RejectionReason, RiskThresholds};
use chrono::{NaiveDate, Utc};

/// Validate `draft` against the spec.md §3 invariants, returning a fully
/// populated `Record` (with `id = None`, assigned later by the store) or
/// the first violated invariant.
pub fn validate(
    draft: DraftRecord,
    today: NaiveDate,
    thresholds: &RiskThresholds,
) -> Result<Record, RejectionReason> {
    let date = draft.date.ok_or(RejectionReason::MissingField)?;
    let cases = draft.cases.ok_or(RejectionReason::MissingField)?;

    if draft.source.is_empty() {
        return Err(RejectionReason::MissingField);
    }
    if cases > Record::MAX_CASES {
        return Err(RejectionReason::ImplausibleCases);
    }
    if date > today {
        return Err(RejectionReason::FutureDate);
    }
    if date < NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() {
        return Err(RejectionReason::AncientDate);
    }
    if cases > 0 && !is_in_season(date) {
        return Err(RejectionReason::OffSeasonWithCases);
    }
    if !draft.url.is_empty() && !(draft.url.starts_with("http://") || draft.url.starts_with("https://")) {
        return Err(RejectionReason::BadURL);
    }
    if draft.title.len() > Record::MAX_TITLE_LEN || draft.content.len() > Record::MAX_CONTENT_LEN {
        return Err(RejectionReason::OversizedField);
    }
    if draft.source.len() > 200 {
        return Err(RejectionReason::OversizedField);
    }

    let now = Utc::now();
    Ok(Record {
        id: None,
        date,
        cases,
        risk_level: risk_for(cases, thresholds),
        source: draft.source,
        title: draft.title,
        content: draft.content,
        url: draft.url,
        location: draft.location,
        first_seen_at: now,
        last_updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(date: NaiveDate, cases: u32) -> DraftRecord {
        DraftRecord {
            date: Some(date),
            cases: Some(cases),
            source: "rospotrebnadzor-web".to_string(),
            title: "Заголовок".to_string(),
            content: "Содержимое".to_string(),
            url: "https://example.ru/a".to_string(),
            location: Some("Тюмень".to_string()),
        }
    }

    #[test]
    fn accepts_valid_record() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let d = draft(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 73);
        let record = validate(d, today, &RiskThresholds::default()).unwrap();
        assert_eq!(record.cases, 73);
    }

    #[test]
    fn rejects_future_date() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let d = draft(NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(), 5);
        assert_eq!(validate(d, today, &RiskThresholds::default()), Err(RejectionReason::FutureDate));
    }

    #[test]
    fn rejects_ancient_date() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let d = draft(NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(), 5);
        assert_eq!(validate(d, today, &RiskThresholds::default()), Err(RejectionReason::AncientDate));
    }

    #[test]
    fn rejects_off_season_with_cases() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let d = draft(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), 25);
        assert_eq!(
            validate(d, today, &RiskThresholds::default()),
            Err(RejectionReason::OffSeasonWithCases)
        );
    }

    #[test]
    fn off_season_with_zero_cases_is_ok() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let d = draft(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), 0);
        assert!(validate(d, today, &RiskThresholds::default()).is_ok());
    }

    #[test]
    fn rejects_implausible_cases() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let d = draft(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 20_000);
        assert_eq!(
            validate(d, today, &RiskThresholds::default()),
            Err(RejectionReason::ImplausibleCases)
        );
    }

    #[test]
    fn rejects_bad_url() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut d = draft(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 5);
        d.url = "ftp://example.ru".to_string();
        assert_eq!(validate(d, today, &RiskThresholds::default()), Err(RejectionReason::BadURL));
    }

    #[test]
    fn empty_url_is_allowed() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut d = draft(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 5);
        d.url = String::new();
        assert!(validate(d, today, &RiskThresholds::default()).is_ok());
    }
}
