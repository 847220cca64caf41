//! C10: news derivator.
//!
//! Grounded in spirit on `enhanced_ml_predictor.py`'s windowed
//! rolling-average/trend features, repurposed for the five `NewsItem`
//! kinds spec.md §4.10 enumerates instead of feeding a regressor.

use crate::model::{NewsItem, NewsKind, Priority, Record};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

const DEFAULT_WINDOW_DAYS: i64 = 30;
const MAX_ITEMS: usize = 20;

/// Derive news items from `records` as of `today`, using the default
/// 30-day recency window.
pub fn derive_news(records: &[Record], today: NaiveDate) -> Vec<NewsItem> {
    derive_news_with_window(records, today, DEFAULT_WINDOW_DAYS)
}

pub fn derive_news_with_window(records: &[Record], today: NaiveDate, window_days: i64) -> Vec<NewsItem> {
    let window_start = today - Duration::days(window_days);
    let prev_start = window_start - Duration::days(window_days);

    let current: Vec<&Record> = records.iter().filter(|r| r.date > window_start && r.date <= today).collect();
    let previous: Vec<&Record> = records
        .iter()
        .filter(|r| r.date > prev_start && r.date <= window_start)
        .collect();

    let mut items = Vec::new();
    let mut spiked_localities = std::collections::HashSet::new();

    items.extend(spike_items(&current, &previous, &mut spiked_localities));
    items.extend(activity_items(&current, &spiked_localities));
    items.extend(daily_spike_items(&current, window_start, today));
    if let Some(trend) = trend_item(records, today) {
        items.push(trend);
    }
    if let Some(summary) = summary_item(&current, today) {
        items.push(summary);
    }

    items.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.date.cmp(&a.date)));
    items.truncate(MAX_ITEMS);
    items
}

fn sum_by_locality<'a>(records: &[&'a Record]) -> HashMap<&'a str, u32> {
    let mut out: HashMap<&str, u32> = HashMap::new();
    for r in records {
        if let Some(loc) = r.location.as_deref() {
            *out.entry(loc).or_insert(0) += r.cases;
        }
    }
    out
}

fn latest_date_for<'a>(records: &[&'a Record], location: &str) -> NaiveDate {
    records
        .iter()
        .filter(|r| r.location.as_deref() == Some(location))
        .map(|r| r.date)
        .max()
        .unwrap_or_else(|| chrono::Utc::now().date_naive())
}

fn spike_items<'a>(
    current: &[&'a Record],
    previous: &[&'a Record],
    spiked: &mut std::collections::HashSet<&'a str>,
) -> Vec<NewsItem> {
    let current_sums = sum_by_locality(current);
    let previous_sums = sum_by_locality(previous);

    let mut out = Vec::new();
    for (&loc, &cur) in &current_sums {
        let prev = previous_sums.get(loc).copied().unwrap_or(0);
        let threshold = (prev as f64) * 1.5;
        if (cur as f64) > threshold && cur >= 2 {
            spiked.insert(loc);
            let priority = if cur >= 10 { Priority::High } else { Priority::Medium };
            out.push(NewsItem {
                text: format!("В локации {loc} зафиксирован рост случаев укусов клещей: {cur}"),
                date: latest_date_for(current, loc),
                location: Some(loc.to_string()),
                cases: cur,
                kind: NewsKind::Spike,
                priority,
            });
        }
    }
    out
}

fn activity_items<'a>(current: &[&'a Record], spiked: &std::collections::HashSet<&'a str>) -> Vec<NewsItem> {
    let sums = sum_by_locality(current);
    let mut out = Vec::new();
    for (&loc, &cur) in &sums {
        if cur >= 5 && !spiked.contains(loc) {
            out.push(NewsItem {
                text: format!("Активность клещей в локации {loc}: {cur} случаев за период"),
                date: latest_date_for(current, loc),
                location: Some(loc.to_string()),
                cases: cur,
                kind: NewsKind::Activity,
                priority: Priority::Medium,
            });
        }
    }
    out
}

fn daily_spike_items(current: &[&Record], window_start: NaiveDate, today: NaiveDate) -> Vec<NewsItem> {
    let mut by_day: HashMap<NaiveDate, u32> = HashMap::new();
    let mut d = window_start + Duration::days(1);
    while d <= today {
        by_day.entry(d).or_insert(0);
        d += Duration::days(1);
    }
    for r in current {
        *by_day.entry(r.date).or_insert(0) += r.cases;
    }

    let mut out = Vec::new();
    for (&day, &day_cases) in &by_day {
        let previous_days: Vec<u32> = by_day
            .iter()
            .filter(|(&d2, _)| d2 < day)
            .map(|(_, &c)| c)
            .collect();
        if previous_days.is_empty() {
            continue;
        }
        let mean_prev = previous_days.iter().sum::<u32>() as f64 / previous_days.len() as f64;
        if (day_cases as f64) > 2.0 * mean_prev && day_cases >= 3 {
            out.push(NewsItem {
                text: format!("Всплеск обращений за {}: {} случаев", crate::model::format_date_ru(day), day_cases),
                date: day,
                location: None,
                cases: day_cases,
                kind: NewsKind::DailySpike,
                priority: Priority::High,
            });
        }
    }
    out
}

fn trend_item(records: &[Record], today: NaiveDate) -> Option<NewsItem> {
    let buckets = crate::aggregator::group_by_iso_week(records, &crate::model::RiskThresholds::default());
    if buckets.len() < 3 {
        return None;
    }
    let last = buckets.last()?;
    let prior_two = &buckets[buckets.len() - 3..buckets.len() - 1];
    let mean_prior = prior_two.iter().map(|b| b.cases_sum as f64).sum::<f64>() / prior_two.len() as f64;
    if mean_prior <= 0.0 {
        return None;
    }
    let ratio = last.cases_sum as f64 / mean_prior;
    if ratio > 1.3 && last.cases_sum >= 5 {
        Some(NewsItem {
            text: format!(
                "Рост обращений по сравнению с предыдущими неделями: {} случаев на этой неделе",
                last.cases_sum
            ),
            date: today,
            location: None,
            cases: last.cases_sum,
            kind: NewsKind::Trend,
            priority: Priority::Medium,
        })
    } else {
        None
    }
}

fn summary_item(current: &[&Record], today: NaiveDate) -> Option<NewsItem> {
    let sums = sum_by_locality(current);
    let mut ranked: Vec<(&str, u32)> = sums.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(3);

    let total: u32 = ranked.iter().map(|(_, c)| *c).sum();
    if total < 10 {
        return None;
    }

    let names: Vec<&str> = ranked.iter().map(|(n, _)| *n).collect();
    Some(NewsItem {
        text: format!("Лидеры по числу обращений: {} ({} случаев суммарно)", names.join(", "), total),
        date: today,
        location: None,
        cases: total,
        kind: NewsKind::Summary,
        priority: Priority::Low,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskLevel;

    fn rec(date: NaiveDate, cases: u32, loc: &str) -> Record {
        Record {
            id: None,
            date,
            cases,
            risk_level: RiskLevel::Low,
            source: "s".to_string(),
            title: "t".to_string(),
            content: "c".to_string(),
            url: String::new(),
            location: Some(loc.to_string()),
            first_seen_at: chrono::Utc::now(),
            last_updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn spike_scenario_matches_example() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut records = Vec::new();
        for i in 0..12 {
            records.push(rec(today - Duration::days(i), 1, "Ишим"));
        }
        for i in 30..33 {
            records.push(rec(today - Duration::days(i), 1, "Ишим"));
        }
        let items = derive_news(&records, today);
        let spike = items.iter().find(|i| i.kind == NewsKind::Spike && i.location.as_deref() == Some("Ишим"));
        assert!(spike.is_some());
        assert_eq!(spike.unwrap().priority, Priority::High);
        assert_eq!(spike.unwrap().cases, 12);
    }

    #[test]
    fn capped_at_twenty_sorted_by_priority_then_date() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut records = Vec::new();
        for i in 0..30 {
            records.push(rec(today - Duration::days(i % 28), 20, &format!("Loc{i}")));
        }
        let items = derive_news(&records, today);
        assert!(items.len() <= MAX_ITEMS);
        for w in items.windows(2) {
            assert!(w[0].priority >= w[1].priority);
        }
    }

    #[test]
    fn no_activity_below_threshold_yields_no_items() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let records = vec![rec(today, 1, "Тюмень")];
        let items = derive_news(&records, today);
        assert!(items.is_empty());
    }
}
