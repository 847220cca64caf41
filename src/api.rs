//! Inbound read API (spec.md §6): plain async functions taking `&Context`.
//! Transport-agnostic by design -- these are the function-level contracts
//! a UI or RPC layer would wrap, not themselves a server.

use crate::context::Context;
use crate::gazetteer;
use crate::model::{format_date_ru, ForecastPoint, NewsItem, Record, RiskLevel, RU_MONTHS};
use crate::store::Store;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WeekStat {
    pub cases: u32,
    pub date: String,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub current_week: WeekStat,
    pub previous_week: WeekStat,
}

/// `get_stats() -> {current_week, previous_week}` (spec.md §6).
pub async fn get_stats(ctx: &Context) -> Result<StatsResponse, crate::error::StoreError> {
    let today = chrono::Utc::now().date_naive();
    let thresholds = ctx.config.risk_thresholds();

    let current = week_stat(&ctx.store, 0, today, &thresholds)?;
    let previous = week_stat(&ctx.store, 1, today, &thresholds)?;
    Ok(StatsResponse {
        current_week: current,
        previous_week: previous,
    })
}

fn week_stat(
    store: &Store,
    weeks_ago: i64,
    today: NaiveDate,
    thresholds: &crate::model::RiskThresholds,
) -> Result<WeekStat, crate::error::StoreError> {
    match store.get_week(weeks_ago, today)? {
        Some(record) => Ok(WeekStat {
            cases: record.cases,
            date: format_date_ru(record.date),
            risk_level: crate::model::risk_for(record.cases, thresholds),
        }),
        None => Ok(WeekStat {
            cases: 0,
            date: format_date_ru(today - chrono::Duration::days(weeks_ago * 7)),
            risk_level: RiskLevel::None,
        }),
    }
}

/// `get_sources(limit) -> [record]`, most-recent-first.
pub async fn get_sources(ctx: &Context, limit: usize) -> Result<Vec<Record>, crate::error::StoreError> {
    ctx.store.query_recent(limit)
}

#[derive(Debug, Serialize)]
pub struct GraphData {
    pub weeks: Vec<String>,
    pub cases: Vec<u32>,
    pub colors: Vec<&'static str>,
}

fn risk_color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::None => "#9e9e9e",
        RiskLevel::Low => "#4caf50",
        RiskLevel::Moderate => "#ffc107",
        RiskLevel::High => "#ff9800",
        RiskLevel::VeryHigh => "#f44336",
    }
}

/// `get_graph_data(start?, end?) -> {weeks[], cases[], colors[]}`; the
/// last `graph.weeks_to_show` buckets when unfiltered.
pub async fn get_graph_data(
    ctx: &Context,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<GraphData, crate::error::StoreError> {
    let thresholds = ctx.config.risk_thresholds();
    let mut buckets = ctx.store.group_by_iso_week(&thresholds)?;

    if let (Some(start), Some(end)) = (start, end) {
        buckets.retain(|b| b.start_date >= start && b.start_date <= end);
    } else {
        let n = ctx.config.graph.weeks_to_show;
        if buckets.len() > n {
            let skip = buckets.len() - n;
            buckets = buckets.split_off(skip);
        }
    }

    Ok(GraphData {
        weeks: buckets.iter().map(crate::aggregator::week_label).collect(),
        cases: buckets.iter().map(|b| b.cases_sum).collect(),
        colors: buckets.iter().map(|b| risk_color(b.risk_level)).collect(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapView {
    All,
    Week,
    Month,
}

#[derive(Debug, Serialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lng: f64,
    pub location: String,
    pub cases: u32,
    pub date: String,
    pub source: String,
    pub title: String,
}

/// `get_map_data(view) -> [{lat, lng, location, cases, date, source, title}]`.
pub async fn get_map_data(ctx: &Context, view: MapView) -> Result<Vec<MapPoint>, crate::error::StoreError> {
    let today = chrono::Utc::now().date_naive();
    let records = match view {
        MapView::All => ctx.store.query_recent(usize::MAX)?,
        MapView::Week => ctx.store.query_range(today - chrono::Duration::days(7), today)?,
        MapView::Month => ctx.store.query_range(today - chrono::Duration::days(30), today)?,
    };

    let points = records
        .into_iter()
        .filter_map(|r| {
            let location = r.location.clone()?;
            let (lat, lng) = gazetteer::coordinates_for(&location)?;
            Some(MapPoint {
                lat,
                lng,
                location,
                cases: r.cases,
                date: format_date_ru(r.date),
                source: r.source,
                title: crate::textutil::truncate_text(&r.title, 50),
            })
        })
        .collect();
    Ok(points)
}

#[derive(Debug, Serialize)]
pub struct MonthlyForecast {
    pub month_name_ru: String,
    pub total_cases: u32,
    pub avg_weekly: f64,
}

#[derive(Debug, Serialize)]
pub struct WeeklyForecastPoint {
    pub date: String,
    pub cases: u32,
    pub week_index: u32,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub monthly: Vec<MonthlyForecast>,
    pub weekly: Vec<WeeklyForecastPoint>,
}

/// `get_forecast_2026() -> {monthly: [...], weekly: [...]}`.
pub async fn get_forecast_2026(ctx: &Context) -> Result<ForecastResponse, crate::error::StoreError> {
    let thresholds = ctx.config.risk_thresholds();
    let buckets = ctx.store.group_by_iso_week(&thresholds)?;
    let points = crate::forecaster::forecast_2026(&buckets);

    let weekly: Vec<WeeklyForecastPoint> = points
        .iter()
        .map(|p: &ForecastPoint| WeeklyForecastPoint {
            date: format_date_ru(p.date),
            cases: p.predicted_cases,
            week_index: p.week_index,
        })
        .collect();

    let monthly = monthly_rollup(&points);
    Ok(ForecastResponse { monthly, weekly })
}

fn monthly_rollup(points: &[ForecastPoint]) -> Vec<MonthlyForecast> {
    let mut by_month: std::collections::BTreeMap<u32, (u32, u32)> = std::collections::BTreeMap::new();
    for p in points {
        let entry = by_month.entry(p.date.month()).or_insert((0, 0));
        entry.0 += p.predicted_cases;
        entry.1 += 1;
    }
    by_month
        .into_iter()
        .map(|(month, (total, weeks))| MonthlyForecast {
            month_name_ru: RU_MONTHS[(month - 1) as usize].to_string(),
            total_cases: total,
            avg_weekly: if weeks > 0 { total as f64 / weeks as f64 } else { 0.0 },
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct NewsFeedResponse {
    pub news: Vec<NewsItem>,
    pub count: usize,
}

/// `get_news_feed() -> {news: [NewsItem], count}`.
pub async fn get_news_feed(ctx: &Context) -> Result<NewsFeedResponse, crate::error::StoreError> {
    let today = chrono::Utc::now().date_naive();
    let records = ctx.store.query_recent(usize::MAX)?;
    let news = crate::news::derive_news(&records, today);
    Ok(NewsFeedResponse { count: news.len(), news })
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted,
}

/// `trigger_update() -> accepted` (asynchronous; returns immediately).
/// The caller gets acknowledgement only -- `scheduler::request_tick`
/// actually wakes the pipeline.
pub async fn trigger_update(scheduler_handle: &crate::scheduler::SchedulerHandle) -> TriggerOutcome {
    scheduler_handle.request_tick();
    TriggerOutcome::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stats_on_empty_store_reports_none_risk() {
        let cfg = crate::config::AppConfig::default();
        let store = Store::open_temporary().unwrap();
        let ctx = Context::new(cfg, store);
        let stats = get_stats(&ctx).await.unwrap();
        assert_eq!(stats.current_week.risk_level, RiskLevel::None);
    }

    #[tokio::test]
    async fn graph_data_defaults_to_configured_week_count() {
        let cfg = crate::config::AppConfig::default();
        let store = Store::open_temporary().unwrap();
        let ctx = Context::new(cfg, store);
        let graph = get_graph_data(&ctx, None, None).await.unwrap();
        assert!(graph.weeks.len() <= ctx.config.graph.weeks_to_show);
        assert_eq!(graph.weeks.len(), graph.cases.len());
        assert_eq!(graph.weeks.len(), graph.colors.len());
    }
}
