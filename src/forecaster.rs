//! C9: forecaster — sliding-window baseline plus an OLS upgrade.
//!
//! Scoped down from `enhanced_ml_predictor.py` (which trains RandomForest/
//! GradientBoosting/LSTM regressors over engineered calendar features) to
//! what spec.md §4.9 actually mandates: a mandatory last-4-weeks baseline,
//! and an upgraded regressor selected only when it beats the baseline's
//! held-out MAE. The contract is total — this never fails the caller.

use crate::model::{ForecastPoint, WeekBucket};
use chrono::{Duration, NaiveDate};

const WINDOW: usize = 4;
const MIN_BUCKETS: usize = 8;

/// Produce `horizon` future weekly points from `buckets`. Never fails:
/// falls back to the baseline, then to an empty sequence, logging why.
pub fn forecast(buckets: &[WeekBucket], horizon: usize) -> Vec<ForecastPoint> {
    if horizon == 0 {
        return Vec::new();
    }
    if buckets.is_empty() {
        log::warn!("forecaster: no historical buckets, returning empty sequence");
        return Vec::new();
    }

    let series: Vec<f64> = buckets.iter().map(|b| b.cases_sum as f64).collect();
    if series.iter().any(|v| !v.is_finite()) {
        log::warn!("forecaster: NaN/Inf contamination in series, falling back to baseline");
        return baseline_forecast(&series, buckets, horizon);
    }

    if series.len() < MIN_BUCKETS || series.iter().all(|&v| v == 0.0) {
        return baseline_forecast(&series, buckets, horizon);
    }

    match try_ols_forecast(&series, buckets, horizon) {
        Some(points) => points,
        None => baseline_forecast(&series, buckets, horizon),
    }
}

/// Convenience operation: all weekly forecast points whose date falls in
/// calendar year 2026.
pub fn forecast_2026(buckets: &[WeekBucket]) -> Vec<ForecastPoint> {
    if buckets.is_empty() {
        return Vec::new();
    }
    let last_date = buckets.last().map(|b| b.start_date).unwrap_or_else(|| chrono::Utc::now().date_naive());
    let year_end = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
    let weeks_needed = ((year_end - last_date).num_days() / 7 + 2).max(0) as usize;
    forecast(buckets, weeks_needed)
        .into_iter()
        .filter(|p| p.date.iso_week().year() == 2026 || p.date.year() == 2026)
        .collect()
}

fn next_week_dates(last_start: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon)
        .map(|i| last_start + Duration::days(7 * i as i64))
        .collect()
}

fn clamp_nonneg(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.round() as u32
    } else {
        0
    }
}

/// Mandatory baseline: each predicted week is the mean of the four most
/// recent known-or-predicted weeks.
fn baseline_forecast(series: &[f64], buckets: &[WeekBucket], horizon: usize) -> Vec<ForecastPoint> {
    let last_start = buckets.last().map(|b| b.start_date).unwrap_or_else(|| chrono::Utc::now().date_naive());
    let dates = next_week_dates(last_start, horizon);
    let mut rolling: Vec<f64> = series.to_vec();
    let mut points = Vec::with_capacity(horizon);

    for (i, date) in dates.into_iter().enumerate() {
        let window_start = rolling.len().saturating_sub(WINDOW);
        let window = &rolling[window_start..];
        let avg = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        };
        let predicted = clamp_nonneg(avg);
        rolling.push(predicted as f64);
        points.push(ForecastPoint {
            date,
            predicted_cases: predicted,
            week_index: (i + 1) as u32,
            is_forecast: true,
        });
    }
    points
}

/// Upgraded model: ordinary least squares regressing `next = a + b*mean(window)`
/// over sliding 4-week windows, solved via closed-form normal equations
/// (no linear-algebra crate needed for one feature). Selected only when
/// its MAE on the held-out tail beats the baseline's.
fn try_ols_forecast(series: &[f64], buckets: &[WeekBucket], horizon: usize) -> Option<Vec<ForecastPoint>> {
    let (xs, ys) = sliding_window_xy(series);
    if xs.len() < 4 {
        return None;
    }

    let tail_len = (xs.len() / 5).max(1);
    let train_len = xs.len() - tail_len;
    if train_len < 3 {
        return None;
    }

    let (a, b) = ols_fit(&xs[..train_len], &ys[..train_len])?;

    let ols_mae = mean_abs_error(&xs[train_len..], &ys[train_len..], |x| a + b * x);
    let baseline_mae = mean_abs_error(&xs[train_len..], &ys[train_len..], |x| x);

    if !(ols_mae < baseline_mae) {
        return None;
    }

    let last_start = buckets.last().map(|b| b.start_date).unwrap_or_else(|| chrono::Utc::now().date_naive());
    let dates = next_week_dates(last_start, horizon);
    let mut rolling = series.to_vec();
    let mut points = Vec::with_capacity(horizon);

    for (i, date) in dates.into_iter().enumerate() {
        let window_start = rolling.len().saturating_sub(WINDOW);
        let window_mean = if rolling[window_start..].is_empty() {
            0.0
        } else {
            rolling[window_start..].iter().sum::<f64>() / rolling[window_start..].len() as f64
        };
        let predicted_raw = a + b * window_mean;
        let predicted = clamp_nonneg(predicted_raw);
        rolling.push(predicted as f64);
        points.push(ForecastPoint {
            date,
            predicted_cases: predicted,
            week_index: (i + 1) as u32,
            is_forecast: true,
        });
    }
    Some(points)
}

/// Build `(mean(window_of_4), next_value)` pairs from a weekly series.
fn sliding_window_xy(series: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    if series.len() <= WINDOW {
        return (xs, ys);
    }
    for i in WINDOW..series.len() {
        let window = &series[i - WINDOW..i];
        xs.push(window.iter().sum::<f64>() / WINDOW as f64);
        ys.push(series[i]);
    }
    (xs, ys)
}

/// Closed-form simple linear regression `y = a + b*x` via normal equations.
fn ols_fit(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len() as f64;
    if n < 2.0 {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
    }
    if var_x.abs() < f64::EPSILON {
        return None;
    }
    let b = cov / var_x;
    let a = mean_y - b * mean_x;
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    Some((a, b))
}

fn mean_abs_error(xs: &[f64], ys: &[f64], predict: impl Fn(f64) -> f64) -> f64 {
    if xs.is_empty() {
        return f64::INFINITY;
    }
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (predict(*x) - y).abs())
        .sum::<f64>()
        / xs.len() as f64
}
