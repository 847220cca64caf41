//! C7: scheduler.
//!
//! Grounded in loop shape on `main.rs`'s `tokio::main` entry point,
//! generalized from a one-shot-per-command bot dispatch into a
//! `tokio::time::interval`-driven periodic pipeline run. The
//! schedule-vs-skip split is adapted from the `rootsignal` scout
//! scheduler's due/skip partition into simple tick-coalescing: a run
//! already in flight absorbs the next tick instead of queuing a second
//! one.

use crate::context::Context;
use crate::dedup::{DedupOutcome, Deduplicator};
use crate::extractors::{
    LocalNewsExtractor, RssExtractor, SourceExtractor, TelegramExtractor, VkExtractor, WebSearchExtractor,
};
use crate::model::{MutableFields, Record, RecordId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;

const SHUTDOWN_GRACE_SECS: u64 = 30;

/// Outcome of one source's pass through C1-C6 in a single run, logged at
/// `info` per spec.md §7's per-run summary contract.
#[derive(Debug, Default)]
pub struct SourceRunSummary {
    pub ok_count: usize,
    pub error_reasons: HashMap<&'static str, usize>,
}

/// Handed to callers (e.g. the read API's `trigger_update`) so they can
/// nudge the scheduler without holding a reference to its internals.
#[derive(Clone)]
pub struct SchedulerHandle {
    notify: Arc<Notify>,
}

impl SchedulerHandle {
    pub fn request_tick(&self) {
        self.notify.notify_one();
    }
}

fn build_extractors() -> Vec<Box<dyn SourceExtractor>> {
    vec![
        Box::new(WebSearchExtractor::new()),
        Box::new(RssExtractor::new()),
        Box::new(TelegramExtractor::new()),
        Box::new(VkExtractor::new()),
        Box::new(LocalNewsExtractor::new()),
    ]
}

/// Run one full pipeline pass: fetch+extract every enabled source
/// concurrently, then sequentially run C3->C4->C5 per source's
/// materialized batch and commit it in one transaction (spec.md §4.6/§5:
/// "all records from one source are applied atomically").
pub async fn run_once(ctx: Arc<Context>) -> HashMap<String, SourceRunSummary> {
    let today = chrono::Utc::now().date_naive();
    let thresholds = ctx.config.risk_thresholds();

    let mut joins: JoinSet<(String, crate::extractors::ExtractOutcome)> = JoinSet::new();
    for extractor in build_extractors() {
        let extractor: Arc<dyn SourceExtractor> = Arc::from(extractor);
        let cfg = ctx.source_config(extractor.config_key());
        if !cfg.enabled {
            continue;
        }
        let ctx = Arc::clone(&ctx);
        let tag = extractor.source_tag().to_string();
        joins.spawn(async move {
            let outcome = extractor.fetch_list(&ctx).await;
            (tag, outcome)
        });
    }

    let mut summaries: HashMap<String, SourceRunSummary> = HashMap::new();

    while let Some(joined) = joins.join_next().await {
        let (tag, outcome) = match joined {
            Ok(pair) => pair,
            Err(join_err) => {
                if join_err.is_panic() {
                    log::error!("scheduler: a source task panicked: {join_err}");
                }
                continue;
            }
        };

        let mut summary = SourceRunSummary::default();
        if let Some(err) = outcome.fetch_error {
            *summary.error_reasons.entry("fetch").or_insert(0) += 1;
            log::warn!("source {tag}: fetch failed: {err}");
            summaries.insert(tag, summary);
            continue;
        }

        let mut dedup = Deduplicator::new();
        let mut inserts: Vec<Record> = Vec::new();
        let mut updates: Vec<(RecordId, MutableFields)> = Vec::new();

        for raw in outcome.raw_records {
            let Some(draft) = crate::fact_extractor::extract(&raw, today) else {
                *summary.error_reasons.entry("unparseable_date").or_insert(0) += 1;
                continue;
            };
            match crate::validator::validate(draft, today, &thresholds) {
                Ok(record) => match dedup.classify(record, &ctx.store) {
                    DedupOutcome::Insert(r) => {
                        summary.ok_count += 1;
                        inserts.push(r);
                    }
                    DedupOutcome::Update { id, fields } => {
                        summary.ok_count += 1;
                        updates.push((id, fields));
                    }
                    DedupOutcome::Duplicate => {}
                },
                Err(reason) => {
                    *summary.error_reasons.entry(reason_key(reason)).or_insert(0) += 1;
                }
            }
        }

        match ctx.store.commit_source_batch(inserts, updates) {
            Ok(_) => {}
            Err(e) => {
                log::error!("source {tag}: store transaction failed, rolled back: {e}");
                *summary.error_reasons.entry("store").or_insert(0) += 1;
            }
        }

        log::info!(
            "source {tag}: ok={} errors={:?}",
            summary.ok_count,
            summary.error_reasons
        );
        summaries.insert(tag, summary);
    }

    summaries
}

fn reason_key(reason: crate::model::RejectionReason) -> &'static str {
    use crate::model::RejectionReason::*;
    match reason {
        MissingField => "missing_field",
        BadType => "bad_type",
        NegativeCases => "negative_cases",
        ImplausibleCases => "implausible_cases",
        FutureDate => "future_date",
        AncientDate => "ancient_date",
        OffSeasonWithCases => "off_season_with_cases",
        BadURL => "bad_url",
        OversizedField => "oversized_field",
    }
}

/// Drive the periodic pipeline loop until `shutdown_rx` fires. Ticks are
/// coalesced: a tick arriving while a run is in flight is absorbed by the
/// `Notify`-based guard rather than queuing a second concurrent run.
pub async fn run_scheduler(ctx: Arc<Context>, mut shutdown_rx: watch::Receiver<bool>) -> SchedulerHandle {
    let notify = Arc::new(Notify::new());
    let handle = SchedulerHandle { notify: Arc::clone(&notify) };

    let interval_mins = ctx.config.parsing.auto_update_interval_minutes.max(1);
    let running = Arc::new(AtomicBool::new(false));

    let task_ctx = Arc::clone(&ctx);
    let task_notify = Arc::clone(&notify);
    let task_running = Arc::clone(&running);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_mins * 60));
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = task_notify.notified() => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }

            if task_running.swap(true, Ordering::SeqCst) {
                log::debug!("scheduler: run already in flight, coalescing this tick");
                continue;
            }

            let run_ctx = Arc::clone(&task_ctx);
            let run_running = Arc::clone(&task_running);
            tokio::spawn(async move {
                let summaries = run_once(run_ctx).await;
                log::info!("scheduler: run complete, {} sources reporting", summaries.len());
                run_running.store(false, Ordering::SeqCst);
            });
        }

        tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), async {
            while task_running.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
        .await
        .ok();
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_key_covers_every_variant() {
        use crate::model::RejectionReason::*;
        for reason in [
            MissingField,
            BadType,
            NegativeCases,
            ImplausibleCases,
            FutureDate,
            AncientDate,
            OffSeasonWithCases,
            BadURL,
            OversizedField,
        ] {
            assert!(!reason_key(reason).is_empty());
        }
    }

    #[tokio::test]
    async fn run_once_against_empty_config_reports_each_enabled_source() {
        let cfg = crate::config::AppConfig::default();
        let store = crate::store::Store::open_temporary().unwrap();
        let ctx = Arc::new(Context::new(cfg, store));
        let summaries = run_once(ctx).await;
        assert_eq!(summaries.len(), 5);
    }
}
