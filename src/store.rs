//! C6: durable record store.
//!
//! Grounded on `KingBright-hacker-s-news/backend/cortex/src/core/
//! news_buffer.rs`'s `sled`-backed cache (serde_json-serialized values,
//! `open_tree` for secondary indexes, explicit `flush`), generalized from
//! a cluster cache into the row table spec.md §4.6/§6 describes: a
//! primary tree keyed by record id, a `by_url` index, and a `by_date`
//! index for range queries.

use crate::error::StoreError;
use crate::model::{MutableFields, Record, RecordId, WeekBucket};
use chrono::{Datelike, NaiveDate};
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::Db;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

const TREE_RECORDS: &str = "records";
const TREE_BY_URL: &str = "by_url";
const TREE_BY_DATE: &str = "by_date";

pub struct Store {
    db: Db,
    next_id: AtomicU64,
}

impl Store {
    /// Open (or create) a store rooted at `path`.
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let next_id = db
            .open_tree(TREE_RECORDS)?
            .iter()
            .keys()
            .filter_map(|k| k.ok())
            .filter_map(|k| id_from_key(&k))
            .max()
            .map(|id| id + 1)
            .unwrap_or(0);
        Ok(Self {
            db,
            next_id: AtomicU64::new(next_id),
        })
    }

    /// An ephemeral in-memory store, used by tests (no disk I/O).
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            next_id: AtomicU64::new(0),
        })
    }

    fn records_tree(&self) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(TREE_RECORDS)?)
    }
    fn by_url_tree(&self) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(TREE_BY_URL)?)
    }
    fn by_date_tree(&self) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(TREE_BY_DATE)?)
    }

    /// Insert a new record, assigning it an id. Part of the caller's
    /// per-source transaction when used from the pipeline; also usable
    /// standalone (e.g. from tests).
    pub fn insert(&self, mut record: Record) -> Result<RecordId, StoreError> {
        let id = RecordId(self.next_id.fetch_add(1, Ordering::SeqCst));
        record.id = Some(id);

        let records = self.records_tree()?;
        let by_url = self.by_url_tree()?;
        let by_date = self.by_date_tree()?;

        (&records, &by_url, &by_date)
            .transaction(|(records, by_url, by_date)| {
                write_insert(records, by_url, by_date, &record, id)
            })
            .map_err(StoreError::from)?;
        Ok(id)
    }

    /// Update the mutable fields of an existing row (deduplicator path).
    pub fn update_mutable(&self, id: RecordId, fields: MutableFields) -> Result<(), StoreError> {
        let records = self.records_tree()?;
        records
            .transaction(|records| {
                let key = id_key(id);
                let existing = records
                    .get(&key)?
                    .ok_or_else(|| ConflictableTransactionError::Abort(StoreError::Transaction(
                        format!("record {id} not found"),
                    )))?;
                let mut record: Record = serde_json::from_slice(&existing)
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                record.cases = fields.cases;
                record.content = fields.content.clone();
                record.risk_level = fields.risk_level;
                record.last_updated_at = chrono::Utc::now();
                let bytes = serde_json::to_vec(&record)
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                records.insert(key.as_slice(), bytes)?;
                Ok(())
            })
            .map_err(StoreError::from)
    }

    pub fn get_by_url(&self, url: &str) -> Result<Option<Record>, StoreError> {
        if url.is_empty() {
            return Ok(None);
        }
        let by_url = self.by_url_tree()?;
        let records = self.records_tree()?;
        match by_url.get(url.as_bytes())? {
            Some(id_bytes) => {
                let id = u64::from_be_bytes(id_bytes.as_ref().try_into().unwrap_or([0; 8]));
                self.get_by_id(RecordId(id), &records)
            }
            None => Ok(None),
        }
    }

    pub fn get_by_id(&self, id: RecordId, records: &sled::Tree) -> Result<Option<Record>, StoreError> {
        match records.get(id_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Convenience wrapper over [`Store::get_by_id`] for callers outside
    /// this module that don't hold a `sled::Tree` handle.
    pub fn find_by_id(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        let records = self.records_tree()?;
        self.get_by_id(id, &records)
    }

    /// Every record whose `by_date` key falls in `[start, end]`, via a
    /// range scan over the `by_date` index rather than a full table walk.
    fn records_in_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>, StoreError> {
        let by_date = self.by_date_tree()?;
        let records = self.records_tree()?;
        let lower = date_key(start, 0);
        let upper = date_key(end, u64::MAX);

        let mut out = Vec::new();
        for kv in by_date.range(lower..=upper) {
            let (key, _) = kv?;
            if let Some(id) = id_from_key(&key[8..16]) {
                if let Some(record) = self.get_by_id(RecordId(id), &records)? {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// All records, most-recent-first, within `[start, end]` inclusive.
    pub fn query_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>, StoreError> {
        let mut out = self.records_in_date_range(start, end)?;
        out.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    /// Most recent `limit` records, most-recent-first. Walks the
    /// `by_date` index backwards so it can stop after `limit` records
    /// instead of scanning the whole table.
    pub fn query_recent(&self, limit: usize) -> Result<Vec<Record>, StoreError> {
        let by_date = self.by_date_tree()?;
        let records = self.records_tree()?;

        let mut out = Vec::new();
        for kv in by_date.iter().rev() {
            if out.len() >= limit {
                break;
            }
            let (key, _) = kv?;
            if let Some(id) = id_from_key(&key[8..16]) {
                if let Some(record) = self.get_by_id(RecordId(id), &records)? {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// The nearest row whose date is `<= today - weeks_ago*7`, found by
    /// seeking the `by_date` index to the last key at or before the
    /// target instead of scanning every record.
    pub fn get_week(&self, weeks_ago: i64, today: NaiveDate) -> Result<Option<Record>, StoreError> {
        let target = today - chrono::Duration::days(weeks_ago * 7);
        let by_date = self.by_date_tree()?;
        let records = self.records_tree()?;

        let upper = date_key(target, u64::MAX);
        match by_date.range(..=upper).next_back() {
            Some(kv) => {
                let (key, _) = kv?;
                match id_from_key(&key[8..16]) {
                    Some(id) => self.get_by_id(RecordId(id), &records),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// Fold all rows into ISO-week buckets, sorted by `start_date`.
    /// Reads records in `by_date` order so bucket construction never
    /// has to re-sort the source rows.
    pub fn group_by_iso_week(
        &self,
        thresholds: &crate::model::RiskThresholds,
    ) -> Result<Vec<WeekBucket>, StoreError> {
        let by_date = self.by_date_tree()?;
        let records = self.records_tree()?;

        let mut all = Vec::new();
        for kv in by_date.iter() {
            let (key, _) = kv?;
            if let Some(id) = id_from_key(&key[8..16]) {
                if let Some(record) = self.get_by_id(RecordId(id), &records)? {
                    all.push(record);
                }
            }
        }
        Ok(crate::aggregator::group_by_iso_week(&all, thresholds))
    }

    /// Run `f` against a scratch in-memory accumulator of candidate
    /// records for one source, then commit them in a single transaction.
    /// Used by the scheduler to give each source an all-or-nothing write.
    pub fn commit_source_batch(
        &self,
        inserts: Vec<Record>,
        updates: Vec<(RecordId, MutableFields)>,
    ) -> Result<Vec<RecordId>, StoreError> {
        let records = self.records_tree()?;
        let by_url = self.by_url_tree()?;
        let by_date = self.by_date_tree()?;
        let mut assigned = Vec::with_capacity(inserts.len());
        let ids: Vec<RecordId> = inserts
            .iter()
            .map(|_| RecordId(self.next_id.fetch_add(1, Ordering::SeqCst)))
            .collect();

        (&records, &by_url, &by_date)
            .transaction(|(records, by_url, by_date)| {
                for (record, id) in inserts.iter().zip(ids.iter()) {
                    let mut r = record.clone();
                    r.id = Some(*id);
                    write_insert(records, by_url, by_date, &r, *id)?;
                }
                for (id, fields) in &updates {
                    let key = id_key(*id);
                    let existing = records.get(&key)?.ok_or_else(|| {
                        ConflictableTransactionError::Abort(StoreError::Transaction(format!(
                            "record {id} not found"
                        )))
                    })?;
                    let mut record: Record = serde_json::from_slice(&existing)
                        .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                    record.cases = fields.cases;
                    record.content = fields.content.clone();
                    record.risk_level = fields.risk_level;
                    record.last_updated_at = chrono::Utc::now();
                    let bytes = serde_json::to_vec(&record)
                        .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                    records.insert(key.as_slice(), bytes)?;
                }
                Ok(())
            })
            .map_err(StoreError::from)?;

        assigned.extend(ids);
        Ok(assigned)
    }

    /// Records within `[start, end]`, grouped by `(source, title_lower)`
    /// for the deduplicator's fuzzy-match fallback lookup.
    pub fn find_fuzzy_match(
        &self,
        source: &str,
        title_lower: &str,
        center: NaiveDate,
        window_days: i64,
    ) -> Result<Option<Record>, StoreError> {
        let start = center - chrono::Duration::days(window_days);
        let end = center + chrono::Duration::days(window_days);
        for record in self.query_range(start, end)? {
            if record.source == source
                && record.title.to_lowercase() == title_lower
                && (record.date - center).num_days().abs() <= 1
            {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

fn write_insert(
    records: &TransactionalTree,
    by_url: &TransactionalTree,
    by_date: &TransactionalTree,
    record: &Record,
    id: RecordId,
) -> Result<(), ConflictableTransactionError<StoreError>> {
    let bytes = serde_json::to_vec(record).map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
    records.insert(id_key(id).as_slice(), bytes)?;
    if !record.url.is_empty() {
        by_url.insert(record.url.as_bytes(), &id.0.to_be_bytes())?;
    }
    by_date.insert(date_key(record.date, id.0), &[])?;
    Ok(())
}

fn id_key(id: RecordId) -> Vec<u8> {
    id.0.to_be_bytes().to_vec()
}

fn id_from_key(key: &[u8]) -> Option<u64> {
    key.try_into().ok().map(u64::from_be_bytes)
}

/// `by_date` index key: big-endian `(days_from_ce, record id)` so a byte
/// range over this tree is also a date range, ascending within a date by
/// id. `id = 0`/`u64::MAX` bound an inclusive date-only range.
fn date_key(date: NaiveDate, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&(date.num_days_from_ce() as u64).to_be_bytes());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Used by callers that want a quick `(iso_year, iso_week) -> count`
/// scratch map without pulling the full aggregator in, e.g. summaries.
pub fn count_by_iso_week(records: &[Record]) -> BTreeMap<(i32, u32), u32> {
    let mut out = BTreeMap::new();
    for r in records {
        let iso = r.date.iso_week();
        *out.entry((iso.year(), iso.week())).or_insert(0) += r.cases;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskThresholds;
    use crate::validator::validate;
    use chrono::NaiveDate;

    fn sample_draft(date: NaiveDate, cases: u32, url: &str) -> crate::model::DraftRecord {
        crate::model::DraftRecord {
            date: Some(date),
            cases: Some(cases),
            source: "rospotrebnadzor-web".to_string(),
            title: "Укусы клещей".to_string(),
            content: "содержимое".to_string(),
            url: url.to_string(),
            location: Some("Тюмень".to_string()),
        }
    }

    #[test]
    fn insert_and_get_by_url_roundtrip() {
        let store = Store::open_temporary().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let record = validate(
            sample_draft(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 73, "https://x.ru/1"),
            today,
            &RiskThresholds::default(),
        )
        .unwrap();
        let id = store.insert(record).unwrap();
        let fetched = store.get_by_url("https://x.ru/1").unwrap().unwrap();
        assert_eq!(fetched.id, Some(id));
        assert_eq!(fetched.cases, 73);
    }

    #[test]
    fn update_mutable_advances_fields() {
        let store = Store::open_temporary().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let record = validate(
            sample_draft(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 73, "https://x.ru/1"),
            today,
            &RiskThresholds::default(),
        )
        .unwrap();
        let id = store.insert(record).unwrap();
        store
            .update_mutable(
                id,
                MutableFields {
                    cases: 80,
                    content: "updated".to_string(),
                    risk_level: crate::model::RiskLevel::Moderate,
                },
            )
            .unwrap();
        let fetched = store.get_by_url("https://x.ru/1").unwrap().unwrap();
        assert_eq!(fetched.cases, 80);
        assert_eq!(fetched.content, "updated");
    }

    #[test]
    fn query_range_filters_and_sorts_desc() {
        let store = Store::open_temporary().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        for (d, url) in [
            (NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(), "https://x.ru/1"),
            (NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(), "https://x.ru/2"),
            (NaiveDate::from_ymd_opt(2024, 6, 18).unwrap(), "https://x.ru/3"),
        ] {
            let record = validate(sample_draft(d, 5, url), today, &RiskThresholds::default()).unwrap();
            store.insert(record).unwrap();
        }
        let rows = store
            .query_range(
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            )
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].date > rows[1].date);
    }

    #[test]
    fn duplicate_url_reinsert_does_not_grow_row_count() {
        let store = Store::open_temporary().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let record = validate(
            sample_draft(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), 73, "https://x.ru/1"),
            today,
            &RiskThresholds::default(),
        )
        .unwrap();
        let id = store.insert(record).unwrap();
        // Simulate a re-ingest: deduplicator finds the existing row and updates instead of inserting.
        store
            .update_mutable(
                id,
                MutableFields {
                    cases: 80,
                    content: "new body".to_string(),
                    risk_level: crate::model::RiskLevel::Moderate,
                },
            )
            .unwrap();
        let all = store.query_recent(100).unwrap();
        assert_eq!(all.len(), 1);
    }
}
