//! C5: deduplicator.
//!
//! Grounded on `data_verifier.py::is_duplicate` (a three-tier check:
//! in-run hash cache, URL lookup, then a fuzzy same-week
//! date/source/title fallback) and `DataVerifier.calculate_data_hash`'s
//! stable-hash-of-key-fields idea, expressed here with `std::hash::Hash`
//! over `(date, source, title)` instead of `hashlib.md5` over a
//! JSON-serialized dict -- both are non-adversarial fingerprints, not
//! security hashes.

use crate::model::{MutableFields, Record};
use crate::store::Store;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

const FUZZY_WINDOW_DAYS: i64 = 7;

/// In-run fingerprint cache, carried across every source processed in
/// one scheduler tick (spec.md §4.5: duplicates can arrive from more
/// than one source in the same run).
#[derive(Default)]
pub struct Deduplicator {
    seen: HashSet<u64>,
}

/// What the caller should do with a validated `Record`: it's genuinely
/// new, it updates an existing row, or it's a duplicate to be dropped.
pub enum DedupOutcome {
    Insert(Record),
    Update { id: crate::model::RecordId, fields: MutableFields },
    Duplicate,
}

fn fingerprint(record: &Record) -> u64 {
    let mut hasher = DefaultHasher::new();
    record.date.hash(&mut hasher);
    record.source.hash(&mut hasher);
    record.title.to_lowercase().trim().hash(&mut hasher);
    record.url.hash(&mut hasher);
    hasher.finish()
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `record` against the in-run cache and `store`. Mutates
    /// the in-run cache as a side effect (mirrors `seen_hashes.add(...)`
    /// on every non-exceptional path in the original).
    pub fn classify(&mut self, record: Record, store: &Store) -> DedupOutcome {
        let fp = fingerprint(&record);
        if self.seen.contains(&fp) {
            return DedupOutcome::Duplicate;
        }

        if !record.url.is_empty() {
            match store.get_by_url(&record.url) {
                Ok(Some(existing)) => {
                    self.seen.insert(fp);
                    return DedupOutcome::Update {
                        id: existing.id.expect("stored records always carry an id"),
                        fields: MutableFields {
                            cases: record.cases,
                            content: record.content,
                            risk_level: record.risk_level,
                        },
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("dedup: url lookup failed for {}: {e}", record.url);
                }
            }
        }

        let title_lower = record.title.to_lowercase();
        match store.find_fuzzy_match(&record.source, &title_lower, record.date, FUZZY_WINDOW_DAYS) {
            Ok(Some(existing)) => {
                self.seen.insert(fp);
                DedupOutcome::Update {
                    id: existing.id.expect("stored records always carry an id"),
                    fields: MutableFields {
                        cases: record.cases,
                        content: record.content,
                        risk_level: record.risk_level,
                    },
                }
            }
            Ok(None) => {
                self.seen.insert(fp);
                DedupOutcome::Insert(record)
            }
            Err(e) => {
                log::warn!("dedup: fuzzy match failed for {}/{title_lower}: {e}", record.source);
                self.seen.insert(fp);
                DedupOutcome::Insert(record)
            }
        }
    }
}
