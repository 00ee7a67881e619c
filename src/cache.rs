//! Incremental per-topic fetch cache.
//!
//! [`FetchCache`] sits between the front ends and the paper source. For each
//! normalized topic it remembers when the topic was last fetched and which
//! records came back, and on the next request either serves the cached
//! records, fetches only the missing tail, or re-fetches everything once the
//! entry has gone stale.
//!
//! Every fetched record is written through to the [`Store`] before the cache
//! entry is touched, so a failed fetch or a failed write leaves the entry
//! exactly as it was.
//!
//! Each topic key has its own async mutex, held from the freshness check to
//! the entry update. Two concurrent requests for the same topic therefore
//! result in a single remote fetch; different topics do not block each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use paperdesk_core::clock::Clock;
use paperdesk_core::models::{normalize_topic, PaperRecord};
use paperdesk_core::source::{fetch_range, process_entries, PaperSource};
use paperdesk_core::store::Store;

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at: DateTime<Utc>,
    documents: Vec<PaperRecord>,
}

type Slot = Arc<AsyncMutex<Option<CacheEntry>>>;

/// Result of [`FetchCache::fetch`].
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Every record the cache holds for the topic after this call.
    pub documents: Vec<PaperRecord>,
    /// `true` when no remote call was made.
    pub from_cache: bool,
    /// Number of records obtained from the source during this call.
    pub fetched: usize,
}

/// Snapshot of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub fetched_at: DateTime<Utc>,
    pub count: usize,
}

/// Hit/miss counters since construction (or the last [`FetchCache::reset`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

enum Plan {
    Hit,
    Delta { start: usize, missing: usize },
    Full,
}

pub struct FetchCache {
    source: Arc<dyn PaperSource>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    slots: Mutex<HashMap<String, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FetchCache {
    pub fn new(
        source: Arc<dyn PaperSource>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            batch_size: batch_size.max(1),
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return up to `total_requested` records for `topic`, fetching from the
    /// source only what the cache cannot answer.
    ///
    /// A fresh entry that already holds at least `total_requested` records is
    /// returned whole, even when it holds more. A `fetch_interval` of zero
    /// always re-fetches.
    pub async fn fetch(
        &self,
        topic: &str,
        total_requested: usize,
        fetch_interval: Duration,
    ) -> Result<FetchOutcome> {
        let key = normalize_topic(topic);
        if key.is_empty() {
            anyhow::bail!("Topic must not be empty");
        }

        let slot = self.slot(&key);
        let (result, vacant) = {
            let mut entry = slot.lock().await;
            let result = self
                .fetch_locked(&key, &mut entry, total_requested, fetch_interval)
                .await;
            (result, entry.is_none())
        };
        drop(slot);
        if vacant {
            self.release(&key);
        }
        result
    }

    async fn fetch_locked(
        &self,
        key: &str,
        entry: &mut Option<CacheEntry>,
        total_requested: usize,
        fetch_interval: Duration,
    ) -> Result<FetchOutcome> {
        let now = self.clock.now();

        let plan = match entry.as_ref() {
            Some(cached) if is_fresh(cached, now, fetch_interval) => {
                let count = cached.documents.len();
                if count >= total_requested {
                    Plan::Hit
                } else {
                    Plan::Delta {
                        start: count,
                        missing: total_requested - count,
                    }
                }
            }
            _ => Plan::Full,
        };

        match plan {
            Plan::Hit => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let documents = entry
                    .as_ref()
                    .map(|cached| cached.documents.clone())
                    .unwrap_or_default();
                tracing::debug!(topic = %key, count = documents.len(), "cache hit");
                Ok(FetchOutcome {
                    documents,
                    from_cache: true,
                    fetched: 0,
                })
            }
            Plan::Delta { start, missing } => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::info!(topic = %key, start, missing, "fetching missing documents");
                let fresh = self.fetch_and_persist(key, start, missing).await?;
                let fetched = fresh.len();

                let mut documents = entry
                    .take()
                    .map(|cached| cached.documents)
                    .unwrap_or_default();
                documents.extend(fresh);
                *entry = Some(CacheEntry {
                    fetched_at: now,
                    documents: documents.clone(),
                });

                Ok(FetchOutcome {
                    documents,
                    from_cache: false,
                    fetched,
                })
            }
            Plan::Full => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::info!(topic = %key, total_requested, "fetching topic");
                let documents = self.fetch_and_persist(key, 0, total_requested).await?;
                let fetched = documents.len();

                *entry = Some(CacheEntry {
                    fetched_at: now,
                    documents: documents.clone(),
                });

                Ok(FetchOutcome {
                    documents,
                    from_cache: false,
                    fetched,
                })
            }
        }
    }

    /// Drop the entry for `topic`. Returns whether one existed.
    pub async fn evict(&self, topic: &str) -> bool {
        let key = normalize_topic(topic);
        let Some(slot) = self.lock_slots().get(&key).cloned() else {
            return false;
        };
        let existed = slot.lock().await.take().is_some();
        drop(slot);
        self.release(&key);
        existed
    }

    /// Drop every entry and zero the counters.
    pub async fn reset(&self) {
        let slots: Vec<Slot> = self.lock_slots().values().cloned().collect();
        for slot in slots {
            slot.lock().await.take();
        }
        self.lock_slots().retain(|_, slot| Arc::strong_count(slot) > 1);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub async fn entry(&self, topic: &str) -> Option<CacheEntryInfo> {
        let key = normalize_topic(topic);
        let slot = self.lock_slots().get(&key).cloned()?;
        let entry = slot.lock().await;
        entry.as_ref().map(|cached| CacheEntryInfo {
            fetched_at: cached.fetched_at,
            count: cached.documents.len(),
        })
    }

    /// Number of topics currently cached.
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot> = self.lock_slots().values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self, key: &str) -> Slot {
        self.lock_slots()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    /// Remove the slot for `key` if it is empty and nobody else holds it.
    fn release(&self, key: &str) {
        let mut slots = self.lock_slots();
        let vacant = slots.get(key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|entry| entry.is_none())
        });
        if vacant {
            slots.remove(key);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.lock_slots().len()
    }

    async fn fetch_and_persist(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<PaperRecord>> {
        let entries = fetch_range(self.source.as_ref(), key, start, count, self.batch_size).await?;
        let records = process_entries(entries);
        let inserted = self.store.add_documents(key, &records).await?;
        tracing::info!(
            topic = %key,
            source = self.source.name(),
            fetched = records.len(),
            inserted,
            "persisted fetched documents"
        );
        Ok(records)
    }
}

fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>, fetch_interval: Duration) -> bool {
    if fetch_interval.is_zero() {
        return false;
    }
    let interval = TimeDelta::from_std(fetch_interval).unwrap_or(TimeDelta::MAX);
    now - entry.fetched_at < interval
}
