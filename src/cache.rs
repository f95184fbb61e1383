//! Time-bounded answer memoization with bidirectional substring keys.
//!
//! A lookup hits when a live key contains the query or the query contains
//! the key, so light rephrasings of a recently asked question reuse its
//! answer. Expired entries are evicted lazily while a lookup scans the
//! map; nothing sweeps in the background.
//!
//! # Relaxed invariant
//!
//! The mutex only guards the map's memory. A resolver does
//! `lookup` → (work) → `store` without holding it across the gap, so two
//! concurrent requests for the same question may both miss and both
//! write. That costs a duplicate resolution, never a wrong answer, and
//! must stay that way: do not turn this into a correctness-critical store.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::classifier::normalize_question;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub answer: String,
    pub stored_at: DateTime<Utc>,
}

pub struct AnswerCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl AnswerCache {
    /// A TTL beyond chrono's range is clamped to the maximum duration.
    pub fn new(ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn lookup(&self, question: &str) -> Result<Option<String>> {
        self.lookup_at(question, Utc::now())
    }

    pub fn store(&self, question: &str, answer: &str) -> Result<()> {
        self.store_at(question, answer, Utc::now())
    }

    /// Lookup against an explicit clock.
    ///
    /// An exact key wins; otherwise the most recently stored related key.
    pub fn lookup_at(&self, question: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let key = normalize_question(question);
        if key.is_empty() {
            return Ok(None);
        }

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("answer cache lock poisoned"))?;

        let ttl = self.ttl;
        let before = entries.len();
        entries.retain(|_, e| now - e.stored_at <= ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired cache entries");
        }

        if let Some(e) = entries.get(&key) {
            return Ok(Some(e.answer.clone()));
        }

        let related = entries
            .iter()
            .filter(|(k, _)| k.contains(key.as_str()) || key.contains(k.as_str()))
            .max_by_key(|(_, e)| e.stored_at)
            .map(|(_, e)| e.answer.clone());

        Ok(related)
    }

    pub fn store_at(&self, question: &str, answer: &str, now: DateTime<Utc>) -> Result<()> {
        let key = normalize_question(question);
        if key.is_empty() {
            return Ok(());
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("answer cache lock poisoned"))?;
        entries.insert(
            key,
            CacheEntry {
                answer: answer.to_string(),
                stored_at: now,
            },
        );
        Ok(())
    }

    /// Whether an entry exists under exactly this normalized key, live or not.
    pub fn contains_key(&self, question: &str) -> bool {
        let key = normalize_question(question);
        self.entries
            .lock()
            .map(|e| e.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
