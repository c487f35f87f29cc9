//! Composite result caching.
//!
//! Memoizes [`EnhancedVerificationResult`]s by theorem identity, strategy
//! and level, with hit tracking, optional expiry and a bound on entries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::DEFAULT_CACHE_MAX_ENTRIES;

use super::types::{EnhancedVerificationResult, Theorem, VerificationLevel, VerificationStrategy};

/// Cache key for a verification call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl CacheKey {
    /// Generate a key from theorem identity, strategy and level.
    pub fn generate(
        theorem: &Theorem,
        strategy: VerificationStrategy,
        level: VerificationLevel,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"theorem:");
        hasher.update(theorem.id.as_bytes());
        hasher.update(b"\nstrategy:");
        hasher.update(strategy.as_str().as_bytes());
        hasher.update(b"\nlevel:");
        hasher.update(level.as_str().as_bytes());

        let hash = hasher.finalize();
        CacheKey(format!("{:x}", hash))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0[..self.0.len().min(16)])
    }
}

/// A cached result with access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: EnhancedVerificationResult,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub hit_count: u64,
}

impl CacheEntry {
    fn new(result: EnhancedVerificationResult) -> Self {
        let now = Utc::now();
        Self {
            result,
            created_at: now,
            last_accessed: now,
            hit_count: 0,
        }
    }

    fn record_hit(&mut self) {
        self.hit_count += 1;
        self.last_accessed = Utc::now();
    }

    /// Check if entry is expired.
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| Utc::now() - self.created_at > ttl)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups skipped because the call carried a time limit or disabled caching
    pub bypasses: u64,
    /// Entries dropped to stay under the entry bound
    #[serde(default)]
    pub evictions: u64,
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate hit rate over lookups (bypasses excluded).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Result cache shared by all executor calls.
pub struct ResultCache {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    stats: Arc<RwLock<CacheStats>>,
    /// Time-to-live for entries; unbounded when unset
    ttl: Option<Duration>,
    /// Maximum entries; the least recently accessed is evicted first
    max_entries: usize,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
            ttl: None,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }

    /// Create with a time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Bound the number of entries (at least 1).
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Look up a result, recording a hit or miss. Expired entries are dropped.
    pub async fn get(&self, key: &CacheKey) -> Option<EnhancedVerificationResult> {
        let mut entries = self.entries.write().await;
        let expired = entries.get(key).map(|e| e.is_expired(self.ttl));
        let found = match expired {
            Some(false) => entries.get_mut(key).map(|entry| {
                entry.record_hit();
                entry.result.clone()
            }),
            Some(true) => {
                entries.remove(key);
                None
            }
            None => None,
        };

        let mut stats = self.stats.write().await;
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        stats.entry_count = entries.len() as u64;
        found
    }

    /// Store a result, replacing any previous entry for the key.
    pub async fn insert(&self, key: CacheKey, result: EnhancedVerificationResult) {
        let mut entries = self.entries.write().await;
        let mut evicted = 0;
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            let before = entries.len();
            entries.retain(|_, e| !e.is_expired(ttl));
            evicted += before - entries.len();

            while entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_accessed)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        entries.remove(&k);
                        evicted += 1;
                    }
                    None => break,
                }
            }
        }
        entries.insert(key, CacheEntry::new(result));

        let mut stats = self.stats.write().await;
        stats.evictions += evicted as u64;
        stats.entry_count = entries.len() as u64;
    }

    /// Record a lookup that was skipped.
    pub async fn record_bypass(&self) {
        self.stats.write().await.bypasses += 1;
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop expired entries.
    pub async fn cleanup(&self) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, e| !e.is_expired(ttl));

        let mut stats = self.stats.write().await;
        stats.entry_count = entries.len() as u64;
    }

    /// Remove every entry and reset statistics.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();

        let mut stats = self.stats.write().await;
        *stats = CacheStats::default();
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
