//! Bounded outcome history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::DomainCategory;
use crate::verification::{VerificationMethod, VerificationStrategy};

/// One verification outcome as seen by the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Category whose rankings the outcome updated.
    pub theorem_category: DomainCategory,
    pub strategy: VerificationStrategy,
    pub methods: Vec<VerificationMethod>,
    /// Raw domain tag of the theorem.
    pub domain: String,
    pub success: bool,
    pub confidence: f64,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceRecord {
    pub fn new(
        theorem_category: DomainCategory,
        strategy: VerificationStrategy,
        methods: Vec<VerificationMethod>,
        success: bool,
        confidence: f64,
    ) -> Self {
        Self {
            theorem_category,
            strategy,
            methods,
            domain: theorem_category.to_string(),
            success,
            confidence: confidence.clamp(0.0, 1.0),
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Append-only record buffer holding at most `max_size` entries.
///
/// Once full, every push evicts the oldest record.
#[derive(Debug, Clone)]
pub struct PerformanceHistory {
    records: VecDeque<PerformanceRecord>,
    max_size: usize,
}

impl PerformanceHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Append a record, returning the evicted one if the buffer was full.
    pub fn push(&mut self, record: PerformanceRecord) -> Option<PerformanceRecord> {
        self.records.push_back(record);
        if self.records.len() > self.max_size {
            self.records.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PerformanceRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<PerformanceRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
