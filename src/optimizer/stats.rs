//! Aggregate statistics over the retained history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::history::PerformanceRecord;
use super::rankings::RankingTable;
use crate::domain::DomainCategory;
use crate::verification::{VerificationMethod, VerificationStrategy};

/// Domains succeeding less often than this are flagged.
pub const DOMAIN_SUCCESS_THRESHOLD: f64 = 0.7;
/// Methods succeeding less often than this are flagged...
pub const METHOD_SUCCESS_THRESHOLD: f64 = 0.5;
/// ...once they have at least this many uses.
pub const METHOD_MIN_USES: u64 = 5;

/// Outcome aggregate for one strategy, method or domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub uses: u64,
    pub successes: u64,
    /// Rolling mean confidence
    pub avg_confidence: f64,
    /// Rolling mean duration in milliseconds
    pub avg_duration_ms: f64,
}

impl OutcomeStats {
    pub fn record(&mut self, success: bool, confidence: f64, duration_ms: u64) {
        self.uses += 1;
        if success {
            self.successes += 1;
        }

        let n = self.uses as f64;
        self.avg_confidence = ((n - 1.0) * self.avg_confidence + confidence) / n;
        self.avg_duration_ms = ((n - 1.0) * self.avg_duration_ms + duration_ms as f64) / n;
    }

    pub fn success_rate(&self) -> f64 {
        if self.uses == 0 {
            0.0
        } else {
            self.successes as f64 / self.uses as f64
        }
    }
}

/// Per-strategy, per-method and per-domain outcome statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStatistics {
    pub total_records: usize,
    pub overall: OutcomeStats,
    pub by_strategy: BTreeMap<VerificationStrategy, OutcomeStats>,
    pub by_method: BTreeMap<VerificationMethod, OutcomeStats>,
    pub by_domain: BTreeMap<DomainCategory, OutcomeStats>,
}

impl PerformanceStatistics {
    /// Aggregate a sequence of records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PerformanceRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            let (success, confidence, duration) =
                (record.success, record.confidence, record.duration_ms);

            stats.total_records += 1;
            stats.overall.record(success, confidence, duration);
            stats
                .by_strategy
                .entry(record.strategy)
                .or_default()
                .record(success, confidence, duration);
            stats
                .by_domain
                .entry(record.theorem_category)
                .or_default()
                .record(success, confidence, duration);
            for method in &record.methods {
                stats
                    .by_method
                    .entry(*method)
                    .or_default()
                    .record(success, confidence, duration);
            }
        }
        stats
    }

    /// Advisory text for weak domains and methods.
    pub fn improvement_recommendations(&self, rankings: &RankingTable) -> Vec<String> {
        let mut advice = Vec::new();

        for (domain, stats) in &self.by_domain {
            let rate = stats.success_rate();
            if rate < DOMAIN_SUCCESS_THRESHOLD {
                advice.push(format!(
                    "Domain {} succeeds in {:.0}% of {} verifications; prefer {} (currently best ranked)",
                    domain,
                    rate * 100.0,
                    stats.uses,
                    rankings[*domain].best_strategy()
                ));
            }
        }

        for (method, stats) in &self.by_method {
            let rate = stats.success_rate();
            if stats.uses >= METHOD_MIN_USES && rate < METHOD_SUCCESS_THRESHOLD {
                advice.push(format!(
                    "Method {} succeeds in only {:.0}% of {} uses; consider deprioritizing it",
                    method,
                    rate * 100.0,
                    stats.uses
                ));
            }
        }

        advice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(
        category: DomainCategory,
        strategy: VerificationStrategy,
        methods: Vec<VerificationMethod>,
        success: bool,
        confidence: f64,
        duration_ms: u64,
    ) -> PerformanceRecord {
        PerformanceRecord::new(category, strategy, methods, success, confidence)
            .with_duration(duration_ms)
    }

    #[test]
    fn test_aggregates_per_key() {
        let records = vec![
            record(
                DomainCategory::Monetary,
                VerificationStrategy::SingleMethod,
                vec![VerificationMethod::DirectProof],
                true,
                0.9,
                100,
            ),
            record(
                DomainCategory::Monetary,
                VerificationStrategy::ParallelMethods,
                vec![VerificationMethod::DirectProof, VerificationMethod::ModelChecking],
                false,
                0.3,
                300,
            ),
        ];

        let stats = PerformanceStatistics::from_records(&records);

        assert_eq!(stats.total_records, 2);
        assert!((stats.overall.avg_confidence - 0.6).abs() < 1e-9);
        assert!((stats.overall.avg_duration_ms - 200.0).abs() < 1e-9);
        assert_eq!(stats.by_method[&VerificationMethod::DirectProof].uses, 2);
        assert_eq!(stats.by_method[&VerificationMethod::ModelChecking].successes, 0);
        assert_eq!(
            stats.by_strategy[&VerificationStrategy::SingleMethod].success_rate(),
            1.0
        );
        assert_eq!(stats.by_domain[&DomainCategory::Monetary].success_rate(), 0.5);
    }

    #[test]
    fn test_improvement_recommendations() {
        let mut records = Vec::new();
        for i in 0..6 {
            records.push(record(
                DomainCategory::Fiscal,
                VerificationStrategy::SequentialMethods,
                vec![VerificationMethod::Contradiction],
                i == 0,
                0.5,
                10,
            ));
        }
        records.push(record(
            DomainCategory::Behavioral,
            VerificationStrategy::SingleMethod,
            vec![VerificationMethod::HistoricalEvidence],
            true,
            0.9,
            10,
        ));

        let mut rankings = RankingTable::default();
        rankings[DomainCategory::Fiscal]
            .set_strategy_score(VerificationStrategy::ParallelMethods, 0.8);

        let advice = PerformanceStatistics::from_records(&records).improvement_recommendations(&rankings);

        assert_eq!(
            advice,
            vec![
                "Domain fiscal succeeds in 17% of 6 verifications; prefer parallel_methods (currently best ranked)"
                    .to_string(),
                "Method contradiction succeeds in only 17% of 6 uses; consider deprioritizing it"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_few_uses_not_flagged() {
        let records: Vec<_> = (0..4)
            .map(|_| {
                record(
                    DomainCategory::General,
                    VerificationStrategy::SingleMethod,
                    vec![VerificationMethod::ModelChecking],
                    false,
                    0.1,
                    1,
                )
            })
            .collect();
        let advice = PerformanceStatistics::from_records(&records)
            .improvement_recommendations(&RankingTable::default());
        // Domain flagged, method below the minimum use count is not.
        assert_eq!(advice.len(), 1);
        assert!(advice[0].starts_with("Domain general"));
    }
}
