//! Learned strategy and method rankings per domain category.

use serde::{Deserialize, Serialize};

use crate::domain::DomainTable;
use crate::scoring::learning_step;
use crate::verification::{VerificationMethod, VerificationStrategy};

/// Score every ranking starts from.
pub const INITIAL_SCORE: f64 = 0.5;

/// Rankings for one domain category. All scores are in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// Indexed by [`VerificationStrategy::index`]
    strategies: [f64; 4],
    /// Indexed by [`VerificationMethod::index`]
    methods: [f64; 5],
}

impl Default for RankingEntry {
    fn default() -> Self {
        Self {
            strategies: [INITIAL_SCORE; 4],
            methods: [INITIAL_SCORE; 5],
        }
    }
}

impl RankingEntry {
    pub fn strategy_score(&self, strategy: VerificationStrategy) -> f64 {
        self.strategies[strategy.index()]
    }

    pub fn method_score(&self, method: VerificationMethod) -> f64 {
        self.methods[method.index()]
    }

    pub fn set_strategy_score(&mut self, strategy: VerificationStrategy, score: f64) {
        self.strategies[strategy.index()] = score.clamp(0.0, 1.0);
    }

    pub fn set_method_score(&mut self, method: VerificationMethod, score: f64) {
        self.methods[method.index()] = score.clamp(0.0, 1.0);
    }

    /// Apply one learning step to the strategy and to each distinct method.
    pub fn learn(
        &mut self,
        strategy: VerificationStrategy,
        methods: &[VerificationMethod],
        learning_rate: f64,
        success: bool,
        confidence: f64,
    ) {
        let slot = &mut self.strategies[strategy.index()];
        *slot = learning_step(*slot, learning_rate, success, confidence);

        let mut seen = [false; 5];
        for method in methods {
            if std::mem::replace(&mut seen[method.index()], true) {
                continue;
            }
            let slot = &mut self.methods[method.index()];
            *slot = learning_step(*slot, learning_rate, success, confidence);
        }
    }

    /// Highest-scored strategy; declaration order breaks ties.
    pub fn best_strategy(&self) -> VerificationStrategy {
        let mut best = VerificationStrategy::ALL[0];
        for strategy in VerificationStrategy::ALL {
            if self.strategy_score(strategy) > self.strategy_score(best) {
                best = strategy;
            }
        }
        best
    }

    /// The `n` highest-scored methods; the default preference order breaks ties.
    pub fn top_methods(&self, n: usize) -> Vec<VerificationMethod> {
        let mut methods = VerificationMethod::DEFAULT_PREFERENCE.to_vec();
        // Stable sort keeps preference order among equal scores.
        methods.sort_by(|a, b| self.method_score(*b).total_cmp(&self.method_score(*a)));
        methods.truncate(n);
        methods
    }
}

/// Rankings for every domain category.
pub type RankingTable = DomainTable<RankingEntry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainCategory;
    use pretty_assertions::assert_eq;
    use VerificationMethod::*;

    #[test]
    fn test_seeded_at_initial_score() {
        let table = RankingTable::default();
        for (_, entry) in table.iter() {
            for s in VerificationStrategy::ALL {
                assert_eq!(entry.strategy_score(s), INITIAL_SCORE);
            }
            for m in VerificationMethod::ALL {
                assert_eq!(entry.method_score(m), INITIAL_SCORE);
            }
        }
        assert_eq!(table[DomainCategory::Fiscal].top_methods(3), vec![
            DirectProof,
            ModelChecking,
            HistoricalEvidence
        ]);
    }

    #[test]
    fn test_learn_updates_strategy_and_methods_independently() {
        let mut entry = RankingEntry::default();
        entry.learn(
            VerificationStrategy::ParallelMethods,
            &[ModelChecking, HybridApproach, ModelChecking],
            0.1,
            true,
            0.9,
        );

        assert!((entry.strategy_score(VerificationStrategy::ParallelMethods) - 0.59).abs() < 1e-9);
        assert!((entry.method_score(ModelChecking) - 0.59).abs() < 1e-9);
        assert!((entry.method_score(HybridApproach) - 0.59).abs() < 1e-9);
        assert_eq!(entry.method_score(DirectProof), INITIAL_SCORE);
        assert_eq!(entry.strategy_score(VerificationStrategy::SingleMethod), INITIAL_SCORE);

        assert_eq!(entry.best_strategy(), VerificationStrategy::ParallelMethods);
        assert_eq!(entry.top_methods(2), vec![ModelChecking, HybridApproach]);
    }

    #[test]
    fn test_setters_clamp() {
        let mut entry = RankingEntry::default();
        entry.set_strategy_score(VerificationStrategy::AdaptiveStrategy, 4.0);
        entry.set_method_score(Contradiction, -1.0);
        assert_eq!(entry.strategy_score(VerificationStrategy::AdaptiveStrategy), 1.0);
        assert_eq!(entry.method_score(Contradiction), 0.0);
    }

    #[test]
    fn test_best_strategy_ties_use_declaration_order() {
        let mut entry = RankingEntry::default();
        entry.set_strategy_score(VerificationStrategy::SequentialMethods, 0.8);
        entry.set_strategy_score(VerificationStrategy::AdaptiveStrategy, 0.8);
        assert_eq!(entry.best_strategy(), VerificationStrategy::SequentialMethods);
    }
}
