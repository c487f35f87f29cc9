//! Verification service.
//!
//! One explicitly constructed handle owning the executor and the optimizer.
//! Callers create it once at startup and share it; nothing here is global.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::gateway::ProverGateway;
use crate::optimizer::{PerformanceStatistics, Recommendation, StrategyOptimizer};
use crate::persistence::HistoryStore;
use crate::verification::{
    CacheStats, EnhancedVerificationResult, StrategyExecutor, Theorem, VerificationMethod,
    VerificationOptions, VerificationStrategy,
};

/// Verification and strategy learning behind one handle.
pub struct VerificationService {
    executor: StrategyExecutor,
    optimizer: StrategyOptimizer,
}

impl VerificationService {
    pub fn new(gateway: Arc<dyn ProverGateway>, config: ServiceConfig) -> Self {
        Self {
            executor: StrategyExecutor::with_config(gateway, config.executor),
            optimizer: StrategyOptimizer::new(config.optimizer),
        }
    }

    /// Persist the optimizer's history in `store`.
    pub fn with_history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.optimizer = self.optimizer.with_history_store(store);
        self
    }

    /// Load persisted history. Optional; the optimizer initializes on first use.
    pub async fn initialize(&self) -> usize {
        self.optimizer.initialize().await
    }

    pub fn executor(&self) -> &StrategyExecutor {
        &self.executor
    }

    pub fn optimizer(&self) -> &StrategyOptimizer {
        &self.optimizer
    }

    /// Verify a theorem with explicit options.
    pub async fn verify_theorem(
        &self,
        theorem: &Theorem,
        options: &VerificationOptions,
    ) -> Result<EnhancedVerificationResult> {
        self.executor.verify(theorem, options).await
    }

    pub async fn recommend_strategy(&self, theorem: &Theorem) -> Recommendation {
        self.optimizer.recommend(theorem).await
    }

    /// Feed a verification outcome back into the optimizer.
    pub async fn update_with_result(
        &self,
        theorem: &Theorem,
        strategy: VerificationStrategy,
        methods: &[VerificationMethod],
        result: &EnhancedVerificationResult,
    ) {
        self.optimizer.update(theorem, strategy, methods, result).await;
    }

    /// Fill the gaps in `base` from the optimizer's recommendation.
    ///
    /// Anything the caller set explicitly wins.
    pub async fn optimize_strategy(
        &self,
        theorem: &Theorem,
        base: &VerificationOptions,
    ) -> VerificationOptions {
        let recommendation = self.optimizer.recommend(theorem).await;
        let mut options = base.clone();

        options.strategy.get_or_insert(recommendation.strategy);
        options.level.get_or_insert(recommendation.level);
        if options.methods.is_none() {
            if options.preferred_method.is_none() {
                options.preferred_method = recommendation.methods.first().copied();
            }
            options.methods = Some(recommendation.methods);
        }

        options
    }

    /// Recommend, verify, and learn from the outcome in one call.
    #[instrument(skip(self, theorem, base), fields(theorem = %theorem.id))]
    pub async fn verify_adaptively(
        &self,
        theorem: &Theorem,
        base: &VerificationOptions,
    ) -> Result<EnhancedVerificationResult> {
        let options = self.optimize_strategy(theorem, base).await;
        let result = self.executor.verify(theorem, &options).await?;

        debug!(summary = %result.summary(), "Learning from adaptive verification");
        self.optimizer
            .update(
                theorem,
                result.execution.requested_strategy,
                &result.execution.attempted_methods,
                &result,
            )
            .await;
        Ok(result)
    }

    pub async fn performance_statistics(&self) -> PerformanceStatistics {
        self.optimizer.statistics().await
    }

    pub async fn improvement_recommendations(&self) -> Vec<String> {
        self.optimizer.improvement_recommendations().await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.executor.cache_stats().await
    }

    pub async fn clear_cache(&self) {
        self.executor.clear_cache().await;
    }

    /// Clear the result cache and all learned state.
    pub async fn reset(&self) {
        self.executor.clear_cache().await;
        self.optimizer.reset().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::domain::DomainCategory;
    use crate::error::Error;
    use crate::persistence::SqliteHistoryStore;
    use crate::test_support::ScriptedProver;
    use crate::verification::VerificationLevel;
    use pretty_assertions::assert_eq;

    fn service(prover: &Arc<ScriptedProver>) -> VerificationService {
        let config = ServiceConfig {
            optimizer: OptimizerConfig::default().with_exploration_rate(0.0),
            ..Default::default()
        };
        VerificationService::new(prover.clone(), config)
    }

    fn theorem() -> Theorem {
        Theorem::new("fx", "A devaluation improves the trade balance")
            .with_domain("international trade")
            .with_variable("e")
    }

    #[tokio::test]
    async fn test_verify_adaptively_closes_the_loop() {
        let prover = Arc::new(ScriptedProver::new().verifies(VerificationMethod::DirectProof, 0.9));
        let service = service(&prover);

        let result = service
            .verify_adaptively(&theorem(), &VerificationOptions::new())
            .await
            .unwrap();

        // complexity 0.1 -> SingleMethod at Basic, top-ranked method first.
        assert!(result.verified);
        assert_eq!(
            result.execution.requested_strategy,
            VerificationStrategy::SingleMethod
        );
        assert_eq!(result.execution.level, VerificationLevel::Basic);
        assert_eq!(result.primary_method, VerificationMethod::DirectProof);

        let optimizer = service.optimizer();
        let domain = DomainCategory::International;
        assert!(
            (optimizer
                .strategy_ranking(domain, VerificationStrategy::SingleMethod)
                .await
                - 0.59)
                .abs()
                < 1e-9
        );
        assert!(
            (optimizer
                .method_ranking(domain, VerificationMethod::DirectProof)
                .await
                - 0.59)
                .abs()
                < 1e-9
        );
        assert_eq!(service.performance_statistics().await.total_records, 1);
    }

    #[tokio::test]
    async fn test_optimize_strategy_keeps_caller_choices() {
        let prover = Arc::new(ScriptedProver::new());
        let service = service(&prover);

        let base = VerificationOptions::new()
            .with_strategy(VerificationStrategy::ParallelMethods)
            .with_time_limit_ms(500);
        let merged = service.optimize_strategy(&theorem(), &base).await;

        assert_eq!(merged.strategy, Some(VerificationStrategy::ParallelMethods));
        assert_eq!(merged.level, Some(VerificationLevel::Basic));
        assert_eq!(merged.time_limit_ms, Some(500));
        assert_eq!(merged.methods.as_ref().unwrap().len(), 3);
        assert_eq!(merged.preferred_method, Some(VerificationMethod::DirectProof));

        let pinned = VerificationOptions::new().with_methods(vec![VerificationMethod::Contradiction]);
        let merged = service.optimize_strategy(&theorem(), &pinned).await;
        assert_eq!(merged.methods, Some(vec![VerificationMethod::Contradiction]));
        assert_eq!(merged.preferred_method, None);
    }

    #[tokio::test]
    async fn test_structural_errors_propagate() {
        let prover = Arc::new(ScriptedProver::new());
        let service = service(&prover);

        let err = service
            .verify_theorem(&theorem(), &VerificationOptions::new().with_methods(Vec::new()))
            .await
            .unwrap_err();
        assert!(err.is_structural());
        assert!(matches!(err, Error::NoMethodsAvailable { .. }));
        assert_eq!(service.performance_statistics().await.total_records, 0);
    }

    #[tokio::test]
    async fn test_reset_clears_cache_and_learning() {
        let prover = Arc::new(ScriptedProver::new().verifies(VerificationMethod::DirectProof, 0.9));
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let service = service(&prover).with_history_store(store.clone());
        assert_eq!(service.initialize().await, 0);

        service
            .verify_adaptively(&theorem(), &VerificationOptions::new())
            .await
            .unwrap();
        assert_eq!(service.cache_stats().await.entry_count, 1);
        assert_eq!(store.count().unwrap(), 1);

        service.reset().await;

        assert_eq!(service.cache_stats().await.entry_count, 0);
        assert_eq!(service.performance_statistics().await.total_records, 0);
        assert_eq!(store.count().unwrap(), 0);
        assert!(service.improvement_recommendations().await.is_empty());
    }
}
