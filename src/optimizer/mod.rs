//! Strategy optimizer.
//!
//! Learns, per domain category, which strategies and methods tend to verify
//! theorems, and recommends verification options for new theorems:
//!
//! - **Exploration**: with probability `exploration_rate`, a uniformly random
//!   strategy, 1 to 3 random methods and a random level.
//! - **Exploitation**: the strategy with the best combined score (learned
//!   ranking, heuristic bonus, domain rule bonus, feature weight terms) and
//!   the three best-ranked methods for the domain.
//!
//! Every outcome fed back through [`StrategyOptimizer::update`] moves the
//! rankings of the strategy and methods used by one learning step.

pub mod history;
pub mod rankings;
pub mod stats;

pub use history::{PerformanceHistory, PerformanceRecord};
pub use rankings::{RankingEntry, RankingTable, INITIAL_SCORE};
pub use stats::{OutcomeStats, PerformanceStatistics};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::OptimizerConfig;
use crate::domain::DomainCategory;
use crate::persistence::HistoryStore;
use crate::scoring::{
    expected_confidence, feature_weight_term, heuristic_bonus, recommended_level, FeatureWeights,
    TheoremFeatures,
};
use crate::verification::{
    EnhancedVerificationResult, Theorem, VerificationLevel, VerificationMethod,
    VerificationOptions, VerificationStrategy,
};

/// Methods recommended on exploitation.
const RECOMMENDED_METHODS: usize = 3;

/// Lifecycle of a [`StrategyOptimizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerPhase {
    Uninitialized,
    /// Rankings seeded, persisted history loading.
    Initializing,
    Ready,
}

/// Recommended verification options for one theorem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub strategy: VerificationStrategy,
    pub methods: Vec<VerificationMethod>,
    pub level: VerificationLevel,
    /// Estimated confidence in [0, 1], from learned rankings.
    pub expected_confidence: f64,
    pub rationale: String,
    /// True when produced by the random exploration branch.
    pub explored: bool,
    pub domain: DomainCategory,
    pub features: TheoremFeatures,
}

impl Recommendation {
    /// Verification options carrying this recommendation.
    pub fn to_options(&self) -> VerificationOptions {
        let mut options = VerificationOptions::new()
            .with_strategy(self.strategy)
            .with_level(self.level)
            .with_methods(self.methods.clone());
        options.preferred_method = self.methods.first().copied();
        options
    }
}

#[derive(Debug, Clone)]
struct OptimizerState {
    phase: OptimizerPhase,
    history: PerformanceHistory,
    rankings: RankingTable,
    weights: FeatureWeights,
}

impl OptimizerState {
    fn new(config: &OptimizerConfig, phase: OptimizerPhase) -> Self {
        Self {
            phase,
            history: PerformanceHistory::new(config.max_history_size),
            rankings: RankingTable::default(),
            weights: FeatureWeights::from_map(&config.feature_weights),
        }
    }
}

/// Learns strategy and method rankings from verification outcomes.
pub struct StrategyOptimizer {
    config: OptimizerConfig,
    state: RwLock<OptimizerState>,
    /// Set once persisted history has been loaded and replayed.
    ready: OnceCell<()>,
    rng: Mutex<StdRng>,
    store: Option<Arc<dyn HistoryStore>>,
    /// Generation of the latest history snapshot, bumped under the state lock.
    snapshot_generation: AtomicU64,
    /// Generation of the latest snapshot committed to the store.
    committed_generation: Arc<Mutex<u64>>,
}

impl StrategyOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            state: RwLock::new(OptimizerState::new(&config, OptimizerPhase::Uninitialized)),
            ready: OnceCell::new(),
            rng: Mutex::new(rng),
            store: None,
            snapshot_generation: AtomicU64::new(0),
            committed_generation: Arc::new(Mutex::new(0)),
            config,
        }
    }

    /// Load history from, and save it to, `store`.
    pub fn with_history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub async fn phase(&self) -> OptimizerPhase {
        self.state.read().await.phase
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        // The RNG holds no invariant a panicking holder could break.
        self.rng.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed the rankings, load persisted history and replay it.
    ///
    /// Returns the number of records loaded. Only the first call does any
    /// work; concurrent callers wait for it to finish and later calls
    /// return 0.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> usize {
        let mut loaded = None;
        let slot = &mut loaded;
        self.ready
            .get_or_init(|| async move {
                *slot = Some(self.load_and_replay().await);
            })
            .await;
        loaded.unwrap_or(0)
    }

    async fn load_and_replay(&self) -> usize {
        *self.state.write().await = OptimizerState::new(&self.config, OptimizerPhase::Initializing);

        let loaded = self.load_history().await;
        let count = loaded.len();

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        for record in loaded {
            state.rankings[record.theorem_category].learn(
                record.strategy,
                &record.methods,
                self.config.learning_rate,
                record.success,
                record.confidence,
            );
            state.history.push(record);
        }
        state.phase = OptimizerPhase::Ready;

        info!(
            loaded = count,
            retained = state.history.len(),
            "Strategy optimizer ready"
        );
        count
    }

    /// Wait until persisted history has been replayed.
    async fn ensure_ready(&self) {
        self.ready
            .get_or_init(|| async {
                self.load_and_replay().await;
            })
            .await;
    }

    /// Recommend verification options for a theorem.
    #[instrument(skip(self, theorem), fields(theorem = %theorem.id))]
    pub async fn recommend(&self, theorem: &Theorem) -> Recommendation {
        self.ensure_ready().await;

        let features = TheoremFeatures::extract(theorem);
        let state = self.state.read().await;
        let recommendation = self.choose(&state, features);

        debug!(
            domain = %recommendation.domain,
            strategy = %recommendation.strategy,
            level = %recommendation.level,
            explored = recommendation.explored,
            expected_confidence = recommendation.expected_confidence,
            "Recommended verification options"
        );
        recommendation
    }

    fn choose(&self, state: &OptimizerState, features: TheoremFeatures) -> Recommendation {
        let domain = features.domain;
        let entry = &state.rankings[domain];
        let mut rng = self.rng();

        let explore = self.config.exploration_rate > 0.0
            && rng.gen::<f64>() < self.config.exploration_rate;

        let (strategy, methods, level, rationale) = if explore {
            let strategy =
                VerificationStrategy::ALL[rng.gen_range(0..VerificationStrategy::ALL.len())];
            let count = rng.gen_range(1..=RECOMMENDED_METHODS);
            let methods: Vec<VerificationMethod> = VerificationMethod::ALL
                .choose_multiple(&mut *rng, count)
                .copied()
                .collect();
            let level = VerificationLevel::ALL[rng.gen_range(0..VerificationLevel::ALL.len())];
            let rationale = format!(
                "Exploring: random strategy, {} random method(s) and random level",
                count
            );
            (strategy, methods, level, rationale)
        } else {
            let mut best = VerificationStrategy::ALL[0];
            let mut best_score = self.strategy_score(state, best, &features);
            for strategy in VerificationStrategy::ALL.into_iter().skip(1) {
                let score = self.strategy_score(state, strategy, &features);
                if score > best_score {
                    best = strategy;
                    best_score = score;
                }
            }

            let level = self
                .config
                .domain_specific_rules
                .get(&domain)
                .and_then(|rule| rule.level)
                .unwrap_or_else(|| recommended_level(features.complexity));
            let rationale = format!(
                "{} scored {:.2} for {} theorems (complexity {:.2}, formal {:.2}, empirical {:.2})",
                best,
                best_score,
                domain,
                features.complexity,
                features.formal_nature,
                features.empirical_nature
            );
            (best, entry.top_methods(RECOMMENDED_METHODS), level, rationale)
        };

        let method_scores: Vec<f64> = methods.iter().map(|m| entry.method_score(*m)).collect();

        Recommendation {
            expected_confidence: expected_confidence(entry.strategy_score(strategy), &method_scores),
            strategy,
            methods,
            level,
            rationale,
            explored: explore,
            domain,
            features,
        }
    }

    /// Combined exploitation score of a strategy for a theorem.
    fn strategy_score(
        &self,
        state: &OptimizerState,
        strategy: VerificationStrategy,
        features: &TheoremFeatures,
    ) -> f64 {
        let rule_bonus = match self.config.domain_specific_rules.get(&features.domain) {
            Some(rule) if rule.preferred_strategy == Some(strategy) => rule.strategy_bonus,
            _ => 0.0,
        };

        state.rankings[features.domain].strategy_score(strategy)
            + heuristic_bonus(strategy, features)
            + rule_bonus
            + feature_weight_term(strategy, features, &state.weights)
    }

    /// Learn from a composite verification result.
    pub async fn update(
        &self,
        theorem: &Theorem,
        strategy: VerificationStrategy,
        methods: &[VerificationMethod],
        result: &EnhancedVerificationResult,
    ) {
        self.record_outcome(
            theorem,
            strategy,
            methods,
            result.verified,
            result.confidence,
            result.execution.total_duration_ms,
        )
        .await;
    }

    /// Learn from a raw outcome.
    #[instrument(skip(self, theorem, strategy, methods), fields(theorem = %theorem.id, strategy = %strategy))]
    pub async fn record_outcome(
        &self,
        theorem: &Theorem,
        strategy: VerificationStrategy,
        methods: &[VerificationMethod],
        success: bool,
        confidence: f64,
        duration_ms: u64,
    ) {
        self.ensure_ready().await;

        let features = TheoremFeatures::extract(theorem);
        let domain = features.domain;
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        let record = PerformanceRecord::new(domain, strategy, methods.to_vec(), success, confidence)
            .with_domain(theorem.domain.clone())
            .with_duration(duration_ms);

        let snapshot = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;

            let entry = &mut state.rankings[domain];
            entry.learn(strategy, methods, self.config.learning_rate, success, confidence);
            debug!(
                domain = %domain,
                success,
                confidence,
                strategy_score = entry.strategy_score(strategy),
                "Updated rankings"
            );

            if self.config.enable_continual_learning {
                state.weights.nudge(&features, success, confidence);
            }

            if let Some(evicted) = state.history.push(record) {
                debug!(evicted_at = %evicted.timestamp, "Evicted oldest performance record");
            }

            self.store
                .as_ref()
                .map(|_| (self.next_generation(), state.history.to_vec()))
        };

        if let Some((generation, records)) = snapshot {
            self.save_history(generation, records).await;
        }
    }

    async fn load_history(&self) -> Vec<PerformanceRecord> {
        let Some(store) = self.store.clone() else {
            return Vec::new();
        };

        match tokio::task::spawn_blocking(move || store.load_history()).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to load performance history, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "History load task failed, starting empty");
                Vec::new()
            }
        }
    }

    /// Must be called while holding the state write lock, so generations
    /// follow snapshot order.
    fn next_generation(&self) -> u64 {
        self.snapshot_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Save a history snapshot unless a newer one is already committed.
    ///
    /// The blocking task runs to completion even if the caller stops waiting.
    async fn save_history(&self, generation: u64, records: Vec<PerformanceRecord>) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let committed = Arc::clone(&self.committed_generation);

        let task = tokio::task::spawn_blocking(move || -> crate::error::Result<bool> {
            // Held across the write so commits are serialized.
            let mut last = committed.lock().unwrap_or_else(|e| e.into_inner());
            if *last >= generation {
                return Ok(false);
            }
            store.save_history(&records)?;
            *last = generation;
            Ok(true)
        });

        match task.await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => debug!(generation, "Skipped stale history snapshot"),
            Ok(Err(e)) => warn!(error = %e, "Failed to save performance history"),
            Err(e) => warn!(error = %e, "History save task failed"),
        }
    }

    /// Warm-start a strategy ranking (clamped to [0, 1]).
    pub async fn set_strategy_ranking(
        &self,
        domain: DomainCategory,
        strategy: VerificationStrategy,
        score: f64,
    ) {
        self.ensure_ready().await;
        self.state.write().await.rankings[domain].set_strategy_score(strategy, score);
    }

    /// Warm-start a method ranking (clamped to [0, 1]).
    pub async fn set_method_ranking(
        &self,
        domain: DomainCategory,
        method: VerificationMethod,
        score: f64,
    ) {
        self.ensure_ready().await;
        self.state.write().await.rankings[domain].set_method_score(method, score);
    }

    pub async fn strategy_ranking(
        &self,
        domain: DomainCategory,
        strategy: VerificationStrategy,
    ) -> f64 {
        self.state.read().await.rankings[domain].strategy_score(strategy)
    }

    pub async fn method_ranking(&self, domain: DomainCategory, method: VerificationMethod) -> f64 {
        self.state.read().await.rankings[domain].method_score(method)
    }

    /// Snapshot of every ranking.
    pub async fn rankings(&self) -> RankingTable {
        self.state.read().await.rankings.clone()
    }

    pub async fn feature_weights(&self) -> FeatureWeights {
        self.state.read().await.weights
    }

    /// Retained records, oldest first.
    pub async fn history(&self) -> Vec<PerformanceRecord> {
        self.state.read().await.history.to_vec()
    }

    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }

    /// Statistics over the retained history.
    pub async fn statistics(&self) -> PerformanceStatistics {
        PerformanceStatistics::from_records(self.state.read().await.history.iter())
    }

    /// Advisory text for weak domains and methods.
    pub async fn improvement_recommendations(&self) -> Vec<String> {
        let state = self.state.read().await;
        PerformanceStatistics::from_records(state.history.iter())
            .improvement_recommendations(&state.rankings)
    }

    /// Clear history, rankings and learned weights, leaving the optimizer ready.
    pub async fn reset(&self) {
        self.ensure_ready().await;

        let generation = {
            let mut state = self.state.write().await;
            *state = OptimizerState::new(&self.config, OptimizerPhase::Ready);
            self.next_generation()
        };
        info!("Strategy optimizer reset");

        if self.store.is_some() {
            self.save_history(generation, Vec::new()).await;
        }
    }
}
