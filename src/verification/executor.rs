//! Strategy execution.
//!
//! The executor turns one verification request into prover gateway calls
//! according to the requested strategy, then folds the per-method outcomes
//! into an [`EnhancedVerificationResult`]. Individual method failures never
//! abort a call; only an empty candidate list does.

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::assembler::ProofAssembler;
use super::cache::{CacheKey, CacheStats, ResultCache};
use super::sensitivity::SensitivityAnalyzer;
use super::types::{
    EnhancedVerificationResult, ExecutionProcess, MethodResult, SensitivityAnalysis, Theorem,
    VerificationLevel, VerificationMethod, VerificationOptions, VerificationStrategy,
};
use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::gateway::{dispatch, ProverGateway, ProverRequest};
use crate::scoring::{
    adaptive_delegate, cross_validation_score, heuristic_method, most_successful, select_primary,
    TheoremFeatures,
};

/// Cross-validation agreement below which a result is flagged.
const WEAK_AGREEMENT: f64 = 0.7;

/// Method outcomes of one strategy run, before aggregation.
struct StrategyRun {
    strategy: VerificationStrategy,
    candidates: Vec<VerificationMethod>,
    results: Vec<MethodResult>,
}

/// Dispatches verification strategies against a prover gateway.
pub struct StrategyExecutor {
    gateway: Arc<dyn ProverGateway>,
    cache: ResultCache,
    assembler: ProofAssembler,
    analyzer: SensitivityAnalyzer,
    semaphore: Arc<Semaphore>,
    config: ExecutorConfig,
}

impl StrategyExecutor {
    /// Create an executor with default configuration.
    pub fn new(gateway: Arc<dyn ProverGateway>) -> Self {
        Self::with_config(gateway, ExecutorConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn ProverGateway>, config: ExecutorConfig) -> Self {
        let mut cache = ResultCache::new().with_max_entries(config.cache_max_entries);
        if let Some(ttl) = config.cache_ttl() {
            cache = cache.with_ttl(ttl);
        }

        Self {
            analyzer: SensitivityAnalyzer::new(Arc::clone(&gateway)),
            gateway,
            cache,
            assembler: ProofAssembler::new(),
            semaphore: Arc::new(Semaphore::new(config.max_parallel.max(1))),
            config,
        }
    }

    /// Replace the proof assembler.
    pub fn with_assembler(mut self, assembler: ProofAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Verify a theorem.
    ///
    /// Fails only with [`Error::NoMethodsAvailable`]; everything else is
    /// reported inside the result.
    #[instrument(skip(self, theorem, options), fields(theorem = %theorem.id))]
    pub async fn verify(
        &self,
        theorem: &Theorem,
        options: &VerificationOptions,
    ) -> Result<EnhancedVerificationResult> {
        let strategy = options.strategy.unwrap_or(self.config.default_strategy);
        let level = options.level.unwrap_or(self.config.default_level);

        if options.methods.as_ref().is_some_and(|m| m.is_empty()) {
            return Err(Error::no_methods(strategy, level));
        }

        let cacheable = options.use_cache && options.time_limit_ms.is_none();
        let key = CacheKey::generate(theorem, strategy, level);
        if cacheable {
            if let Some(hit) = self.cache.get(&key).await {
                debug!(key = %key, "Serving cached verification result");
                return Ok(hit);
            }
        } else {
            debug!("Bypassing result cache");
            self.cache.record_bypass().await;
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let features = TheoremFeatures::extract(theorem);
        let shared = Arc::new(theorem.clone());

        let run = match strategy {
            VerificationStrategy::AdaptiveStrategy => {
                let (delegate, method) = adaptive_delegate(&features);
                info!(
                    complexity = features.complexity,
                    empirical = features.empirical_nature,
                    delegate = %delegate,
                    "Adaptive strategy delegating"
                );
                self.run_strategy(&shared, delegate, method, level, options, &features)
                    .await?
            }
            other => {
                self.run_strategy(&shared, other, None, level, options, &features)
                    .await?
            }
        };

        let result = self
            .aggregate(theorem, strategy, level, options, run, started_at, start)
            .await?;
        info!(summary = %result.summary(), "Verification completed");

        if cacheable {
            self.cache.insert(key, result.clone()).await;
        }
        Ok(result)
    }

    /// Candidate methods for a level, in attempt order.
    pub fn candidates(
        &self,
        options: &VerificationOptions,
        level: VerificationLevel,
    ) -> Vec<VerificationMethod> {
        let preference = options
            .methods
            .clone()
            .unwrap_or_else(|| VerificationMethod::DEFAULT_PREFERENCE.to_vec());

        let mut candidates = Vec::with_capacity(preference.len());
        for method in preference {
            if !candidates.contains(&method) {
                candidates.push(method);
            }
        }
        candidates.truncate(level.candidate_count());
        candidates
    }

    async fn run_strategy(
        &self,
        theorem: &Arc<Theorem>,
        strategy: VerificationStrategy,
        forced_method: Option<VerificationMethod>,
        level: VerificationLevel,
        options: &VerificationOptions,
        features: &TheoremFeatures,
    ) -> Result<StrategyRun> {
        let candidates = match strategy {
            VerificationStrategy::SingleMethod => {
                let method = forced_method
                    .or(options.preferred_method)
                    .or_else(|| options.methods.as_ref().and_then(|m| m.first().copied()))
                    .unwrap_or_else(|| heuristic_method(features));
                vec![method]
            }
            _ => self.candidates(options, level),
        };
        if candidates.is_empty() {
            return Err(Error::no_methods(strategy, level));
        }

        let results = match strategy {
            VerificationStrategy::ParallelMethods => {
                self.run_parallel(theorem, &candidates, options).await
            }
            VerificationStrategy::SequentialMethods => {
                self.run_sequential(theorem, &candidates, level, options).await
            }
            _ => vec![self.call(theorem, candidates[0], options).await],
        };

        Ok(StrategyRun {
            strategy,
            candidates,
            results,
        })
    }

    async fn run_sequential(
        &self,
        theorem: &Arc<Theorem>,
        candidates: &[VerificationMethod],
        level: VerificationLevel,
        options: &VerificationOptions,
    ) -> Vec<MethodResult> {
        let mut results = Vec::with_capacity(candidates.len());
        for &method in candidates {
            let result = self.call(theorem, method, options).await;
            let succeeded = result.succeeded();
            results.push(result);

            if succeeded && level != VerificationLevel::Exhaustive {
                debug!(method = %method, "Sequential run stopping at first success");
                break;
            }
        }
        results
    }

    async fn run_parallel(
        &self,
        theorem: &Arc<Theorem>,
        candidates: &[VerificationMethod],
        options: &VerificationOptions,
    ) -> Vec<MethodResult> {
        let tasks = candidates.iter().map(|&method| {
            let semaphore = Arc::clone(&self.semaphore);
            async move {
                // The semaphore is never closed; without a permit the call still runs.
                let _permit = semaphore.acquire_owned().await.ok();
                self.call(theorem, method, options).await
            }
        });

        // Wait for every task to settle; no early abort.
        join_all(tasks).await
    }

    async fn call(
        &self,
        theorem: &Arc<Theorem>,
        method: VerificationMethod,
        options: &VerificationOptions,
    ) -> MethodResult {
        let request = ProverRequest::new(method)
            .with_time_limit_ms(options.time_limit_ms)
            .with_cache(options.use_cache)
            .with_counter_examples(options.generate_counter_examples);

        debug!(method = %method, "Dispatching prover call");
        let result = dispatch(Arc::clone(&self.gateway), Arc::clone(theorem), request).await;
        debug!(
            method = %method,
            verified = result.verified,
            confidence = result.confidence,
            error = result.error.as_deref().unwrap_or(""),
            "Prover call settled"
        );
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn aggregate(
        &self,
        theorem: &Theorem,
        requested: VerificationStrategy,
        level: VerificationLevel,
        options: &VerificationOptions,
        run: StrategyRun,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
    ) -> Result<EnhancedVerificationResult> {
        let StrategyRun {
            strategy,
            candidates,
            results,
        } = run;

        let primary_method =
            select_primary(&results, &candidates).ok_or_else(|| Error::no_methods(strategy, level))?;
        let confidence = results
            .iter()
            .find(|r| r.method == primary_method)
            .map(|r| r.confidence)
            .unwrap_or(0.0);

        let attempted: Vec<VerificationMethod> = results.iter().map(|r| r.method).collect();
        let (succeeded, failed): (Vec<&MethodResult>, Vec<&MethodResult>) =
            results.iter().partition(|r| r.succeeded());
        let successful_methods: Vec<VerificationMethod> =
            succeeded.iter().map(|r| r.method).collect();
        let failed_methods: Vec<VerificationMethod> = failed.iter().map(|r| r.method).collect();
        let verified = !successful_methods.is_empty();

        let cross_validation_score = cross_validation_score(&results);

        let composite_proof = if verified {
            let verified_results: Vec<MethodResult> =
                succeeded.iter().map(|r| (*r).clone()).collect();
            Some(self.assembler.assemble(&verified_results, theorem))
        } else {
            None
        };

        let mut sensitivity_duration_ms = None;
        let sensitivity_analysis = match most_successful(&results) {
            Some(best)
                if self.config.enable_sensitivity_analysis
                    && options.sensitivity_analysis
                    && level.runs_sensitivity_analysis()
                    && !theorem.assumptions.is_empty() =>
            {
                let s = Instant::now();
                let analysis = self
                    .analyzer
                    .analyze(theorem, best, options.time_limit_ms)
                    .await;
                sensitivity_duration_ms = Some(s.elapsed().as_millis() as u64);
                Some(analysis)
            }
            _ => None,
        };

        let method_durations_ms: BTreeMap<VerificationMethod, u64> =
            results.iter().map(|r| (r.method, r.duration_ms)).collect();

        let mut result = EnhancedVerificationResult {
            id: Uuid::new_v4(),
            theorem_id: theorem.id.clone(),
            verified,
            confidence,
            primary_method,
            secondary_methods: attempted
                .iter()
                .copied()
                .filter(|m| *m != primary_method)
                .collect(),
            cross_validated: cross_validation_score.is_some(),
            cross_validation_score,
            sensitivity_analysis,
            composite_proof,
            execution: ExecutionProcess {
                requested_strategy: requested,
                effective_strategy: strategy,
                level,
                attempted_methods: attempted,
                successful_methods,
                failed_methods,
                method_durations_ms,
                total_duration_ms: start.elapsed().as_millis() as u64,
                sensitivity_duration_ms,
                started_at,
            },
            method_results: results,
            recommendations: Vec::new(),
        };

        if self.config.generate_recommendations {
            result.recommendations = recommendations(&result);
        }
        Ok(result)
    }
}

/// Advisory follow-ups for a composite result.
fn recommendations(result: &EnhancedVerificationResult) -> Vec<String> {
    let mut advice = Vec::new();
    let execution = &result.execution;
    let join = |methods: &[VerificationMethod]| {
        methods
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    if !result.verified {
        if let Some(next) = execution.level.next() {
            advice.push(format!(
                "No method verified the theorem; escalate to the {} level",
                next
            ));
        }
        let untried: Vec<VerificationMethod> = VerificationMethod::ALL
            .into_iter()
            .filter(|m| !execution.attempted_methods.contains(m))
            .collect();
        if !untried.is_empty() {
            advice.push(format!("Try untried methods: {}", join(&untried)));
        }
    } else if execution.successful_methods.len() == 1
        && execution.level != VerificationLevel::Exhaustive
    {
        advice.push(format!(
            "Only {} verified the theorem; run {} for cross-validation",
            result.primary_method,
            VerificationStrategy::ParallelMethods
        ));
    }

    if let Some(score) = result.cross_validation_score {
        if score < WEAK_AGREEMENT {
            advice.push(format!(
                "Weak cross-validation agreement ({:.2}); review method limitations",
                score
            ));
        }
    }

    if let Some(SensitivityAnalysis {
        critical_assumptions,
        ..
    }) = &result.sensitivity_analysis
    {
        if !critical_assumptions.is_empty() {
            advice.push(format!(
                "Conclusion depends critically on: {}",
                critical_assumptions.join(", ")
            ));
        }
    }

    let errored: Vec<VerificationMethod> = result
        .method_results
        .iter()
        .filter(|r| r.error.is_some())
        .map(|r| r.method)
        .collect();
    if !errored.is_empty() {
        advice.push(format!("Prover errors for: {}", join(&errored)));
    }

    advice
}
