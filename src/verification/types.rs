//! Type definitions for theorem verification.
//!
//! This module defines the theorem model handed to the prover gateway,
//! the per-method results it returns, and the composite result the
//! strategy executor builds from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// An economic theorem submitted for verification.
///
/// Immutable for the duration of a verification call; the executor only
/// ever derives modified copies (for sensitivity probes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theorem {
    /// Stable identity, used as the cache key component.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Free-form domain tag ("monetary policy", "international trade", ...).
    #[serde(default)]
    pub domain: String,
    /// Natural-language statement.
    pub statement: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// Optional formal rendering of the statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formal_representation: Option<String>,
}

impl Theorem {
    /// Create a theorem with an id and statement.
    pub fn new(id: impl Into<String>, statement: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            domain: String::new(),
            statement: statement.into(),
            variables: Vec::new(),
            constraints: Vec::new(),
            assumptions: Vec::new(),
            formal_representation: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variables.push(variable.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_assumption(mut self, assumption: impl Into<String>) -> Self {
        self.assumptions.push(assumption.into());
        self
    }

    pub fn with_formal_representation(mut self, formal: impl Into<String>) -> Self {
        self.formal_representation = Some(formal.into());
        self
    }

    /// Copy of this theorem with the assumption at `index` removed.
    ///
    /// The probe gets its own id so identity-keyed gateways never confuse it
    /// with the original theorem.
    pub fn without_assumption(&self, index: usize) -> Self {
        let mut probe = self.clone();
        if index < probe.assumptions.len() {
            probe.assumptions.remove(index);
        }
        probe.id = format!("{}#without-{}", self.id, index);
        probe
    }
}

/// Verification technique. A capability tag routed to the prover gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Forward derivation from assumptions.
    DirectProof,
    /// Derive a contradiction from the negated claim.
    Contradiction,
    /// Exhaustive exploration of a bounded model.
    ModelChecking,
    /// Consistency with historical data.
    HistoricalEvidence,
    /// Mixed formal and empirical reasoning.
    HybridApproach,
}

impl VerificationMethod {
    /// All methods, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::DirectProof,
        Self::Contradiction,
        Self::ModelChecking,
        Self::HistoricalEvidence,
        Self::HybridApproach,
    ];

    /// Candidate order used when the caller does not supply one.
    pub const DEFAULT_PREFERENCE: [Self; 5] = [
        Self::DirectProof,
        Self::ModelChecking,
        Self::HistoricalEvidence,
        Self::Contradiction,
        Self::HybridApproach,
    ];

    /// Position in [`Self::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectProof => "direct_proof",
            Self::Contradiction => "contradiction",
            Self::ModelChecking => "model_checking",
            Self::HistoricalEvidence => "historical_evidence",
            Self::HybridApproach => "hybrid_approach",
        }
    }

    /// Parse the snake_case name produced by [`Self::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl std::fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How method attempts are dispatched for one verification call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStrategy {
    /// One method, explicit or heuristically picked.
    SingleMethod,
    /// Candidates in order, stopping at the first success below Exhaustive.
    SequentialMethods,
    /// All candidates concurrently, no early abort.
    ParallelMethods,
    /// Classify the theorem, then delegate to one of the above.
    AdaptiveStrategy,
}

impl VerificationStrategy {
    /// All strategies, in declaration order (also the arg-max tie-break order).
    pub const ALL: [Self; 4] = [
        Self::SingleMethod,
        Self::SequentialMethods,
        Self::ParallelMethods,
        Self::AdaptiveStrategy,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleMethod => "single_method",
            Self::SequentialMethods => "sequential_methods",
            Self::ParallelMethods => "parallel_methods",
            Self::AdaptiveStrategy => "adaptive_strategy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }
}

impl std::fmt::Display for VerificationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verification effort level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    Basic,
    Standard,
    Rigorous,
    Exhaustive,
}

impl VerificationLevel {
    pub const ALL: [Self; 4] = [Self::Basic, Self::Standard, Self::Rigorous, Self::Exhaustive];

    /// Number of candidate methods attempted at this level.
    pub fn candidate_count(self) -> usize {
        match self {
            Self::Basic => 1,
            Self::Standard => 3,
            Self::Rigorous => 5,
            Self::Exhaustive => usize::MAX,
        }
    }

    /// The next, more thorough level.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Basic => Some(Self::Standard),
            Self::Standard => Some(Self::Rigorous),
            Self::Rigorous => Some(Self::Exhaustive),
            Self::Exhaustive => None,
        }
    }

    /// Whether leave-one-out sensitivity analysis runs at this level.
    pub fn runs_sensitivity_analysis(self) -> bool {
        matches!(self, Self::Rigorous | Self::Exhaustive)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Rigorous => "rigorous",
            Self::Exhaustive => "exhaustive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

impl std::fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of a proof. Steps reference each other by conclusion text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub id: String,
    /// Conclusions this step depends on.
    #[serde(default)]
    pub premises: Vec<String>,
    pub conclusion: String,
    #[serde(default)]
    pub description: String,
}

impl ProofStep {
    pub fn new(
        id: impl Into<String>,
        conclusion: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            premises: Vec::new(),
            conclusion: conclusion.into(),
            description: description.into(),
        }
    }

    pub fn with_premise(mut self, premise: impl Into<String>) -> Self {
        self.premises.push(premise.into());
        self
    }
}

/// A concrete assignment under which the theorem fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterExample {
    pub description: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    /// Method that produced it (filled in by the assembler).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_method: Option<VerificationMethod>,
}

impl CounterExample {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            values: BTreeMap::new(),
            source_method: None,
        }
    }

    pub fn with_value(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(variable.into(), value.into());
        self
    }
}

/// Outcome of one prover gateway call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub method: VerificationMethod,
    pub verified: bool,
    /// Confidence in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub proof_steps: Vec<ProofStep>,
    #[serde(default)]
    pub counter_examples: Vec<CounterExample>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub duration_ms: u64,
    /// Set when the call errored rather than returned a negative verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MethodResult {
    /// A positive verdict.
    pub fn verified(method: VerificationMethod, confidence: f64) -> Self {
        Self::new(method, true, confidence)
    }

    /// A negative verdict (the method ran but could not verify).
    pub fn refuted(method: VerificationMethod, confidence: f64) -> Self {
        Self::new(method, false, confidence)
    }

    /// A call that errored before producing a verdict.
    pub fn errored(method: VerificationMethod, message: impl Into<String>) -> Self {
        let mut result = Self::new(method, false, 0.0);
        result.error = Some(message.into());
        result
    }

    fn new(method: VerificationMethod, verified: bool, confidence: f64) -> Self {
        Self {
            method,
            verified,
            confidence: confidence.clamp(0.0, 1.0),
            proof_steps: Vec::new(),
            counter_examples: Vec::new(),
            limitations: Vec::new(),
            duration_ms: 0,
            error: None,
        }
    }

    pub fn with_step(mut self, step: ProofStep) -> Self {
        self.proof_steps.push(step);
        self
    }

    pub fn with_counter_example(mut self, counter_example: CounterExample) -> Self {
        self.counter_examples.push(counter_example);
        self
    }

    pub fn with_limitation(mut self, limitation: impl Into<String>) -> Self {
        self.limitations.push(limitation.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Whether this attempt counts as a success.
    pub fn succeeded(&self) -> bool {
        self.verified && self.error.is_none()
    }

    /// Enforce result invariants on gateway output.
    ///
    /// Confidence is clamped to [0, 1] (NaN becomes 0) and an errored
    /// result is never verified.
    pub fn normalized(mut self, expected: VerificationMethod) -> Self {
        self.method = expected;
        self.confidence = if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        };
        if self.error.is_some() {
            self.verified = false;
        }
        self
    }
}

/// Caller options for one verification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOptions {
    /// Dispatch strategy (executor default when unset).
    #[serde(default)]
    pub strategy: Option<VerificationStrategy>,
    /// Effort level (executor default when unset).
    #[serde(default)]
    pub level: Option<VerificationLevel>,
    /// Candidate method order, replacing the default preference order.
    #[serde(default)]
    pub methods: Option<Vec<VerificationMethod>>,
    /// Explicit method for SingleMethod.
    #[serde(default)]
    pub preferred_method: Option<VerificationMethod>,
    /// Advisory per-call time limit forwarded to the gateway. Bypasses the cache.
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_true")]
    pub generate_counter_examples: bool,
    /// Run sensitivity analysis at Rigorous/Exhaustive levels.
    #[serde(default = "default_true")]
    pub sensitivity_analysis: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            strategy: None,
            level: None,
            methods: None,
            preferred_method: None,
            time_limit_ms: None,
            use_cache: true,
            generate_counter_examples: true,
            sensitivity_analysis: true,
        }
    }
}

impl VerificationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: VerificationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_level(mut self, level: VerificationLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_methods(mut self, methods: Vec<VerificationMethod>) -> Self {
        self.methods = Some(methods);
        self
    }

    pub fn with_preferred_method(mut self, method: VerificationMethod) -> Self {
        self.preferred_method = Some(method);
        self
    }

    pub fn with_time_limit_ms(mut self, time_limit_ms: u64) -> Self {
        self.time_limit_ms = Some(time_limit_ms);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_sensitivity_analysis(mut self, enabled: bool) -> Self {
        self.sensitivity_analysis = enabled;
        self
    }
}

/// Bookkeeping for how a composite result was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionProcess {
    /// Strategy the caller asked for.
    pub requested_strategy: VerificationStrategy,
    /// Strategy that actually dispatched (differs only for AdaptiveStrategy).
    pub effective_strategy: VerificationStrategy,
    pub level: VerificationLevel,
    /// Methods called, in attempt order.
    pub attempted_methods: Vec<VerificationMethod>,
    pub successful_methods: Vec<VerificationMethod>,
    pub failed_methods: Vec<VerificationMethod>,
    pub method_durations_ms: BTreeMap<VerificationMethod, u64>,
    pub total_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_duration_ms: Option<u64>,
    pub started_at: DateTime<Utc>,
}

/// Confidence impact of removing one assumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSensitivity {
    pub assumption: String,
    pub confidence_without: f64,
    /// Absolute confidence change against the baseline.
    pub delta: f64,
    pub critical: bool,
}

/// Leave-one-out assumption analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityAnalysis {
    /// Method re-run for every probe.
    pub method: VerificationMethod,
    pub baseline_confidence: f64,
    pub assumptions: Vec<AssumptionSensitivity>,
    pub critical_assumptions: Vec<String>,
    /// Assumptions whose re-check errored and was skipped.
    pub skipped_assumptions: Vec<String>,
    pub stability_score: f64,
    pub robust: bool,
    /// True when at least one probe was skipped.
    pub partial: bool,
}

/// Merged, ordered proof assembled from several method results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositeProof {
    pub steps: Vec<ProofStep>,
    /// Length of the trailing block of steps whose premises never resolved.
    pub unresolved_steps: usize,
    pub counter_examples: Vec<CounterExample>,
    pub limitations: Vec<String>,
    pub applicability_conditions: Vec<String>,
}

impl CompositeProof {
    /// Steps in dependency order.
    pub fn resolved(&self) -> &[ProofStep] {
        &self.steps[..self.split()]
    }

    /// Steps with cyclic or dangling premises, in original order.
    pub fn unresolved(&self) -> &[ProofStep] {
        &self.steps[self.split()..]
    }

    // Tolerates an `unresolved_steps` larger than the step count.
    fn split(&self) -> usize {
        self.steps.len().saturating_sub(self.unresolved_steps)
    }
}

/// Composite verification judgment. Immutable once built; cacheable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedVerificationResult {
    pub id: Uuid,
    pub theorem_id: String,
    pub verified: bool,
    pub confidence: f64,
    pub primary_method: VerificationMethod,
    pub secondary_methods: Vec<VerificationMethod>,
    /// Per-method results, in attempt order.
    pub method_results: Vec<MethodResult>,
    pub cross_validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_validation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_analysis: Option<SensitivityAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_proof: Option<CompositeProof>,
    pub execution: ExecutionProcess,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl EnhancedVerificationResult {
    /// Result for a specific method, if it was attempted.
    pub fn method_result(&self, method: VerificationMethod) -> Option<&MethodResult> {
        self.method_results.iter().find(|r| r.method == method)
    }

    /// Short one-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} via {} ({:.0}% confidence, {}/{} methods succeeded)",
            if self.verified { "verified" } else { "unverified" },
            self.primary_method,
            self.confidence * 100.0,
            self.execution.successful_methods.len(),
            self.execution.attempted_methods.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_candidate_counts() {
        assert_eq!(VerificationLevel::Basic.candidate_count(), 1);
        assert_eq!(VerificationLevel::Standard.candidate_count(), 3);
        assert_eq!(VerificationLevel::Rigorous.candidate_count(), 5);
        assert!(VerificationLevel::Exhaustive.candidate_count() >= VerificationMethod::ALL.len());

        assert!(!VerificationLevel::Standard.runs_sensitivity_analysis());
        assert!(VerificationLevel::Rigorous.runs_sensitivity_analysis());
        assert!(VerificationLevel::Exhaustive.runs_sensitivity_analysis());
    }

    #[test]
    fn test_enum_names_roundtrip_through_parse() {
        for method in VerificationMethod::ALL {
            assert_eq!(VerificationMethod::parse(method.as_str()), Some(method));
        }
        for strategy in VerificationStrategy::ALL {
            assert_eq!(VerificationStrategy::parse(&strategy.to_string()), Some(strategy));
        }
        assert_eq!(VerificationLevel::parse("rigorous"), Some(VerificationLevel::Rigorous));
        assert_eq!(VerificationLevel::parse("extreme"), None);
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&VerificationMethod::HistoricalEvidence).unwrap();
        assert_eq!(json, "\"historical_evidence\"");
        let json = serde_json::to_string(&VerificationStrategy::AdaptiveStrategy).unwrap();
        assert_eq!(json, "\"adaptive_strategy\"");
    }

    #[test]
    fn test_without_assumption() {
        let theorem = Theorem::new("t1", "Prices rise")
            .with_assumption("rational agents")
            .with_assumption("perfect information");

        let probe = theorem.without_assumption(0);
        assert_eq!(probe.assumptions, vec!["perfect information".to_string()]);
        assert_eq!(probe.id, "t1#without-0");
        assert_eq!(theorem.assumptions.len(), 2);
    }

    #[test]
    fn test_method_result_normalization() {
        let mut raw = MethodResult::verified(VerificationMethod::DirectProof, 0.5);
        raw.confidence = 1.7;
        raw.error = Some("late failure".into());

        let normalized = raw.normalized(VerificationMethod::DirectProof);
        assert_eq!(normalized.confidence, 1.0);
        assert!(!normalized.verified);
        assert!(!normalized.succeeded());

        let mut nan = MethodResult::refuted(VerificationMethod::Contradiction, 0.2);
        nan.confidence = f64::NAN;
        assert_eq!(nan.normalized(VerificationMethod::Contradiction).confidence, 0.0);
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let options: VerificationOptions =
            serde_json::from_str(r#"{"strategy": "parallel_methods"}"#).unwrap();
        assert_eq!(options.strategy, Some(VerificationStrategy::ParallelMethods));
        assert!(options.use_cache);
        assert!(options.sensitivity_analysis);
        assert!(options.time_limit_ms.is_none());
    }

    #[test]
    fn test_composite_proof_partitions() {
        let proof = CompositeProof {
            steps: vec![
                ProofStep::new("a", "A", ""),
                ProofStep::new("b", "B", "").with_premise("Z"),
            ],
            unresolved_steps: 1,
            ..Default::default()
        };
        assert_eq!(proof.resolved().len(), 1);
        assert_eq!(proof.unresolved()[0].conclusion, "B");
    }

    #[test]
    fn test_composite_proof_with_inconsistent_unresolved_count() {
        let proof: CompositeProof = serde_json::from_str(
            r#"{
                "steps": [{"id": "a", "conclusion": "A"}],
                "unresolved_steps": 5,
                "counter_examples": [],
                "limitations": [],
                "applicability_conditions": []
            }"#,
        )
        .unwrap();

        assert!(proof.resolved().is_empty());
        assert_eq!(proof.unresolved().len(), 1);
    }
}
