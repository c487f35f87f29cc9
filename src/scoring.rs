//! Heuristic scoring formulas.
//!
//! Every confidence and ranking formula the executor and optimizer rely on
//! lives here as a pure function, so the magic numbers are in one place and
//! can be tested without a gateway or any shared state.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::domain::DomainCategory;
use crate::verification::{
    MethodResult, Theorem, VerificationLevel, VerificationMethod, VerificationStrategy,
};

/// Complexity contribution per variable.
pub const VARIABLE_WEIGHT: f64 = 0.1;
/// Complexity contribution per constraint.
pub const CONSTRAINT_WEIGHT: f64 = 0.15;
/// Complexity contribution per assumption.
pub const ASSUMPTION_WEIGHT: f64 = 0.1;
/// Distinct keyword hits at which a nature score saturates.
pub const KEYWORD_SATURATION: f64 = 4.0;

/// Confidence drop above which an assumption is critical.
pub const CRITICAL_DELTA: f64 = 0.2;
/// Stability above which a theorem is robust to assumption removal.
pub const ROBUST_STABILITY: f64 = 0.7;

/// Minimum outcome confidence before feature weights are nudged.
pub const CONTINUAL_LEARNING_MIN_CONFIDENCE: f64 = 0.6;
/// Size of one feature weight nudge.
pub const FEATURE_WEIGHT_STEP: f64 = 0.02;

static FORMAL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(theorem|lemma|proof|axiom|equilibrium|optimal|optimum|maximi[sz]e|minimi[sz]e|convex|concave|derivative|function|implies|necessary|sufficient|unique|existence)\b",
    )
    .expect("invalid regex")
});

static EMPIRICAL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(data|evidence|empirical|historical|observed|observation|sample|estimate|regression|trend|survey|statistical|correlation|time\s+series|panel)\b",
    )
    .expect("invalid regex")
});

/// Deterministic features extracted from a theorem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TheoremFeatures {
    /// Structural size in [0, 1]
    pub complexity: f64,
    /// Formal-vocabulary density in [0, 1]
    pub formal_nature: f64,
    /// Empirical-vocabulary density in [0, 1]
    pub empirical_nature: f64,
    pub domain: DomainCategory,
}

impl TheoremFeatures {
    /// Extract features from a theorem.
    pub fn extract(theorem: &Theorem) -> Self {
        let complexity = (theorem.variables.len() as f64 * VARIABLE_WEIGHT
            + theorem.constraints.len() as f64 * CONSTRAINT_WEIGHT
            + theorem.assumptions.len() as f64 * ASSUMPTION_WEIGHT)
            .min(1.0);

        let mut corpus = theorem.statement.clone();
        if let Some(formal) = &theorem.formal_representation {
            corpus.push('\n');
            corpus.push_str(formal);
        }
        for text in theorem.assumptions.iter().chain(theorem.constraints.iter()) {
            corpus.push('\n');
            corpus.push_str(text);
        }

        Self {
            complexity,
            formal_nature: keyword_density(&FORMAL_KEYWORDS, &corpus),
            empirical_nature: keyword_density(&EMPIRICAL_KEYWORDS, &corpus),
            domain: DomainCategory::classify(&theorem.domain),
        }
    }

    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Complexity => self.complexity,
            Feature::FormalNature => self.formal_nature,
            Feature::EmpiricalNature => self.empirical_nature,
        }
    }
}

fn keyword_density(keywords: &Regex, text: &str) -> f64 {
    let distinct: HashSet<String> = keywords
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        })
        .collect();
    (distinct.len() as f64 / KEYWORD_SATURATION).min(1.0)
}

/// The three weighted features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Complexity,
    FormalNature,
    EmpiricalNature,
}

impl Feature {
    pub const ALL: [Self; 3] = [Self::Complexity, Self::FormalNature, Self::EmpiricalNature];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complexity => "complexity",
            Self::FormalNature => "formal_nature",
            Self::EmpiricalNature => "empirical_nature",
        }
    }
}

/// Learned weights for the feature terms of strategy scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub complexity: f64,
    pub formal_nature: f64,
    pub empirical_nature: f64,
}

impl FeatureWeights {
    /// Read the named weights from a config map; unknown names are ignored.
    pub fn from_map(map: &HashMap<String, f64>) -> Self {
        let get = |f: Feature| map.get(f.as_str()).copied().unwrap_or(0.0);
        Self {
            complexity: get(Feature::Complexity),
            formal_nature: get(Feature::FormalNature),
            empirical_nature: get(Feature::EmpiricalNature),
        }
    }

    pub fn to_map(&self) -> HashMap<String, f64> {
        Feature::ALL
            .into_iter()
            .map(|f| (f.as_str().to_string(), self.get(f)))
            .collect()
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Complexity => self.complexity,
            Feature::FormalNature => self.formal_nature,
            Feature::EmpiricalNature => self.empirical_nature,
        }
    }

    fn get_mut(&mut self, feature: Feature) -> &mut f64 {
        match feature {
            Feature::Complexity => &mut self.complexity,
            Feature::FormalNature => &mut self.formal_nature,
            Feature::EmpiricalNature => &mut self.empirical_nature,
        }
    }

    /// Continual-learning nudge after an outcome.
    ///
    /// Only outcomes with confidence >= 0.6 count. Each feature above 0.5
    /// moves its weight by ±0.02 depending on success. Weights stay in [-1, 1].
    pub fn nudge(&mut self, features: &TheoremFeatures, success: bool, confidence: f64) {
        if confidence < CONTINUAL_LEARNING_MIN_CONFIDENCE {
            return;
        }
        let step = if success {
            FEATURE_WEIGHT_STEP
        } else {
            -FEATURE_WEIGHT_STEP
        };
        for feature in Feature::ALL {
            if features.value(feature) > 0.5 {
                let weight = self.get_mut(feature);
                *weight = (*weight + step).clamp(-1.0, 1.0);
            }
        }
    }
}

/// How strongly a feature pulls toward a strategy: -1, 0, or +1.
pub fn affinity(strategy: VerificationStrategy, feature: Feature) -> f64 {
    use VerificationStrategy::*;
    match (feature, strategy) {
        (Feature::Complexity, ParallelMethods | AdaptiveStrategy) => 1.0,
        (Feature::Complexity, SingleMethod) => -1.0,
        (Feature::FormalNature, SingleMethod | SequentialMethods) => 1.0,
        (Feature::EmpiricalNature, ParallelMethods) => 1.0,
        (Feature::EmpiricalNature, SingleMethod) => -1.0,
        _ => 0.0,
    }
}

/// Sum of weighted feature terms for a strategy.
pub fn feature_weight_term(
    strategy: VerificationStrategy,
    features: &TheoremFeatures,
    weights: &FeatureWeights,
) -> f64 {
    Feature::ALL
        .into_iter()
        .map(|f| weights.get(f) * features.value(f) * affinity(strategy, f))
        .sum()
}

/// Fixed heuristic bonus table for strategy scoring.
pub fn heuristic_bonus(strategy: VerificationStrategy, features: &TheoremFeatures) -> f64 {
    let c = features.complexity;
    match strategy {
        VerificationStrategy::SingleMethod => {
            if c < 0.3 {
                0.2
            } else if c > 0.7 {
                -0.2
            } else {
                0.0
            }
        }
        VerificationStrategy::SequentialMethods => {
            if c > 0.3 && c < 0.7 {
                0.1
            } else {
                0.0
            }
        }
        VerificationStrategy::ParallelMethods => {
            let mut bonus = 0.0;
            if c > 0.7 {
                bonus += 0.2;
            }
            if features.formal_nature > 0.3 && features.empirical_nature > 0.3 {
                bonus += 0.1;
            }
            bonus
        }
        VerificationStrategy::AdaptiveStrategy => {
            if c > 0.5 {
                0.1
            } else {
                0.0
            }
        }
    }
}

/// Level recommended for a complexity.
pub fn recommended_level(complexity: f64) -> VerificationLevel {
    if complexity < 0.3 {
        VerificationLevel::Basic
    } else if complexity > 0.7 {
        VerificationLevel::Rigorous
    } else {
        VerificationLevel::Standard
    }
}

/// Method picked for SingleMethod when the caller names none.
pub fn heuristic_method(features: &TheoremFeatures) -> VerificationMethod {
    if features.empirical_nature > features.formal_nature && features.empirical_nature > 0.5 {
        VerificationMethod::HistoricalEvidence
    } else if features.complexity > 0.7 {
        VerificationMethod::HybridApproach
    } else if features.formal_nature > features.empirical_nature {
        VerificationMethod::DirectProof
    } else {
        VerificationMethod::ModelChecking
    }
}

/// Strategy (and, for single-method delegation, the method) AdaptiveStrategy delegates to.
pub fn adaptive_delegate(
    features: &TheoremFeatures,
) -> (VerificationStrategy, Option<VerificationMethod>) {
    if features.complexity < 0.3 {
        (
            VerificationStrategy::SingleMethod,
            Some(VerificationMethod::DirectProof),
        )
    } else if features.empirical_nature > 0.7 {
        (
            VerificationStrategy::SingleMethod,
            Some(VerificationMethod::HistoricalEvidence),
        )
    } else if features.complexity < 0.7 {
        (VerificationStrategy::SequentialMethods, None)
    } else {
        (VerificationStrategy::ParallelMethods, None)
    }
}

/// One ranking update step: `clamp01(old + rate · (±confidence))`.
pub fn learning_step(old: f64, learning_rate: f64, success: bool, confidence: f64) -> f64 {
    let success_factor = if success { confidence } else { -confidence };
    (old + learning_rate * success_factor).clamp(0.0, 1.0)
}

/// Mean confidence of successful results; `None` below two successes.
pub fn cross_validation_score(results: &[MethodResult]) -> Option<f64> {
    let confidences: Vec<f64> = results
        .iter()
        .filter(|r| r.succeeded())
        .map(|r| r.confidence)
        .collect();
    if confidences.len() < 2 {
        return None;
    }
    Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
}

/// Highest-confidence entry, first-seen on exact ties.
fn first_max<'a>(results: impl Iterator<Item = &'a MethodResult>) -> Option<&'a MethodResult> {
    results.fold(None, |best: Option<&MethodResult>, r| match best {
        Some(b) if b.confidence >= r.confidence => Some(b),
        _ => Some(r),
    })
}

/// The successful method with the highest confidence, first-seen on ties.
pub fn most_successful(results: &[MethodResult]) -> Option<&MethodResult> {
    first_max(results.iter().filter(|r| r.succeeded()))
}

/// Primary method of a composite result.
///
/// Highest-confidence verified method; otherwise the highest-confidence
/// attempted method; otherwise the first candidate.
pub fn select_primary(
    results: &[MethodResult],
    candidates: &[VerificationMethod],
) -> Option<VerificationMethod> {
    most_successful(results)
        .or_else(|| first_max(results.iter()))
        .map(|r| r.method)
        .or_else(|| candidates.first().copied())
}

/// `1 − mean(delta)` in [0, 1]; zero when there is nothing to average.
pub fn stability_score(deltas: &[f64]) -> f64 {
    if deltas.is_empty() {
        return 0.0;
    }
    let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
    (1.0 - mean).clamp(0.0, 1.0)
}

pub fn is_critical(delta: f64) -> bool {
    delta > CRITICAL_DELTA
}

pub fn is_robust(stability: f64) -> bool {
    stability > ROBUST_STABILITY
}

/// Expected confidence reported with a recommendation.
pub fn expected_confidence(strategy_score: f64, method_scores: &[f64]) -> f64 {
    let method_mean = if method_scores.is_empty() {
        strategy_score
    } else {
        method_scores.iter().sum::<f64>() / method_scores.len() as f64
    };
    ((strategy_score + method_mean) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(complexity: f64, formal: f64, empirical: f64) -> TheoremFeatures {
        TheoremFeatures {
            complexity,
            formal_nature: formal,
            empirical_nature: empirical,
            domain: DomainCategory::General,
        }
    }

    #[test]
    fn test_complexity_weights_and_clipping() {
        let small = Theorem::new("t", "x").with_variable("x");
        assert!((TheoremFeatures::extract(&small).complexity - 0.1).abs() < 1e-9);

        let medium = Theorem::new("t", "x")
            .with_variable("x")
            .with_variable("y")
            .with_constraint("x > 0")
            .with_assumption("a");
        assert!((TheoremFeatures::extract(&medium).complexity - 0.45).abs() < 1e-9);

        let mut large = Theorem::new("t", "x");
        for i in 0..20 {
            large = large.with_variable(format!("v{}", i));
        }
        assert_eq!(TheoremFeatures::extract(&large).complexity, 1.0);
    }

    #[test]
    fn test_keyword_density() {
        let formal = Theorem::new(
            "t",
            "Theorem: the unique equilibrium is optimal and the proof is by convex analysis",
        );
        let f = TheoremFeatures::extract(&formal);
        assert_eq!(f.formal_nature, 1.0);
        assert_eq!(f.empirical_nature, 0.0);

        // Repeated keywords count once.
        let empirical = Theorem::new("t", "data data data and more data, plus a regression");
        let f = TheoremFeatures::extract(&empirical);
        assert!((f.empirical_nature - 0.5).abs() < 1e-9);

        // Word boundaries: "database" is not "data".
        let none = Theorem::new("t", "database metadata");
        assert_eq!(TheoremFeatures::extract(&none).empirical_nature, 0.0);

        let spaced = Theorem::new("t", "a Time   Series study").with_assumption("time series");
        assert!((TheoremFeatures::extract(&spaced).empirical_nature - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_bonus_table() {
        use VerificationStrategy::*;
        assert_eq!(heuristic_bonus(SingleMethod, &features(0.1, 0.0, 0.0)), 0.2);
        assert_eq!(heuristic_bonus(SingleMethod, &features(0.8, 0.0, 0.0)), -0.2);
        assert_eq!(heuristic_bonus(SingleMethod, &features(0.5, 0.0, 0.0)), 0.0);
        assert_eq!(heuristic_bonus(SequentialMethods, &features(0.5, 0.0, 0.0)), 0.1);
        assert_eq!(heuristic_bonus(SequentialMethods, &features(0.3, 0.0, 0.0)), 0.0);
        assert!((heuristic_bonus(ParallelMethods, &features(0.8, 0.4, 0.4)) - 0.3).abs() < 1e-9);
        assert_eq!(heuristic_bonus(ParallelMethods, &features(0.5, 0.4, 0.2)), 0.0);
        assert_eq!(heuristic_bonus(AdaptiveStrategy, &features(0.6, 0.0, 0.0)), 0.1);
        assert_eq!(heuristic_bonus(AdaptiveStrategy, &features(0.5, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_recommended_level() {
        assert_eq!(recommended_level(0.1), VerificationLevel::Basic);
        assert_eq!(recommended_level(0.3), VerificationLevel::Standard);
        assert_eq!(recommended_level(0.7), VerificationLevel::Standard);
        assert_eq!(recommended_level(0.71), VerificationLevel::Rigorous);
    }

    #[test]
    fn test_heuristic_method_pick() {
        assert_eq!(
            heuristic_method(&features(0.9, 0.25, 0.75)),
            VerificationMethod::HistoricalEvidence
        );
        assert_eq!(
            heuristic_method(&features(0.9, 0.5, 0.25)),
            VerificationMethod::HybridApproach
        );
        assert_eq!(
            heuristic_method(&features(0.4, 0.5, 0.25)),
            VerificationMethod::DirectProof
        );
        assert_eq!(
            heuristic_method(&features(0.4, 0.0, 0.0)),
            VerificationMethod::ModelChecking
        );
    }

    #[test]
    fn test_adaptive_delegation() {
        use VerificationStrategy::*;
        assert_eq!(
            adaptive_delegate(&features(0.2, 0.0, 0.9)),
            (SingleMethod, Some(VerificationMethod::DirectProof))
        );
        assert_eq!(
            adaptive_delegate(&features(0.5, 0.0, 0.75)),
            (SingleMethod, Some(VerificationMethod::HistoricalEvidence))
        );
        assert_eq!(adaptive_delegate(&features(0.3, 0.0, 0.0)), (SequentialMethods, None));
        assert_eq!(adaptive_delegate(&features(0.7, 0.0, 0.0)), (ParallelMethods, None));
    }

    #[test]
    fn test_learning_step() {
        assert!((learning_step(0.5, 0.1, true, 0.9) - 0.59).abs() < 1e-9);
        assert!((learning_step(0.5, 0.1, false, 0.9) - 0.41).abs() < 1e-9);
        assert_eq!(learning_step(0.99, 0.5, true, 1.0), 1.0);
        assert_eq!(learning_step(0.01, 0.5, false, 1.0), 0.0);
    }

    #[test]
    fn test_cross_validation_score() {
        let results = vec![
            MethodResult::errored(VerificationMethod::DirectProof, "boom"),
            MethodResult::verified(VerificationMethod::ModelChecking, 0.6),
            MethodResult::verified(VerificationMethod::HybridApproach, 0.9),
        ];
        assert!((cross_validation_score(&results).unwrap() - 0.75).abs() < 1e-9);
        assert!(cross_validation_score(&results[..2]).is_none());
    }

    #[test]
    fn test_select_primary() {
        let candidates = [VerificationMethod::DirectProof, VerificationMethod::Contradiction];

        let results = vec![
            MethodResult::verified(VerificationMethod::DirectProof, 0.8),
            MethodResult::refuted(VerificationMethod::Contradiction, 0.95),
            MethodResult::verified(VerificationMethod::ModelChecking, 0.8),
        ];
        // Verified beats higher-confidence refuted; tie goes to first attempted.
        assert_eq!(
            select_primary(&results, &candidates),
            Some(VerificationMethod::DirectProof)
        );

        let none_verified = vec![
            MethodResult::refuted(VerificationMethod::DirectProof, 0.2),
            MethodResult::refuted(VerificationMethod::Contradiction, 0.4),
        ];
        assert_eq!(
            select_primary(&none_verified, &candidates),
            Some(VerificationMethod::Contradiction)
        );

        assert_eq!(select_primary(&[], &candidates), Some(VerificationMethod::DirectProof));
        assert_eq!(select_primary(&[], &[]), None);
    }

    #[test]
    fn test_stability_score() {
        assert!((stability_score(&[0.1, 0.3]) - 0.8).abs() < 1e-9);
        assert_eq!(stability_score(&[]), 0.0);
        assert!(is_robust(0.8));
        assert!(!is_robust(0.7));
        assert!(is_critical(0.25));
        assert!(!is_critical(0.2));
    }

    #[test]
    fn test_feature_weight_nudge() {
        let mut weights = FeatureWeights::default();
        let f = features(0.8, 0.6, 0.2);

        weights.nudge(&f, true, 0.5);
        assert_eq!(weights, FeatureWeights::default());

        weights.nudge(&f, true, 0.9);
        assert!((weights.complexity - 0.02).abs() < 1e-9);
        assert!((weights.formal_nature - 0.02).abs() < 1e-9);
        assert_eq!(weights.empirical_nature, 0.0);

        weights.nudge(&f, false, 0.6);
        assert!(weights.complexity.abs() < 1e-9);
    }

    #[test]
    fn test_feature_weight_term() {
        let weights = FeatureWeights {
            complexity: 0.5,
            formal_nature: 0.0,
            empirical_nature: 0.0,
        };
        let f = features(0.8, 0.0, 0.0);
        assert!(
            (feature_weight_term(VerificationStrategy::ParallelMethods, &f, &weights) - 0.4).abs()
                < 1e-9
        );
        assert!(
            (feature_weight_term(VerificationStrategy::SingleMethod, &f, &weights) + 0.4).abs()
                < 1e-9
        );
        assert_eq!(
            feature_weight_term(VerificationStrategy::SequentialMethods, &f, &weights),
            0.0
        );

        let map = weights.to_map();
        assert_eq!(FeatureWeights::from_map(&map), weights);
    }

    #[test]
    fn test_expected_confidence() {
        assert!((expected_confidence(0.8, &[0.4, 0.6]) - 0.65).abs() < 1e-9);
        assert_eq!(expected_confidence(0.5, &[]), 0.5);
    }
}
