//! Leave-one-out assumption sensitivity analysis.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::types::{AssumptionSensitivity, MethodResult, SensitivityAnalysis, Theorem};
use crate::gateway::{dispatch, ProverGateway, ProverRequest};
use crate::scoring::{is_critical, is_robust, stability_score};

/// Re-verifies a theorem once per assumption, with that assumption removed.
///
/// Probes run one at a time to bound load on the gateway, and always with
/// gateway-side caching disabled. A probe that errors is skipped and the
/// analysis is marked partial.
pub struct SensitivityAnalyzer {
    gateway: Arc<dyn ProverGateway>,
}

impl SensitivityAnalyzer {
    pub fn new(gateway: Arc<dyn ProverGateway>) -> Self {
        Self { gateway }
    }

    /// Analyze `theorem` against the `baseline` result of its most successful method.
    #[instrument(skip(self, theorem, baseline), fields(theorem = %theorem.id, method = %baseline.method))]
    pub async fn analyze(
        &self,
        theorem: &Theorem,
        baseline: &MethodResult,
        time_limit_ms: Option<u64>,
    ) -> SensitivityAnalysis {
        let method = baseline.method;
        let mut assumptions = Vec::with_capacity(theorem.assumptions.len());
        let mut skipped = Vec::new();

        for (index, assumption) in theorem.assumptions.iter().enumerate() {
            let probe = Arc::new(theorem.without_assumption(index));
            let request = ProverRequest::new(method)
                .with_cache(false)
                .with_time_limit_ms(time_limit_ms);

            let result = dispatch(Arc::clone(&self.gateway), probe, request).await;
            if let Some(error) = &result.error {
                warn!(assumption = %assumption, error = %error, "Sensitivity probe failed, skipping");
                skipped.push(assumption.clone());
                continue;
            }

            let delta = (baseline.confidence - result.confidence).abs();
            debug!(assumption = %assumption, delta, "Sensitivity probe completed");
            assumptions.push(AssumptionSensitivity {
                assumption: assumption.clone(),
                confidence_without: result.confidence,
                delta,
                critical: is_critical(delta),
            });
        }

        let deltas: Vec<f64> = assumptions.iter().map(|a| a.delta).collect();
        let stability = stability_score(&deltas);
        let critical_assumptions = assumptions
            .iter()
            .filter(|a| a.critical)
            .map(|a| a.assumption.clone())
            .collect();

        SensitivityAnalysis {
            method,
            baseline_confidence: baseline.confidence,
            assumptions,
            critical_assumptions,
            partial: !skipped.is_empty(),
            skipped_assumptions: skipped,
            stability_score: stability,
            robust: is_robust(stability),
        }
    }
}
