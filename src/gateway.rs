//! Prover gateway abstraction.
//!
//! The gateway is the external capability that actually attempts a proof
//! with one named method. The orchestrator only ever talks to it through
//! [`ProverGateway`], so real provers, remote services and test fakes are
//! interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::verification::{MethodResult, Theorem, VerificationMethod};

/// A single verification request sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverRequest {
    pub method: VerificationMethod,
    /// Advisory time limit. The orchestrator never enforces it itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,
    /// Whether the gateway may serve its own cached answer.
    pub use_cache: bool,
    #[serde(default)]
    pub generate_counter_examples: bool,
}

impl ProverRequest {
    pub fn new(method: VerificationMethod) -> Self {
        Self {
            method,
            time_limit_ms: None,
            use_cache: true,
            generate_counter_examples: false,
        }
    }

    pub fn with_time_limit_ms(mut self, time_limit_ms: Option<u64>) -> Self {
        self.time_limit_ms = time_limit_ms;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_counter_examples(mut self, generate: bool) -> Self {
        self.generate_counter_examples = generate;
        self
    }
}

/// Verifies one theorem with one method.
///
/// Implementations must tolerate concurrent invocation. An `Err` is treated
/// by the executor as a failed method, never as a batch failure.
#[async_trait]
pub trait ProverGateway: Send + Sync {
    async fn verify(&self, theorem: &Theorem, request: &ProverRequest) -> Result<MethodResult>;
}

#[async_trait]
impl<G: ProverGateway + ?Sized> ProverGateway for Arc<G> {
    async fn verify(&self, theorem: &Theorem, request: &ProverRequest) -> Result<MethodResult> {
        (**self).verify(theorem, request).await
    }
}

/// Run one gateway call in its own task and fold every failure mode into
/// the returned [`MethodResult`].
///
/// Errors and panics become errored results; the result is normalized so
/// its method matches the request and its confidence is in [0, 1]. The task
/// keeps running to completion even if the caller stops awaiting.
pub(crate) async fn dispatch(
    gateway: Arc<dyn ProverGateway>,
    theorem: Arc<Theorem>,
    request: ProverRequest,
) -> MethodResult {
    let method = request.method;
    let start = Instant::now();
    let handle = tokio::spawn(async move { gateway.verify(&theorem, &request).await });

    let result = match handle.await {
        Ok(Ok(result)) => result.normalized(method),
        Ok(Err(e)) => MethodResult::errored(method, e.to_string()),
        Err(e) => MethodResult::errored(method, format!("prover task aborted: {}", e)),
    };

    if result.duration_ms == 0 {
        result.with_duration(start.elapsed().as_millis() as u64)
    } else {
        result
    }
}

/// Statistics about gateway invocations for one method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationStats {
    pub total_invocations: u64,
    /// Calls that returned a verified result
    pub verified_invocations: u64,
    /// Calls that returned an error
    pub failed_invocations: u64,
    /// Rolling mean latency in milliseconds
    pub avg_latency_ms: f64,
}

impl InvocationStats {
    /// Record a completed invocation.
    pub fn record(&mut self, verified: bool, errored: bool, latency_ms: u64) {
        self.total_invocations += 1;
        if verified {
            self.verified_invocations += 1;
        }
        if errored {
            self.failed_invocations += 1;
        }

        let n = self.total_invocations as f64;
        self.avg_latency_ms = ((n - 1.0) * self.avg_latency_ms + latency_ms as f64) / n;
    }

    /// Share of invocations that did not error.
    pub fn availability(&self) -> f64 {
        if self.total_invocations == 0 {
            1.0
        } else {
            1.0 - self.failed_invocations as f64 / self.total_invocations as f64
        }
    }
}

/// Gateway decorator that records per-method invocation statistics.
pub struct TrackedGateway {
    inner: Arc<dyn ProverGateway>,
    stats: Arc<RwLock<BTreeMap<VerificationMethod, InvocationStats>>>,
}

impl TrackedGateway {
    pub fn new(inner: Arc<dyn ProverGateway>) -> Self {
        Self {
            inner,
            stats: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Snapshot of the statistics per method.
    pub async fn stats(&self) -> BTreeMap<VerificationMethod, InvocationStats> {
        self.stats.read().await.clone()
    }

    /// Reset statistics.
    pub async fn reset_stats(&self) {
        self.stats.write().await.clear();
    }
}

#[async_trait]
impl ProverGateway for TrackedGateway {
    async fn verify(&self, theorem: &Theorem, request: &ProverRequest) -> Result<MethodResult> {
        let start = Instant::now();
        let outcome = self.inner.verify(theorem, request).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (verified, errored) = match &outcome {
            Ok(result) => (result.succeeded(), result.error.is_some()),
            Err(_) => (false, true),
        };
        debug!(
            method = %request.method,
            theorem = %theorem.id,
            verified,
            errored,
            latency_ms,
            "Prover call completed"
        );

        let mut stats = self.stats.write().await;
        stats
            .entry(request.method)
            .or_default()
            .record(verified, errored, latency_ms);

        outcome
    }
}
