//! # avo-core
//!
//! An adaptive verification orchestrator for economic theorems.
//!
//! Given a theorem, the orchestrator picks a verification strategy,
//! dispatches one or more proof-method attempts to a prover gateway,
//! aggregates the outcomes into one composite judgment, and learns over
//! time which strategy and methods work best for which kind of theorem.
//!
//! ## Core Components
//!
//! - **Gateway**: the [`ProverGateway`] capability that attempts one method
//! - **Verification**: strategy executor, result cache, proof assembler and
//!   sensitivity analyzer
//! - **Optimizer**: per-domain rankings with an exploration/exploitation policy
//! - **Persistence**: optional SQLite storage for the outcome history
//! - **Service**: [`VerificationService`], the single entry point
//!
//! ## Example
//!
//! ```rust,ignore
//! use avo_core::{ServiceConfig, Theorem, VerificationOptions, VerificationService};
//!
//! let service = VerificationService::new(gateway, ServiceConfig::default());
//! let theorem = Theorem::new("qtm", "Doubling the money supply doubles the price level")
//!     .with_domain("monetary")
//!     .with_variable("M")
//!     .with_variable("P")
//!     .with_assumption("constant velocity");
//!
//! let result = service
//!     .verify_adaptively(&theorem, &VerificationOptions::new())
//!     .await?;
//! println!("{}", result.summary());
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod optimizer;
pub mod persistence;
mod properties;
pub mod scoring;
pub mod service;
#[cfg(test)]
pub(crate) mod test_support;
pub mod verification;

// Re-exports for convenience
pub use config::{DomainRule, ExecutorConfig, OptimizerConfig, ServiceConfig};
pub use domain::{DomainCategory, DomainTable};
pub use error::{Error, Result};
pub use gateway::{InvocationStats, ProverGateway, ProverRequest, TrackedGateway};
pub use optimizer::{
    OptimizerPhase, OutcomeStats, PerformanceHistory, PerformanceRecord, PerformanceStatistics,
    RankingEntry, RankingTable, Recommendation, StrategyOptimizer,
};
pub use persistence::{HistoryStore, SqliteHistoryStore};
pub use scoring::{FeatureWeights, TheoremFeatures};
pub use service::VerificationService;
pub use verification::{
    AssumptionSensitivity, CacheStats, CompositeProof, CounterExample,
    EnhancedVerificationResult, ExecutionProcess, MethodResult, ProofAssembler, ProofStep,
    ResultCache, SensitivityAnalysis, SensitivityAnalyzer, StrategyExecutor, Theorem,
    VerificationLevel, VerificationMethod, VerificationOptions, VerificationStrategy,
};
