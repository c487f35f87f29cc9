//! Theorem verification.
//!
//! This module provides the multi-strategy verification pipeline:
//! - Theorem, method and composite result types
//! - A result cache keyed by theorem, strategy and level
//! - Composite proof assembly from several method results
//! - Leave-one-out assumption sensitivity analysis
//! - The strategy executor that ties them together
//!
//! # Example
//!
//! ```rust,ignore
//! use avo_core::verification::{StrategyExecutor, Theorem, VerificationOptions, VerificationStrategy};
//!
//! let executor = StrategyExecutor::new(gateway);
//! let theorem = Theorem::new("qtm", "Doubling the money supply doubles the price level")
//!     .with_domain("monetary")
//!     .with_assumption("constant velocity");
//!
//! let result = executor
//!     .verify(&theorem, &VerificationOptions::new().with_strategy(VerificationStrategy::ParallelMethods))
//!     .await?;
//! println!("{}", result.summary());
//! ```

pub mod assembler;
pub mod cache;
pub mod executor;
pub mod sensitivity;
pub mod types;

pub use assembler::{ProofAssembler, DEFAULT_PREAMBLE};
pub use cache::{CacheEntry, CacheKey, CacheStats, ResultCache};
pub use executor::StrategyExecutor;
pub use sensitivity::SensitivityAnalyzer;
pub use types::{
    AssumptionSensitivity, CompositeProof, CounterExample, EnhancedVerificationResult,
    ExecutionProcess, MethodResult, ProofStep, SensitivityAnalysis, Theorem, VerificationLevel,
    VerificationMethod, VerificationOptions, VerificationStrategy,
};
