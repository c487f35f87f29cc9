//! Property-based tests for the verification and learning invariants.
//!
//! These tests check that, for arbitrary inputs:
//!
//! - Ranking scores stay in [0, 1] under any sequence of updates
//! - Successful and failed methods partition the attempted methods
//! - Composite proof steps only use premises concluded earlier
//! - The outcome history never exceeds its bound
