//! Optional persistence for the optimizer's outcome history.
//!
//! Both operations are best-effort from the optimizer's point of view:
//! failures are logged and the optimizer carries on in memory.

pub mod schema;
pub mod store;

pub use store::SqliteHistoryStore;

use crate::error::Result;
use crate::optimizer::PerformanceRecord;

/// Loads and saves the performance history.
///
/// Calls are blocking; the optimizer runs them on the blocking thread pool.
pub trait HistoryStore: Send + Sync {
    /// Stored records, oldest first.
    fn load_history(&self) -> Result<Vec<PerformanceRecord>>;

    /// Replace the stored history with `records`.
    fn save_history(&self, records: &[PerformanceRecord]) -> Result<()>;
}
