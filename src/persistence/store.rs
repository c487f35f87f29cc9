//! SQLite-backed history store.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::schema::{initialize_schema, is_initialized};
use super::HistoryStore;
use crate::domain::DomainCategory;
use crate::error::{Error, Result};
use crate::optimizer::PerformanceRecord;
use crate::verification::{VerificationMethod, VerificationStrategy};

/// Row as stored, before domain types are parsed back.
struct RawRecord {
    theorem_category: String,
    strategy: String,
    methods: String,
    domain: String,
    success: bool,
    confidence: f64,
    duration_ms: i64,
    recorded_at: String,
}

/// SQLite-backed [`HistoryStore`].
///
/// `save_history` replaces the stored history in one transaction, so the
/// table always mirrors the optimizer's retained window.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open or create a history store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::persistence(e.to_string()))?;

        if !is_initialized(&conn) {
            initialize_schema(&conn).map_err(|e| Error::persistence(e.to_string()))?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::persistence(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::persistence(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
        f(&conn).map_err(|e| Error::persistence(e.to_string()))
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM performance_records", [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .map(|n| n as usize)
    }

    fn parse(raw: RawRecord) -> Option<PerformanceRecord> {
        let methods: Vec<String> = serde_json::from_str(&raw.methods).ok()?;
        let methods = methods
            .iter()
            .map(|m| VerificationMethod::parse(m))
            .collect::<Option<Vec<_>>>()?;

        Some(PerformanceRecord {
            theorem_category: DomainCategory::parse(&raw.theorem_category)?,
            strategy: VerificationStrategy::parse(&raw.strategy)?,
            methods,
            domain: raw.domain,
            success: raw.success,
            confidence: raw.confidence.clamp(0.0, 1.0),
            duration_ms: raw.duration_ms.max(0) as u64,
            timestamp: DateTime::parse_from_rfc3339(&raw.recorded_at)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()?,
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load_history(&self) -> Result<Vec<PerformanceRecord>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT theorem_category, strategy, methods, domain, success, confidence,
                        duration_ms, recorded_at
                 FROM performance_records ORDER BY seq",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RawRecord {
                        theorem_category: row.get(0)?,
                        strategy: row.get(1)?,
                        methods: row.get(2)?,
                        domain: row.get(3)?,
                        success: row.get(4)?,
                        confidence: row.get(5)?,
                        duration_ms: row.get(6)?,
                        recorded_at: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let total = rows.len();
        let records: Vec<PerformanceRecord> = rows.into_iter().filter_map(Self::parse).collect();
        if records.len() < total {
            warn!(
                skipped = total - records.len(),
                "Skipped unreadable performance records"
            );
        }
        debug!(count = records.len(), "Loaded performance history");
        Ok(records)
    }

    fn save_history(&self, records: &[PerformanceRecord]) -> Result<()> {
        let encoded = records
            .iter()
            .map(|r| {
                let methods: Vec<&str> = r.methods.iter().map(|m| m.as_str()).collect();
                serde_json::to_string(&methods).map(|json| (r, json))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM performance_records", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO performance_records (
                        theorem_category, strategy, methods, domain, success, confidence,
                        duration_ms, recorded_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for (record, methods) in &encoded {
                    stmt.execute(params![
                        record.theorem_category.as_str(),
                        record.strategy.as_str(),
                        methods,
                        record.domain,
                        record.success,
                        record.confidence,
                        record.duration_ms as i64,
                        record.timestamp.to_rfc3339(),
                    ])?;
                }
            }
            tx.commit()
        })?;

        debug!(count = records.len(), "Saved performance history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn records() -> Vec<PerformanceRecord> {
        vec![
            PerformanceRecord::new(
                DomainCategory::Monetary,
                VerificationStrategy::ParallelMethods,
                vec![VerificationMethod::DirectProof, VerificationMethod::ModelChecking],
                true,
                0.85,
            )
            .with_domain("monetary policy")
            .with_duration(420),
            PerformanceRecord::new(
                DomainCategory::Behavioral,
                VerificationStrategy::SingleMethod,
                vec![VerificationMethod::HistoricalEvidence],
                false,
                0.2,
            ),
        ]
    }

    #[test]
    fn test_save_and_load_preserves_order() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let saved = records();

        store.save_history(&saved).unwrap();
        let loaded = store.load_history().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].strategy, VerificationStrategy::ParallelMethods);
        assert_eq!(loaded[0].methods, saved[0].methods);
        assert_eq!(loaded[0].domain, "monetary policy");
        assert_eq!(loaded[0].duration_ms, 420);
        assert_eq!(loaded[1].theorem_category, DomainCategory::Behavioral);
        assert!(!loaded[1].success);
        assert_eq!(loaded[1].timestamp, saved[1].timestamp);
    }

    #[test]
    fn test_save_replaces_previous_history() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store.save_history(&records()).unwrap();
        store.save_history(&records()[..1]).unwrap();

        assert_eq!(store.count().unwrap(), 1);

        store.save_history(&[]).unwrap();
        assert!(store.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_rows_are_skipped() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store.save_history(&records()).unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE performance_records SET strategy = 'telepathy' WHERE seq = 1",
                    [],
                )
            })
            .unwrap();

        let loaded = store.load_history().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].theorem_category, DomainCategory::Behavioral);
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");

        {
            let store = SqliteHistoryStore::open(&path).unwrap();
            store.save_history(&records()).unwrap();
        }

        let reopened = SqliteHistoryStore::open(&path).unwrap();
        assert_eq!(reopened.load_history().unwrap().len(), 2);
    }
}
