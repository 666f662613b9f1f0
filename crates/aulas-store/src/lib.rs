// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Durable per-term classroom/laboratory counters.
//!
//! Grounded on `db.py` in the original implementation: a SQLite database
//! holds the durable counters, and a sibling lock file provides the mutual
//! exclusion a single SQLite connection cannot give across processes. Every
//! caller that wants to read-then-update a term's counters must go through
//! [`CounterStore::acquire_and_read`] and [`CounterStore::write_and_release`]
//! so the read, the arithmetic and the write happen under one held lock.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use aulas_proto::CountersSnapshot;
use fs2::FileExt;
use rusqlite::{params, Connection, OptionalExtension};

/// Errors returned by the counter store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to acquire counter store lock at {0}: {1}")]
    Lock(PathBuf, String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("counter store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lease for term {0} was already released")]
    StaleLease(String),
}

/// A held mutual-exclusion lease over one term's counters.
///
/// Carries the locked file handle and the SQLite session opened while the
/// lock was held, so the caller cannot read counters for a term without
/// also holding the lock that protects their later write.
pub struct Lease {
    lock_file: Option<File>,
    conn: Connection,
    term: String,
}

impl Lease {
    pub fn term(&self) -> &str {
        &self.term
    }

    fn release_lock(&mut self) {
        if let Some(file) = self.lock_file.take() {
            // Explicit unlock rather than relying on drop-closes-fd so the
            // release is visible at the call site that asked for it.
            let _ = fs2::FileExt::unlock(&file);
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.lock_file.is_some() {
            tracing::warn!(
                term = %self.term,
                "counter store lease dropped without being released; releasing now"
            );
            self.release_lock();
        }
    }
}

/// Durable counter storage for one deployment, backed by a single SQLite
/// file and a sibling advisory lock file.
///
/// Cheap to clone (via `Arc`) and share across threads: the struct itself
/// holds no connection, only paths. Mutual exclusion across processes comes
/// entirely from the file lock taken in [`acquire_and_read`][Self::acquire_and_read].
#[derive(Debug, Clone)]
pub struct CounterStore {
    db_path: PathBuf,
    lock_path: PathBuf,
}

impl CounterStore {
    /// Open (creating if absent) the counter database at `db_path`, using
    /// `db_path` with a `.lock` suffix as the cross-process mutex file.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        let lock_path = {
            let mut p = db_path.clone().into_os_string();
            p.push(".lock");
            PathBuf::from(p)
        };
        let store = Self { db_path, lock_path };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS counters (
                term                  TEXT PRIMARY KEY,
                classrooms_available  INTEGER NOT NULL,
                labs_available        INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn lock_file(&self) -> Result<File, StoreError> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(StoreError::Io)
    }

    /// Block until the term's lock is held, then read its counters,
    /// initializing them from `pools` on first use.
    ///
    /// Mirrors `obtener_y_bloquear`: the lock is acquired first, then a
    /// fresh session is opened and the row is read or inserted inside it.
    /// Nothing is written back until [`write_and_release`][Self::write_and_release]
    /// is called, so a crash between the two leaves the durable state
    /// exactly as it was before the request.
    pub fn acquire_and_read(
        &self,
        term: &str,
        pools: aulas_proto::PoolConfig,
    ) -> Result<(Lease, CountersSnapshot), StoreError> {
        let file = self.lock_file()?;
        file.lock_exclusive()
            .map_err(|e| StoreError::Lock(self.lock_path.clone(), e.to_string()))?;

        let conn = self.connect()?;
        let existing: Option<(u32, u32)> = conn
            .query_row(
                "SELECT classrooms_available, labs_available FROM counters WHERE term = ?1",
                params![term],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let snapshot = match existing {
            Some((classrooms_available, labs_available)) => CountersSnapshot {
                classrooms_available,
                labs_available,
            },
            None => {
                let snapshot = CountersSnapshot {
                    classrooms_available: pools.classrooms_orig,
                    labs_available: pools.labs_orig,
                };
                conn.execute(
                    "INSERT INTO counters (term, classrooms_available, labs_available)
                     VALUES (?1, ?2, ?3)",
                    params![term, snapshot.classrooms_available, snapshot.labs_available],
                )?;
                snapshot
            }
        };

        let lease = Lease {
            lock_file: Some(file),
            conn,
            term: term.to_string(),
        };
        Ok((lease, snapshot))
    }

    /// Write the term's new counters and release the lease's lock.
    ///
    /// Takes the lease by value: once released it no longer exists, so
    /// there is no second call through which a caller could release the
    /// same lock twice.
    pub fn write_and_release(
        &self,
        mut lease: Lease,
        new_counters: CountersSnapshot,
    ) -> Result<(), StoreError> {
        if lease.lock_file.is_none() {
            return Err(StoreError::StaleLease(lease.term.clone()));
        }
        lease.conn.execute(
            "UPDATE counters SET classrooms_available = ?1, labs_available = ?2 WHERE term = ?3",
            params![
                new_counters.classrooms_available,
                new_counters.labs_available,
                lease.term,
            ],
        )?;
        lease.release_lock();
        Ok(())
    }

    /// Read every term's counters without taking the mutual-exclusion lock.
    ///
    /// Not part of the original protocol; added for operational visibility
    /// (e.g. a status endpoint or CLI inspection tool). Takes a momentary
    /// shared lock so it never observes a half-written row, but does not
    /// block a concurrent [`acquire_and_read`][Self::acquire_and_read].
    pub fn snapshot_all(&self) -> Result<Vec<(String, CountersSnapshot)>, StoreError> {
        let file = self.lock_file()?;
        file.lock_shared()
            .map_err(|e| StoreError::Lock(self.lock_path.clone(), e.to_string()))?;

        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT term, classrooms_available, labs_available FROM counters")?;
        let rows = stmt
            .query_map([], |row| {
                let term: String = row.get(0)?;
                let classrooms_available: u32 = row.get(1)?;
                let labs_available: u32 = row.get(2)?;
                Ok((
                    term,
                    CountersSnapshot {
                        classrooms_available,
                        labs_available,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        fs2::FileExt::unlock(&file).ok();
        Ok(rows)
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aulas_proto::PoolConfig;

    fn temp_store() -> CounterStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.into_path().join("recursos.db");
        CounterStore::open(path).unwrap()
    }

    #[test]
    fn first_acquire_initializes_from_pool_config() {
        let store = temp_store();
        let pools = PoolConfig {
            classrooms_orig: 10,
            labs_orig: 4,
        };
        let (lease, snapshot) = store.acquire_and_read("2025-1", pools).unwrap();
        assert_eq!(snapshot.classrooms_available, 10);
        assert_eq!(snapshot.labs_available, 4);
        store.write_and_release(lease, snapshot).unwrap();
    }

    #[test]
    fn write_and_release_persists_across_sessions() {
        let store = temp_store();
        let pools = PoolConfig::default();
        let (lease, snapshot) = store.acquire_and_read("2025-2", pools).unwrap();
        let updated = CountersSnapshot {
            classrooms_available: snapshot.classrooms_available - 3,
            labs_available: snapshot.labs_available - 1,
        };
        store.write_and_release(lease, updated).unwrap();

        let (lease2, snapshot2) = store.acquire_and_read("2025-2", pools).unwrap();
        assert_eq!(snapshot2.classrooms_available, updated.classrooms_available);
        assert_eq!(snapshot2.labs_available, updated.labs_available);
        store.write_and_release(lease2, snapshot2).unwrap();
    }

    #[test]
    fn terms_are_independent() {
        // The lock file is global to the store (one `recursos.db.lock` per
        // §6), so a second lease can only be acquired after the first is
        // released -- this is what actually serializes unrelated terms.
        let store = temp_store();
        let pools = PoolConfig::default();

        let (lease_a, snapshot_a) = store.acquire_and_read("term-a", pools).unwrap();
        assert_eq!(snapshot_a.classrooms_available, pools.classrooms_orig);
        store.write_and_release(lease_a, snapshot_a).unwrap();

        let (lease_b, snapshot_b) = store.acquire_and_read("term-b", pools).unwrap();
        assert_eq!(snapshot_b.classrooms_available, pools.classrooms_orig);
        store.write_and_release(lease_b, snapshot_b).unwrap();
    }

    #[test]
    fn snapshot_all_reports_every_term() {
        let store = temp_store();
        let pools = PoolConfig::default();
        let (lease, snapshot) = store.acquire_and_read("2025-3", pools).unwrap();
        store.write_and_release(lease, snapshot).unwrap();

        let all = store.snapshot_all().unwrap();
        assert!(all.iter().any(|(term, _)| term == "2025-3"));
    }
}
