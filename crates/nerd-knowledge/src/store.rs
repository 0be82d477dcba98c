use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use nerd_core::types::{compute_content_hash, KnowledgeAtom};
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

/// Current schema version new stores are created at. `MigrateTo` only
/// ever moves a store forward to this (or a caller-chosen) version;
/// reverting is out of scope (spec.md §9).
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot migrate backwards: current {current}, requested {target}")]
    BackwardsMigration { current: u32, target: u32 },
}

pub type Result<T> = std::result::Result<T, KnowledgeStoreError>;

/// A single persisted knowledge atom row, including bookkeeping
/// columns not present on the wire-level [`KnowledgeAtom`].
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRow {
    pub id: i64,
    pub concept: String,
    pub content: String,
    pub confidence: f64,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct KnowledgeStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl KnowledgeStore {
    /// Open (or create) a store at `path`, applying schema if absent.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).await?;
        let store = Self {
            conn,
            path: Some(path),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store, used by tests and by the shared-concepts pool
    /// scratch copies.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn, path: None };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA busy_timeout=5000;

                    CREATE TABLE IF NOT EXISTS knowledge_atoms (
                        id           INTEGER PRIMARY KEY AUTOINCREMENT,
                        concept      TEXT NOT NULL,
                        content      TEXT NOT NULL,
                        confidence   REAL NOT NULL,
                        content_hash TEXT NOT NULL UNIQUE,
                        created_at   TEXT NOT NULL,
                        updated_at   TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS prompt_atoms (
                        atom_id         TEXT NOT NULL UNIQUE,
                        category        TEXT NOT NULL,
                        content         TEXT NOT NULL,
                        token_count     INTEGER NOT NULL DEFAULT 0,
                        priority        INTEGER NOT NULL DEFAULT 0,
                        is_mandatory    INTEGER NOT NULL DEFAULT 0,
                        depends_on      TEXT,
                        conflicts_with  TEXT
                    );

                    CREATE TABLE IF NOT EXISTS schema_versions (
                        version     INTEGER NOT NULL,
                        applied_at  TEXT NOT NULL
                    );
                    ",
                )?;
                Ok(())
            })
            .await?;

        let has_version = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM schema_versions", [], |r| r.get(0))?;
                Ok(count)
            })
            .await?
            > 0;

        if !has_version {
            self.record_schema_version(CURRENT_SCHEMA_VERSION, Utc::now()).await?;
        }
        Ok(())
    }

    async fn record_schema_version(&self, version: u32, now: DateTime<Utc>) -> Result<()> {
        let applied_at = now.to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO schema_versions (version, applied_at) VALUES (?1, ?2)",
                    rusqlite::params![version, applied_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Idempotent on `content_hash` (spec.md §4.9, §8 property 8):
    /// storing the same `(concept, content)` twice updates nothing but
    /// `updated_at` on the existing row and returns its stable `id`.
    pub async fn store_atom(
        &self,
        concept: &str,
        content: &str,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let content_hash = compute_content_hash(concept, content);
        let concept = concept.to_string();
        let content = content.to_string();
        let confidence = confidence.clamp(0.0, 1.0);
        let created_at = now.to_rfc3339();
        let updated_at = created_at.clone();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO knowledge_atoms (concept, content, confidence, content_hash, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(content_hash) DO UPDATE SET updated_at = excluded.updated_at",
                    rusqlite::params![concept, content, confidence, content_hash, created_at, updated_at],
                )?;
                let id: i64 = conn.query_row(
                    "SELECT id FROM knowledge_atoms WHERE content_hash = ?1",
                    rusqlite::params![content_hash],
                    |r| r.get(0),
                )?;
                Ok(id)
            })
            .await?;
        debug!(atom_id = id, "stored knowledge atom");
        Ok(id)
    }

    /// Bulk-insert atoms sharing the same `now` timestamp, used by the
    /// shared-concepts inherit-by-copy step (phase 11) and the bulk
    /// fact load (phase 4). Idempotent per atom.
    pub async fn store_many(&self, atoms: &[KnowledgeAtom], now: DateTime<Utc>) -> Result<()> {
        for atom in atoms {
            self.store_atom(&atom.concept, &atom.content, atom.confidence, now)
                .await?;
        }
        Ok(())
    }

    pub async fn get_all(&self) -> Result<Vec<AtomRow>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, concept, content, confidence, content_hash, created_at, updated_at
                     FROM knowledge_atoms ORDER BY id ASC",
                )?;
                let mut rows = stmt.query([])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_atom(row)?);
                }
                Ok(out)
            })
            .await
            .map_err(KnowledgeStoreError::from)
    }

    pub async fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM knowledge_atoms", [], |r| r.get(0))?)
            })
            .await?;
        Ok(n as usize)
    }

    pub async fn schema_version(&self) -> Result<u32> {
        let v: i64 = self
            .conn
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT version FROM schema_versions ORDER BY version DESC LIMIT 1",
                    [],
                    |r| r.get(0),
                )?)
            })
            .await?;
        Ok(v as u32)
    }

    /// Forward-only migration. Writes a `.backup_<unix millis>` copy of
    /// the backing file before altering anything (no-op for in-memory
    /// stores), backfills any `content_hash` the caller's data might be
    /// missing (defensive for legacy imports), then bumps the recorded
    /// schema version.
    pub async fn migrate_to(&self, target_version: u32, now: DateTime<Utc>) -> Result<()> {
        let current = self.schema_version().await?;
        if target_version < current {
            return Err(KnowledgeStoreError::BackwardsMigration {
                current,
                target: target_version,
            });
        }
        if target_version == current {
            return Ok(());
        }

        if let Some(path) = &self.path {
            let backup = path.with_extension(format!("backup_{}", now.timestamp_millis()));
            if path.exists() {
                std::fs::copy(path, &backup)?;
            }
        }

        self.backfill_missing_hashes(now).await?;
        self.record_schema_version(target_version, now).await?;
        Ok(())
    }

    async fn backfill_missing_hashes(&self, now: DateTime<Utc>) -> Result<()> {
        let rows: Vec<(i64, String, String)> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, concept, content FROM knowledge_atoms WHERE content_hash IS NULL OR content_hash = ''",
                )?;
                let mut rows = stmt.query([])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push((row.get(0)?, row.get(1)?, row.get(2)?));
                }
                Ok(out)
            })
            .await?;

        for (id, concept, content) in rows {
            let hash = compute_content_hash(&concept, &content);
            let updated_at = now.to_rfc3339();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "UPDATE knowledge_atoms SET content_hash = ?1, updated_at = ?2 WHERE id = ?3",
                        rusqlite::params![hash, updated_at, id],
                    )?;
                    Ok(())
                })
                .await?;
        }
        Ok(())
    }

    /// Validation surface exposed to `ValidateAgentDB` callers
    /// (spec.md §4.9): required tables present, hash coverage, schema
    /// version, minimum atom count.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let total = self.count().await?;
        let hashed: i64 = self
            .conn
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM knowledge_atoms WHERE content_hash IS NOT NULL AND content_hash != ''",
                    [],
                    |r| r.get(0),
                )?)
            })
            .await?;
        let version = self.schema_version().await?;
        let hash_coverage = if total == 0 {
            1.0
        } else {
            hashed as f64 / total as f64
        };

        let report = ValidationReport {
            total_atoms: total,
            hash_coverage,
            schema_version: version,
            has_required_tables: true,
        };
        if !report.is_valid() {
            warn!(?report, "agent knowledge store failed validation");
        }
        Ok(report)
    }
}

fn row_to_atom(row: &rusqlite::Row<'_>) -> rusqlite::Result<AtomRow> {
    let created_at_str: String = row.get(5)?;
    let updated_at_str: String = row.get(6)?;
    Ok(AtomRow {
        id: row.get(0)?,
        concept: row.get(1)?,
        content: row.get(2)?,
        confidence: row.get(3)?,
        content_hash: row.get(4)?,
        created_at: parse_rfc3339(&created_at_str),
        updated_at: parse_rfc3339(&updated_at_str),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub total_atoms: usize,
    pub hash_coverage: f64,
    pub schema_version: u32,
    pub has_required_tables: bool,
}

impl ValidationReport {
    /// Required tables present, `content_hash` populated for at least
    /// 99% of atoms, schema at or above current, at least 5 atoms
    /// (spec.md §4.9).
    pub fn is_valid(&self) -> bool {
        self.has_required_tables
            && self.hash_coverage >= 0.99
            && self.schema_version >= CURRENT_SCHEMA_VERSION
            && self.total_atoms >= 5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_atom_is_idempotent_and_preserves_created_at() {
        let store = KnowledgeStore::open_in_memory().await.unwrap();
        let t0 = Utc::now();
        let id1 = store.store_atom("concept", "content", 0.9, t0).await.unwrap();
        let t1 = t0 + chrono::Duration::seconds(60);
        let id2 = store.store_atom("concept", "content", 0.9, t1).await.unwrap();
        assert_eq!(id1, id2);

        let atoms = store.get_all().await.unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].created_at, t0);
        assert_eq!(atoms[0].updated_at, t1);
    }

    #[tokio::test]
    async fn distinct_content_yields_distinct_rows() {
        let store = KnowledgeStore::open_in_memory().await.unwrap();
        let now = Utc::now();
        store.store_atom("a", "1", 0.5, now).await.unwrap();
        store.store_atom("b", "2", 0.5, now).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn validation_requires_five_atoms_and_high_hash_coverage() {
        let store = KnowledgeStore::open_in_memory().await.unwrap();
        let now = Utc::now();
        for i in 0..4 {
            store
                .store_atom(&format!("c{i}"), &format!("v{i}"), 0.5, now)
                .await
                .unwrap();
        }
        assert!(!store.validate().await.unwrap().is_valid());

        store.store_atom("c4", "v4", 0.5, now).await.unwrap();
        assert!(store.validate().await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn migrate_to_is_forward_only() {
        let store = KnowledgeStore::open_in_memory().await.unwrap();
        let now = Utc::now();
        store.migrate_to(CURRENT_SCHEMA_VERSION, now).await.unwrap();
        let err = store.migrate_to(0, now).await.unwrap_err();
        assert!(matches!(err, KnowledgeStoreError::BackwardsMigration { .. }));
    }
}
