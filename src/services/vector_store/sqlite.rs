//! SQLite vector store backend.
//!
//! Records live in one table keyed by `(collection, id)`, embeddings as
//! little-endian f32 blobs. Similarity is computed in process after the
//! label filter has been applied in SQL.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use tracing::debug;

use super::{VectorStore, check_query, decode_vector, encode_vector, top_k, validate_batch};
use crate::error::VectorStoreError;
use crate::models::{LabelCount, LabelDistribution, LabelFilter, Record, ScoredRecord};

pub const STORE_FILE: &str = "store.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER,
    fingerprint TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    id TEXT NOT NULL,
    document TEXT NOT NULL,
    label TEXT NOT NULL,
    embedding BLOB NOT NULL,
    UNIQUE (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_records_label ON records(collection, label);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    collection: String,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) `<dir>/store.db` and the named collection in it.
    pub fn open(dir: &Path, collection: &str) -> Result<Self, VectorStoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);

        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;

        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![collection, now],
        )?;

        debug!(path = %path.display(), collection, "opened sqlite store");

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            path,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, VectorStoreError> {
        self.conn
            .lock()
            .map_err(|_| VectorStoreError::CollectionError("store lock poisoned".to_string()))
    }

    fn conn_mut(conn: &mut Mutex<Connection>) -> Result<&mut Connection, VectorStoreError> {
        conn.get_mut()
            .map_err(|_| VectorStoreError::CollectionError("store lock poisoned".to_string()))
    }

    fn load_records(
        &self,
        filter: &LabelFilter,
        dimension: usize,
    ) -> Result<Vec<Record>, VectorStoreError> {
        let labels = filter.labels();
        let clause = match filter {
            _ if filter.is_unrestricted() => String::new(),
            LabelFilter::Exactly(_) => " AND label = ?2".to_string(),
            _ => {
                let placeholders: Vec<String> =
                    (0..labels.len()).map(|i| format!("?{}", i + 2)).collect();
                format!(" AND label IN ({})", placeholders.join(", "))
            }
        };
        let sql = format!(
            "SELECT id, document, label, embedding FROM records \
             WHERE collection = ?1{clause} ORDER BY seq ASC"
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(std::iter::once(self.collection.as_str()).chain(labels)),
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            },
        )?;

        let mut records = Vec::new();
        for row in rows {
            let (id, document, label, blob) = row?;
            records.push(Record {
                vector: decode_vector(&blob, dimension)?,
                id,
                document,
                label,
            });
        }
        Ok(records)
    }
}

impl VectorStore for SqliteStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn location(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn count(&self) -> Result<usize, VectorStoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn dimension(&self) -> Result<Option<usize>, VectorStoreError> {
        let conn = self.lock()?;
        let dimension: Option<i64> = conn
            .query_row(
                "SELECT dimension FROM collections WHERE name = ?1",
                params![self.collection],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
        Ok(dimension.map(|d| d as usize))
    }

    fn clear(&mut self) -> Result<(), VectorStoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = Self::conn_mut(&mut self.conn)?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![self.collection],
        )?;
        tx.execute(
            "UPDATE collections SET dimension = NULL, fingerprint = NULL, updated_at = ?2 \
             WHERE name = ?1",
            params![self.collection, now],
        )?;
        tx.commit()?;

        debug!(collection = %self.collection, removed, "cleared collection");
        Ok(())
    }

    fn insert_batch(&mut self, records: Vec<Record>) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let existing = self.dimension()?;
        let dimension = validate_batch(&records, existing)?;
        let now = chrono::Utc::now().to_rfc3339();

        let conn = Self::conn_mut(&mut self.conn)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO records (collection, id, document, label, embedding) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in &records {
                stmt.execute(params![
                    self.collection,
                    record.id,
                    record.document,
                    record.label,
                    encode_vector(&record.vector),
                ])
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(ref err, _)
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        VectorStoreError::DuplicateId(record.id.clone())
                    }
                    other => VectorStoreError::Sqlite(other),
                })?;
            }
        }
        tx.execute(
            "UPDATE collections SET dimension = ?2, updated_at = ?3 WHERE name = ?1",
            params![self.collection, dimension as i64, now],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &LabelFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let Some(dimension) = self.dimension()? else {
            return Ok(Vec::new());
        };
        check_query(vector, Some(dimension))?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.load_records(filter, dimension)?;
        Ok(top_k(vector, candidates, k))
    }

    fn records(&self) -> Result<Vec<Record>, VectorStoreError> {
        match self.dimension()? {
            Some(dimension) => self.load_records(&LabelFilter::Any, dimension),
            None => Ok(Vec::new()),
        }
    }

    fn label_counts(&self) -> Result<LabelDistribution, VectorStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT label, COUNT(*) FROM records WHERE collection = ?1 \
             GROUP BY label ORDER BY MIN(seq)",
        )?;
        let counts = stmt
            .query_map(params![self.collection], |row| {
                Ok(LabelCount {
                    label: row.get(0)?,
                    count: row.get::<_, i64>(1)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LabelDistribution { counts })
    }

    fn fingerprint(&self) -> Result<Option<String>, VectorStoreError> {
        let conn = self.lock()?;
        let fingerprint: Option<String> = conn
            .query_row(
                "SELECT fingerprint FROM collections WHERE name = ?1",
                params![self.collection],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(fingerprint)
    }

    fn set_fingerprint(&mut self, fingerprint: &str) -> Result<(), VectorStoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = Self::conn_mut(&mut self.conn)?;
        conn.execute(
            "UPDATE collections SET fingerprint = ?2, updated_at = ?3 WHERE name = ?1",
            params![self.collection, fingerprint, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{exercise_contract, record};
    use super::*;

    #[test]
    fn test_sqlite_contract() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path(), "comments").unwrap();
        exercise_contract(&mut store);
    }

    #[test]
    fn test_reopen_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SqliteStore::open(dir.path(), "comments").unwrap();
            store
                .insert_batch(vec![
                    record(0, &[1.0, 0.0], "Positive"),
                    record(1, &[0.0, 1.0], "Negative"),
                ])
                .unwrap();
            store.set_fingerprint("f00d").unwrap();
        }

        let store = SqliteStore::open(dir.path(), "comments").unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.dimension().unwrap(), Some(2));
        assert_eq!(store.fingerprint().unwrap().as_deref(), Some("f00d"));

        let hits = store.query(&[0.0, 1.0], 1, &LabelFilter::Any).unwrap();
        assert_eq!(hits[0].record.id, "comment_1");
        assert_eq!(hits[0].record.document, "comment 1");
    }

    #[test]
    fn test_empty_label_set_matches_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path(), "comments").unwrap();
        store
            .insert_batch(vec![
                record(0, &[1.0, 0.0], "Positive"),
                record(1, &[0.0, 1.0], "Negative"),
            ])
            .unwrap();

        let filter = LabelFilter::OneOf(Default::default());
        let hits = store.query(&[1.0, 0.0], 5, &filter).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "comment_0");
    }

    #[test]
    fn test_collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = SqliteStore::open(dir.path(), "first").unwrap();
        first
            .insert_batch(vec![record(0, &[1.0, 0.0], "Positive")])
            .unwrap();
        drop(first);

        let mut second = SqliteStore::open(dir.path(), "second").unwrap();
        assert_eq!(second.count().unwrap(), 0);
        second
            .insert_batch(vec![record(0, &[1.0, 0.0, 0.0], "Positive")])
            .unwrap();
        assert_eq!(second.dimension().unwrap(), Some(3));

        let first = SqliteStore::open(dir.path(), "first").unwrap();
        assert_eq!(first.dimension().unwrap(), Some(2));
    }

    #[test]
    fn test_failed_batch_leaves_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path(), "comments").unwrap();
        store
            .insert_batch(vec![record(3, &[1.0, 0.0], "Positive")])
            .unwrap();

        let err = store
            .insert_batch(vec![
                record(0, &[1.0, 0.0], "Positive"),
                record(1, &[1.0, 0.0], "Positive"),
                record(3, &[1.0, 0.0], "Positive"),
            ])
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::DuplicateId(ref id) if id == "comment_3"));

        let ids: Vec<String> = store.records().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["comment_3"]);
    }
}
