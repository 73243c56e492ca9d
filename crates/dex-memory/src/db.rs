use crate::types::{cosine_similarity, Embedder, MemoryEntry, MemoryError, MemoryResult, MemorySearchResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Two tables: `memory` (durable, embedding-indexed notes) and
/// `session_context` (short-lived key-value state). A single writer
/// connection; readers use the same handle since rusqlite serializes
/// access per-connection anyway.
pub struct MemoryStore {
    conn: Arc<Mutex<Connection>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl MemoryStore {
    pub fn open(path: &Path, embedder: Option<Arc<dyn Embedder>>) -> MemoryResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(10))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                timestamp TEXT NOT NULL,
                embedding BLOB
            );
            CREATE TABLE IF NOT EXISTS session_context (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)), embedder })
    }

    fn with_conn<T, F>(&self, f: F) -> MemoryResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| MemoryError::Lock("memory connection poisoned".into()))?;
        f(&conn).map_err(MemoryError::from)
    }

    pub async fn store(&self, content: impl Into<String>, metadata: Value) -> MemoryResult<i64> {
        let content = content.into();
        let embedding = match &self.embedder {
            Some(embedder) => embedder.embed(&content).ok(),
            None => None,
        };
        let embedding_blob = embedding.map(|v| v.iter().flat_map(|f| f.to_le_bytes()).collect::<Vec<u8>>());
        let metadata_json = serde_json::to_string(&metadata)?;
        let timestamp = chrono::Utc::now().to_rfc3339();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO memory (content, metadata, timestamp, embedding) VALUES (?1, ?2, ?3, ?4)",
                params![content, metadata_json, timestamp, embedding_blob],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Substring search, newest-first. Used directly, or as the fallback
    /// path for `search_semantic` when no embedder is configured.
    pub async fn search(&self, query: &str, limit: usize) -> MemoryResult<Vec<MemoryEntry>> {
        let pattern = format!("%{query}%");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, metadata, timestamp FROM memory
                 WHERE content LIKE ?1 ORDER BY timestamp DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![pattern, limit as i64], row_to_entry)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    /// Cosine-similarity scan over rows with a non-null embedding. Falls
    /// back to substring search when no embedder is configured for this
    /// store (the caller never has to branch on embedder availability).
    pub async fn search_semantic(&self, query: &str, limit: usize) -> MemoryResult<Vec<MemorySearchResult>> {
        let Some(embedder) = &self.embedder else {
            return Ok(self
                .search(query, limit)
                .await?
                .into_iter()
                .map(|entry| MemorySearchResult { entry, score: 0.0 })
                .collect());
        };

        let query_embedding = embedder.embed(query).map_err(|e| MemoryError::Embedding(e.to_string()))?;

        let rows: Vec<(MemoryEntry, Vec<u8>)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, metadata, timestamp, embedding FROM memory WHERE embedding IS NOT NULL",
            )?;
            let rows = stmt.query_map([], |row| {
                let entry = row_to_entry(row)?;
                let blob: Vec<u8> = row.get(4)?;
                Ok((entry, blob))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        let mut scored: Vec<MemorySearchResult> = rows
            .into_iter()
            .map(|(entry, blob)| {
                let embedding = bytes_to_f32(&blob);
                let score = cosine_similarity(&query_embedding, &embedding);
                MemorySearchResult { entry, score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    pub async fn set_session_context(&self, key: &str, value: Value) -> MemoryResult<()> {
        let value_json = serde_json::to_string(&value)?;
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_context (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value_json, updated_at],
            )?;
            Ok(())
        })
    }

    pub async fn get_session_context(&self, key: &str) -> MemoryResult<Option<Value>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM session_context WHERE key = ?1", params![key], |row| {
                let raw: String = row.get(0)?;
                Ok(raw)
            })
            .optional()
        })?
        .map(|raw| serde_json::from_str(&raw).map_err(MemoryError::from))
        .transpose()
    }

    pub async fn get_all_session_context(&self) -> MemoryResult<std::collections::HashMap<String, Value>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM session_context")?;
            let rows = stmt.query_map([], |row| {
                let key: String = row.get(0)?;
                let raw: String = row.get(1)?;
                Ok((key, raw))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?
        .into_iter()
        .map(|(key, raw)| serde_json::from_str(&raw).map(|v| (key, v)).map_err(MemoryError::from))
        .collect()
    }

    pub async fn prune_old_memories(&self, days: i64) -> MemoryResult<usize> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM memory WHERE timestamp < ?1", params![cutoff])?;
            Ok(changed)
        })
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<MemoryEntry> {
    let id: i64 = row.get(0)?;
    let content: String = row.get(1)?;
    let metadata_raw: String = row.get(2)?;
    let timestamp_raw: String = row.get(3)?;
    let metadata = serde_json::from_str(&metadata_raw).unwrap_or(Value::Null);
    let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());
    Ok(MemoryEntry { id, content, metadata, timestamp })
}

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedEmbedder(Vec<f32>);

    impl Embedder for FixedEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn store_and_substring_search_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&dir.path().join("memory.db"), None).unwrap();
        store.store("Remember to water the plants", json!({})).await.unwrap();
        store.store("Unrelated entry", json!({})).await.unwrap();

        let results = store.search("water", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("water"));
    }

    #[tokio::test]
    async fn semantic_search_falls_back_without_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&dir.path().join("memory.db"), None).unwrap();
        store.store("Remember to water the plants", json!({})).await.unwrap();
        let results = store.search_semantic("water", 5).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn semantic_search_ranks_by_cosine_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(FixedEmbedder(vec![1.0, 0.0]));
        let store = MemoryStore::open(&dir.path().join("memory.db"), Some(embedder)).unwrap();
        store.store("entry one", json!({})).await.unwrap();
        let results = store.search_semantic("query", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn session_context_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&dir.path().join("memory.db"), None).unwrap();
        store.set_session_context("mode", json!("focus")).await.unwrap();
        let value = store.get_session_context("mode").await.unwrap();
        assert_eq!(value, Some(json!("focus")));
    }

    #[tokio::test]
    async fn prune_removes_entries_older_than_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&dir.path().join("memory.db"), None).unwrap();
        store.store("old enough to prune", json!({})).await.unwrap();
        store.with_conn(|conn| {
            conn.execute("UPDATE memory SET timestamp = '2000-01-01T00:00:00+00:00'", [])
        }).unwrap();
        let pruned = store.prune_old_memories(30).await.unwrap();
        assert_eq!(pruned, 1);
    }
}
