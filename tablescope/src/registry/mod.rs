//! Durable vector registry: profile summaries, conversation turns, and novel
//! patterns stored with fixed-dimension embeddings.
//!
//! The registry is one SQLite database with four tables. Every
//! embedding-bearing row keeps its vector as JSON so brute-force cosine
//! search always works; when the in-process HNSW index builds successfully,
//! approximate search takes over and the JSON column becomes the fallback
//! path. If stored vectors were produced at a different dimension than the
//! live embedder, the embedding-bearing tables are dropped and recreated,
//! to be repopulated on the next write.

pub mod embedding;

use std::sync::Mutex;

use chrono::Utc;
use hnsw_rs::prelude::*;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, TablescopeError};
use crate::profile::DataProfile;

pub use embedding::{
    cosine_distance, Embedder, EmbedderFactory, EmbeddingService, HashEmbedder,
    HASH_EMBEDDING_DIM,
};

const DEFAULT_SEARCH_TOP_K: usize = 6;
const DEFAULT_CONTEXT_TOP_K: usize = 5;
const MAX_INSIGHT_ROWS: usize = 20;
const PATTERN_MATCH_MAX_DISTANCE: f32 = 0.3;

const HNSW_MAX_CONNECTIONS: usize = 16;
const HNSW_MAX_LAYERS: usize = 16;
const HNSW_EF_CONSTRUCTION: usize = 200;
const HNSW_EF_SEARCH: usize = 64;

/// Kind of a registry embedding row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    Summary,
    Column,
    Insight,
}

impl RegistryKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Column => "column",
            Self::Insight => "insight",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "summary" => Self::Summary,
            "column" => Self::Column,
            _ => Self::Insight,
        }
    }
}

/// One search hit from the registry. Lower score is better; it is the L2/
/// cosine distance reported by whichever search path served the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub file_path: String,
    pub label: String,
    pub kind: RegistryKind,
    pub metadata: serde_json::Value,
    pub score: f32,
}

/// One conversation turn, chronological within its session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub turn_id: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// A novel pattern worth remembering across profiling runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelPatternRecord {
    pub pattern_name: String,
    pub column_name: String,
    pub file_path: String,
    pub pattern_type: String,
    pub detected_regex: Option<String>,
    pub improved_regex: Option<String>,
    pub description: String,
    pub examples: Vec<String>,
    pub match_percent: f64,
    pub is_identifier: bool,
    pub is_sensitive: bool,
    pub validation_rules: Vec<String>,
}

struct AnnIndex {
    index: Hnsw<'static, f32, DistCosine>,
    /// Maps HNSW data ids (positions) back to embedding row ids.
    ids: Vec<i64>,
}

impl AnnIndex {
    fn build(rows: &[(i64, Vec<f32>)], dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(TablescopeError::registry("zero embedding dimension"));
        }
        let capacity = rows.len().max(16);
        let index = Hnsw::<f32, DistCosine>::new(
            HNSW_MAX_CONNECTIONS,
            capacity,
            HNSW_MAX_LAYERS,
            HNSW_EF_CONSTRUCTION,
            DistCosine {},
        );
        let mut ids = Vec::with_capacity(rows.len());
        for (row_id, vector) in rows {
            index.insert_slice((vector.as_slice(), ids.len()));
            ids.push(*row_id);
        }
        Ok(Self { index, ids })
    }

    fn search(&self, query: &[f32], top_k: usize) -> Vec<(i64, f32)> {
        self.index
            .search(query, top_k, HNSW_EF_SEARCH)
            .into_iter()
            .filter_map(|n| self.ids.get(n.d_id).map(|id| (*id, n.distance)))
            .collect()
    }
}

/// The embedded vector registry. Owns its database connection; all
/// operations serialize through it.
pub struct VectorStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
    ann: Mutex<Option<AnnIndex>>,
    use_ann: bool,
}

impl VectorStore {
    /// Opens (or creates) the registry database at `path`.
    #[instrument(skip(service))]
    pub async fn open(path: &str, service: &EmbeddingService) -> Result<Self> {
        let embedder = service.get().await;
        let conn = Connection::open(path)?;
        Self::init(conn, embedder)
    }

    /// In-memory registry for tests.
    pub async fn in_memory(service: &EmbeddingService) -> Result<Self> {
        let embedder = service.get().await;
        let conn = Connection::open_in_memory()?;
        Self::init(conn, embedder)
    }

    fn init(conn: Connection, embedder: Arc<dyn Embedder>) -> Result<Self> {
        create_schema(&conn)?;
        migrate_dimension(&conn, embedder.dimension())?;

        let mut store = Self {
            conn: Mutex::new(conn),
            embedder,
            ann: Mutex::new(None),
            use_ann: true,
        };

        match store.rebuild_ann() {
            Ok(()) => {
                info!(dim = store.embedder.dimension(), "vector registry ready (ann index)");
            }
            Err(e) => {
                warn!(error = %e, "ann index unavailable, using brute-force search");
                store.use_ann = false;
            }
        }
        Ok(store)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TablescopeError::registry("registry connection lock poisoned"))
    }

    fn rebuild_ann(&self) -> Result<()> {
        let rows: Vec<(i64, Vec<f32>)> = {
            let conn = self.lock_conn()?;
            let mut stmt = conn.prepare("SELECT id, embedding_json FROM registry_embeddings")?;
            let mapped = stmt.query_map([], |row| {
                let id: i64 = row.get(0)?;
                let json: String = row.get(1)?;
                Ok((id, json))
            })?;
            let mut rows = Vec::new();
            for item in mapped {
                let (id, json) = item?;
                let vector: Vec<f32> = serde_json::from_str(&json)?;
                rows.push((id, vector));
            }
            rows
        };

        let index = AnnIndex::build(&rows, self.embedder.dimension())?;
        *self
            .ann
            .lock()
            .map_err(|_| TablescopeError::registry("ann index lock poisoned"))? = Some(index);
        Ok(())
    }

    /// Upserts the cached profile row for a file path.
    pub async fn upsert_profile(
        &self,
        profile: &DataProfile,
        content_hash: Option<&str>,
        file_size: Option<u64>,
    ) -> Result<()> {
        let payload = serde_json::to_string(profile)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO registry_files (file_path, content_hash, file_size, profile_json, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(file_path) DO UPDATE SET \
                 content_hash = excluded.content_hash, \
                 file_size = excluded.file_size, \
                 profile_json = excluded.profile_json, \
                 updated_at = excluded.updated_at",
            params![
                profile.source_path,
                content_hash,
                file_size.map(|s| s as i64),
                payload,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Returns the cached profile only when the stored content hash matches
    /// the caller's current hash.
    pub async fn get_cached_profile(
        &self,
        file_path: &str,
        current_hash: &str,
    ) -> Result<Option<DataProfile>> {
        let row: Option<(Option<String>, String)> = {
            let conn = self.lock_conn()?;
            conn.query_row(
                "SELECT content_hash, profile_json FROM registry_files WHERE file_path = ?1",
                params![file_path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        match row {
            Some((Some(stored_hash), payload)) if stored_hash == current_hash => {
                Ok(Some(serde_json::from_str(&payload)?))
            }
            _ => Ok(None),
        }
    }

    /// Replaces all embedding rows for a profile's path: one summary row, one
    /// row per column, and up to 20 insight rows.
    #[instrument(skip(self, profile), fields(source = %profile.source_path))]
    pub async fn upsert_embeddings(&self, profile: &DataProfile) -> Result<()> {
        let mut texts: Vec<(String, RegistryKind, serde_json::Value, String)> = Vec::new();

        texts.push((
            profile.source_path.clone(),
            RegistryKind::Summary,
            serde_json::json!({
                "rows": profile.row_count,
                "columns": profile.column_count,
            }),
            profile.summary_text(),
        ));
        for column in &profile.columns {
            texts.push((
                column.name.clone(),
                RegistryKind::Column,
                serde_json::json!({
                    "column": column.name,
                    "type": column.inferred_type.as_str(),
                }),
                column.summary_sentence(),
            ));
        }
        for insight in profile.insights.iter().take(MAX_INSIGHT_ROWS) {
            texts.push((
                insight.title.clone(),
                RegistryKind::Insight,
                serde_json::json!({ "source": insight.source }),
                format!("{} {}", insight.title, insight.description),
            ));
        }

        let sentences: Vec<String> = texts.iter().map(|(_, _, _, text)| text.clone()).collect();
        let vectors = self.embedder.embed_batch(&sentences).await?;

        {
            let conn = self.lock_conn()?;
            conn.execute(
                "DELETE FROM registry_embeddings WHERE file_path = ?1",
                params![profile.source_path],
            )?;
            for ((label, kind, metadata, _), vector) in texts.iter().zip(&vectors) {
                conn.execute(
                    "INSERT INTO registry_embeddings (file_path, label, kind, metadata, embedding_json) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        profile.source_path,
                        label,
                        kind.as_str(),
                        metadata.to_string(),
                        serde_json::to_string(vector)?,
                    ],
                )?;
            }
        }

        if self.use_ann {
            if let Err(e) = self.rebuild_ann() {
                debug!(error = %e, "ann rebuild failed after upsert");
            }
        }
        debug!(rows = texts.len(), "registry embeddings replaced");
        Ok(())
    }

    /// Nearest registry rows for a query. Score is a distance: lower is better.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let top_k = if top_k == 0 { DEFAULT_SEARCH_TOP_K } else { top_k };
        let query_vec = self.embedder.embed(query).await?;

        let scored: Vec<(i64, f32)> = if self.use_ann {
            let guard = self
                .ann
                .lock()
                .map_err(|_| TablescopeError::registry("ann index lock poisoned"))?;
            match guard.as_ref() {
                Some(index) => index.search(&query_vec, top_k),
                None => self.brute_force_ids(&query_vec, top_k)?,
            }
        } else {
            self.brute_force_ids(&query_vec, top_k)?
        };

        let conn = self.lock_conn()?;
        let mut hits = Vec::with_capacity(scored.len());
        for (id, score) in scored {
            let row = conn
                .query_row(
                    "SELECT file_path, label, kind, metadata FROM registry_embeddings WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;
            if let Some((file_path, label, kind, metadata)) = row {
                hits.push(SearchHit {
                    file_path,
                    label,
                    kind: RegistryKind::parse(&kind),
                    metadata: serde_json::from_str(&metadata)
                        .unwrap_or(serde_json::Value::Null),
                    score,
                });
            }
        }
        hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    fn brute_force_ids(&self, query: &[f32], top_k: usize) -> Result<Vec<(i64, f32)>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, embedding_json FROM registry_embeddings")?;
        let mapped = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut scored = Vec::new();
        for item in mapped {
            let (id, json) = item?;
            let vector: Vec<f32> = serde_json::from_str(&json)?;
            scored.push((id, cosine_distance(query, &vector)));
        }
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Appends a turn to a session; `turn_id` is strictly increasing per
    /// session. Returns the assigned id.
    pub async fn append_conversation_turn(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<i64> {
        let vector = self.embedder.embed(content).await?;
        let conn = self.lock_conn()?;
        let turn_id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(turn_id), 0) + 1 FROM registry_conversations WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO registry_conversations \
             (session_id, turn_id, role, content, embedding_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                turn_id,
                role,
                content,
                serde_json::to_string(&vector)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(turn_id)
    }

    /// Turns of a session nearest to the query, ties broken most-recent-first.
    pub async fn get_conversation_context(
        &self,
        session_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let top_k = if top_k == 0 { DEFAULT_CONTEXT_TOP_K } else { top_k };
        let query_vec = self.embedder.embed(query).await?;

        let mut turns: Vec<(ConversationTurn, f32)> = {
            let conn = self.lock_conn()?;
            let mut stmt = conn.prepare(
                "SELECT session_id, turn_id, role, content, embedding_json, created_at \
                 FROM registry_conversations WHERE session_id = ?1",
            )?;
            let mapped = stmt.query_map(params![session_id], |row| {
                Ok((
                    ConversationTurn {
                        session_id: row.get(0)?,
                        turn_id: row.get(1)?,
                        role: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(5)?,
                    },
                    row.get::<_, String>(4)?,
                ))
            })?;
            let mut turns = Vec::new();
            for item in mapped {
                let (turn, json) = item?;
                let vector: Vec<f32> = serde_json::from_str(&json)?;
                turns.push((turn, cosine_distance(&query_vec, &vector)));
            }
            turns
        };

        turns.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.0.turn_id.cmp(&a.0.turn_id))
        });
        Ok(turns.into_iter().take(top_k).map(|(t, _)| t).collect())
    }

    /// Inserts or updates a pattern record keyed by `(column_name, file_path)`.
    pub async fn upsert_novel_pattern(&self, record: &NovelPatternRecord) -> Result<()> {
        let text = format!(
            "{} {} {}",
            record.pattern_name,
            record.description,
            record.examples.join(" ")
        );
        let vector = self.embedder.embed(&text).await?;

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO registry_patterns \
             (pattern_name, column_name, file_path, pattern_type, detected_regex, improved_regex, \
              description, examples, match_percent, is_identifier, is_sensitive, validation_rules, \
              embedding_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
             ON CONFLICT(column_name, file_path) DO UPDATE SET \
                 pattern_name = excluded.pattern_name, \
                 pattern_type = excluded.pattern_type, \
                 detected_regex = excluded.detected_regex, \
                 improved_regex = excluded.improved_regex, \
                 description = excluded.description, \
                 examples = excluded.examples, \
                 match_percent = excluded.match_percent, \
                 is_identifier = excluded.is_identifier, \
                 is_sensitive = excluded.is_sensitive, \
                 validation_rules = excluded.validation_rules, \
                 embedding_json = excluded.embedding_json",
            params![
                record.pattern_name,
                record.column_name,
                record.file_path,
                record.pattern_type,
                record.detected_regex,
                record.improved_regex,
                record.description,
                serde_json::to_string(&record.examples)?,
                record.match_percent,
                record.is_identifier,
                record.is_sensitive,
                serde_json::to_string(&record.validation_rules)?,
                serde_json::to_string(&vector)?,
            ],
        )?;
        Ok(())
    }

    /// Nearest stored patterns for a text query.
    pub async fn search_patterns(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(NovelPatternRecord, f32)>> {
        let query_vec = self.embedder.embed(query).await?;
        let mut scored = self.all_patterns_scored(&query_vec)?;
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Best stored pattern whose embedding lies within `max_distance` of the
    /// given example values, if any.
    pub async fn find_matching_pattern(
        &self,
        examples: &[String],
        max_distance: Option<f32>,
    ) -> Result<Option<(NovelPatternRecord, f32)>> {
        let max_distance = max_distance.unwrap_or(PATTERN_MATCH_MAX_DISTANCE);
        let query_vec = self.embedder.embed(&examples.join(" ")).await?;
        let scored = self.all_patterns_scored(&query_vec)?;
        Ok(scored.into_iter().find(|(_, d)| *d <= max_distance))
    }

    fn all_patterns_scored(&self, query: &[f32]) -> Result<Vec<(NovelPatternRecord, f32)>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT pattern_name, column_name, file_path, pattern_type, detected_regex, \
                    improved_regex, description, examples, match_percent, is_identifier, \
                    is_sensitive, validation_rules, embedding_json \
             FROM registry_patterns",
        )?;
        let mapped = stmt.query_map([], |row| {
            Ok((
                NovelPatternRecord {
                    pattern_name: row.get(0)?,
                    column_name: row.get(1)?,
                    file_path: row.get(2)?,
                    pattern_type: row.get(3)?,
                    detected_regex: row.get(4)?,
                    improved_regex: row.get(5)?,
                    description: row.get(6)?,
                    examples: Vec::new(),
                    match_percent: row.get(8)?,
                    is_identifier: row.get(9)?,
                    is_sensitive: row.get(10)?,
                    validation_rules: Vec::new(),
                },
                row.get::<_, String>(7)?,
                row.get::<_, String>(11)?,
                row.get::<_, String>(12)?,
            ))
        })?;

        let mut scored = Vec::new();
        for item in mapped {
            let (mut record, examples_json, rules_json, embedding_json) = item?;
            record.examples = serde_json::from_str(&examples_json).unwrap_or_default();
            record.validation_rules = serde_json::from_str(&rules_json).unwrap_or_default();
            let vector: Vec<f32> = serde_json::from_str(&embedding_json)?;
            scored.push((record, cosine_distance(query, &vector)));
        }
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS registry_meta (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS registry_files (
             file_path TEXT PRIMARY KEY,
             content_hash TEXT,
             file_size INTEGER,
             profile_json TEXT NOT NULL,
             updated_at TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS registry_embeddings (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             file_path TEXT NOT NULL,
             label TEXT NOT NULL,
             kind TEXT NOT NULL,
             metadata TEXT NOT NULL DEFAULT '{}',
             embedding_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_registry_embeddings_path
             ON registry_embeddings(file_path);
         CREATE TABLE IF NOT EXISTS registry_conversations (
             session_id TEXT NOT NULL,
             turn_id INTEGER NOT NULL,
             role TEXT NOT NULL,
             content TEXT NOT NULL,
             embedding_json TEXT NOT NULL,
             created_at TEXT NOT NULL,
             PRIMARY KEY (session_id, turn_id)
         );
         CREATE TABLE IF NOT EXISTS registry_patterns (
             pattern_name TEXT NOT NULL,
             column_name TEXT NOT NULL,
             file_path TEXT NOT NULL,
             pattern_type TEXT NOT NULL,
             detected_regex TEXT,
             improved_regex TEXT,
             description TEXT NOT NULL DEFAULT '',
             examples TEXT NOT NULL DEFAULT '[]',
             match_percent REAL NOT NULL DEFAULT 0,
             is_identifier INTEGER NOT NULL DEFAULT 0,
             is_sensitive INTEGER NOT NULL DEFAULT 0,
             validation_rules TEXT NOT NULL DEFAULT '[]',
             embedding_json TEXT NOT NULL,
             PRIMARY KEY (column_name, file_path)
         );",
    )?;
    Ok(())
}

/// Drops and recreates the embedding-bearing tables when the stored
/// dimension differs from the live embedder's.
fn migrate_dimension(conn: &Connection, dimension: usize) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM registry_meta WHERE key = 'embedding_dim'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match stored {
        Some(value) if value == dimension.to_string() => Ok(()),
        Some(old) => {
            warn!(
                old = %old,
                new = dimension,
                "embedding dimension changed, dropping embedding tables"
            );
            conn.execute_batch(
                "DROP TABLE IF EXISTS registry_embeddings;
                 DROP TABLE IF EXISTS registry_conversations;
                 DROP TABLE IF EXISTS registry_patterns;",
            )?;
            create_schema(conn)?;
            conn.execute(
                "INSERT INTO registry_meta (key, value) VALUES ('embedding_dim', ?1) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![dimension.to_string()],
            )?;
            Ok(())
        }
        None => {
            conn.execute(
                "INSERT INTO registry_meta (key, value) VALUES ('embedding_dim', ?1)",
                params![dimension.to_string()],
            )?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ColumnProfile, ColumnType, ProfileInsight};
    use std::time::Duration;

    fn sample_profile() -> DataProfile {
        let mut email = ColumnProfile::minimal("email", ColumnType::Text, 100);
        email.unique_count = 100;
        let mut amount = ColumnProfile::minimal("amount", ColumnType::Numeric, 100);
        amount.mean = Some(12.5);
        amount.std_dev = Some(3.0);

        DataProfile {
            source_path: "users.csv".into(),
            row_count: 100,
            column_count: 2,
            profile_time: Duration::from_millis(3),
            columns: vec![email, amount],
            alerts: vec![],
            correlations: vec![],
            insights: vec![ProfileInsight {
                title: "amount correlates with quantity".into(),
                description: "Pearson correlation 0.92".into(),
                source: "correlation".into(),
                related_columns: vec!["amount".into()],
            }],
        }
    }

    async fn store() -> VectorStore {
        VectorStore::in_memory(&EmbeddingService::hash_only())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_cached_profile_is_hash_gated() {
        let store = store().await;
        let profile = sample_profile();
        store
            .upsert_profile(&profile, Some("aaaa"), Some(123))
            .await
            .unwrap();

        let hit = store.get_cached_profile("users.csv", "aaaa").await.unwrap();
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().row_count, 100);

        let miss = store.get_cached_profile("users.csv", "bbbb").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_upsert_embeddings_and_search() {
        let store = store().await;
        let profile = sample_profile();
        store.upsert_embeddings(&profile).await.unwrap();

        let hits = store.search("email column", 6).await.unwrap();
        assert!(!hits.is_empty());
        // The email column row should rank above the numeric column row.
        let email_rank = hits.iter().position(|h| h.label == "email");
        let amount_rank = hits.iter().position(|h| h.label == "amount");
        assert!(email_rank.unwrap() < amount_rank.unwrap_or(usize::MAX));
        // Scores ascend: lower distance is a better match.
        for pair in hits.windows(2) {
            assert!(pair[0].score <= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_upsert_embeddings_replaces_rows() {
        let store = store().await;
        let profile = sample_profile();
        store.upsert_embeddings(&profile).await.unwrap();
        store.upsert_embeddings(&profile).await.unwrap();

        let hits = store.search("users.csv dataset", 20).await.unwrap();
        let summaries = hits
            .iter()
            .filter(|h| h.kind == RegistryKind::Summary)
            .count();
        assert_eq!(summaries, 1, "delete-then-insert must not duplicate rows");
    }

    #[tokio::test]
    async fn test_conversation_turn_ids_are_monotonic() {
        let store = store().await;
        let t1 = store
            .append_conversation_turn("s1", "user", "profile the orders file")
            .await
            .unwrap();
        let t2 = store
            .append_conversation_turn("s1", "assistant", "profiled 10 columns")
            .await
            .unwrap();
        let other = store
            .append_conversation_turn("s2", "user", "unrelated session")
            .await
            .unwrap();

        assert_eq!(t1, 1);
        assert_eq!(t2, 2);
        assert_eq!(other, 1, "sequences are per session");
    }

    #[tokio::test]
    async fn test_conversation_context_scoped_to_session() {
        let store = store().await;
        store
            .append_conversation_turn("s1", "user", "null rates in the orders table")
            .await
            .unwrap();
        store
            .append_conversation_turn("s2", "user", "null rates in the orders table")
            .await
            .unwrap();

        let context = store
            .get_conversation_context("s1", "orders null rates", 5)
            .await
            .unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].session_id, "s1");
    }

    #[tokio::test]
    async fn test_novel_pattern_upsert_updates_in_place() {
        let store = store().await;
        let mut record = NovelPatternRecord {
            pattern_name: "order-code".into(),
            column_name: "code".into(),
            file_path: "orders.csv".into(),
            pattern_type: "novel".into(),
            detected_regex: Some(r"^[a-zA-Z]+[^a-zA-Z0-9\s]+[0-9]+$".into()),
            improved_regex: None,
            description: "letters + symbols + numbers".into(),
            examples: vec!["AB-123".into(), "CD-456".into()],
            match_percent: 96.0,
            is_identifier: true,
            is_sensitive: false,
            validation_rules: vec![],
        };
        store.upsert_novel_pattern(&record).await.unwrap();

        record.match_percent = 99.0;
        store.upsert_novel_pattern(&record).await.unwrap();

        let results = store.search_patterns("order code", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.match_percent, 99.0);
        assert_eq!(results[0].0.examples.len(), 2);
    }

    #[tokio::test]
    async fn test_find_matching_pattern_respects_distance() {
        let store = store().await;
        let record = NovelPatternRecord {
            pattern_name: "order-code".into(),
            column_name: "code".into(),
            file_path: "orders.csv".into(),
            pattern_type: "novel".into(),
            detected_regex: None,
            improved_regex: None,
            description: "letters + symbols + numbers".into(),
            examples: vec!["AB-123".into(), "CD-456".into()],
            match_percent: 96.0,
            is_identifier: false,
            is_sensitive: false,
            validation_rules: vec![],
        };
        store.upsert_novel_pattern(&record).await.unwrap();

        let near = store
            .find_matching_pattern(
                &["AB-123".to_string(), "CD-456".to_string()],
                None,
            )
            .await
            .unwrap();
        assert!(near.is_some());

        let far = store
            .find_matching_pattern(&["completely unrelated text".to_string()], Some(0.05))
            .await
            .unwrap();
        assert!(far.is_none());
    }
}
