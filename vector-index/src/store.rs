use chrono::Utc;
use indexmap::IndexMap;
use persona_core::{CoreError, EmbeddingError, IndexError};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info};

/// A metadata value. There is no null: missing values are stored as `""`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<Option<String>> for MetadataValue {
    fn from(value: Option<String>) -> Self {
        MetadataValue::Text(value.unwrap_or_default())
    }
}

impl From<Option<bool>> for MetadataValue {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(flag) => MetadataValue::Bool(flag),
            None => MetadataValue::Text(String::new()),
        }
    }
}

impl From<u64> for MetadataValue {
    fn from(value: u64) -> Self {
        MetadataValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

pub type Metadata = IndexMap<String, MetadataValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// `1 - cosine similarity`; smaller is closer.
    pub distance: f32,
}

fn sql_error(e: sqlx::Error) -> CoreError {
    let locked = e
        .as_database_error()
        .map(|db| db.message().contains("database is locked"))
        .unwrap_or(false);
    if locked {
        CoreError::Index(IndexError::IndexLocked)
    } else {
        CoreError::Index(IndexError::Sql(e))
    }
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(id: &str, bytes: &[u8]) -> Result<Vec<f32>, CoreError> {
    if bytes.len() % 4 != 0 {
        return Err(CoreError::Index(IndexError::CorruptEntry {
            id: id.to_string(),
            reason: format!("embedding blob of {} bytes", bytes.len()),
        }));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// SQLite-backed similarity index. Rows are keyed by `(collection, id)`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    /// Open (creating if needed) the database at `database_url` and apply
    /// migrations. `sqlite::memory:` gives a private in-memory index.
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                CoreError::Index(IndexError::ConnectionFailed {
                    reason: e.to_string(),
                })
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                CoreError::Index(IndexError::ConnectionFailed {
                    reason: e.to_string(),
                })
            })?;

        let index = Self { pool };
        index.run_migrations().await?;
        info!("Vector index ready at {}", database_url);
        Ok(index)
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                CoreError::Index(IndexError::MigrationFailed {
                    migration: e.to_string(),
                })
            })
    }

    /// Insert or replace one entry.
    pub async fn upsert(&self, collection: &str, entry: &IndexEntry) -> Result<(), CoreError> {
        let metadata = serde_json::to_string(&entry.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, document, embedding, dimension, metadata, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                document = excluded.document,
                embedding = excluded.embedding,
                dimension = excluded.dimension,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(&entry.id)
        .bind(&entry.document)
        .bind(encode_embedding(&entry.embedding))
        .bind(entry.embedding.len() as i64)
        .bind(metadata)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(sql_error)?;

        debug!("Upserted {}/{}", collection, entry.id);
        Ok(())
    }

    /// Delete every entry of `collection` whose id is not in `keep`.
    /// Returns the number of entries removed.
    pub async fn retain_only(&self, collection: &str, keep: &[String]) -> Result<u64, CoreError> {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        let existing = self.ids(collection).await?;

        let mut tx = self.pool.begin().await.map_err(sql_error)?;
        let mut removed = 0;
        for id in existing.iter().filter(|id| !keep.contains(id.as_str())) {
            removed += sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(sql_error)?
                .rows_affected();
        }
        tx.commit().await.map_err(sql_error)?;

        if removed > 0 {
            info!("Pruned {} stale entries from {}", removed, collection);
        }
        Ok(removed)
    }

    pub async fn ids(&self, collection: &str) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query("SELECT id FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(rows.iter().map(|row| row.get::<String, _>("id")).collect())
    }

    pub async fn len(&self, collection: &str) -> Result<usize, CoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(sql_error)?
            .get("count");
        Ok(count as usize)
    }

    pub async fn is_empty(&self, collection: &str) -> Result<bool, CoreError> {
        Ok(self.len(collection).await? == 0)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<IndexEntry>, CoreError> {
        let row = sqlx::query(
            "SELECT id, document, embedding, metadata FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sql_error)?;

        row.map(|row| entry_from_row(&row)).transpose()
    }

    /// The `k` entries of `collection` closest to `vector` by cosine
    /// distance, nearest first.
    pub async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, document, embedding, metadata FROM documents WHERE collection = ?",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(sql_error)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = entry_from_row(row)?;
            if entry.embedding.len() != vector.len() {
                return Err(CoreError::Embedding(EmbeddingError::DimensionMismatch {
                    expected: entry.embedding.len(),
                    actual: vector.len(),
                }));
            }
            hits.push(QueryHit {
                distance: 1.0 - cosine_similarity(&entry.embedding, vector),
                id: entry.id,
                document: entry.document,
                metadata: entry.metadata,
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<IndexEntry, CoreError> {
    let id: String = row.get("id");
    let embedding = decode_embedding(&id, &row.get::<Vec<u8>, _>("embedding"))?;
    let metadata: Metadata =
        serde_json::from_str(&row.get::<String, _>("metadata")).map_err(|e| {
            CoreError::Index(IndexError::CorruptEntry {
                id: id.clone(),
                reason: format!("metadata: {}", e),
            })
        })?;

    Ok(IndexEntry {
        document: row.get("document"),
        id,
        embedding,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_encoding() {
        let vector = vec![0.25f32, -1.5, 3.0];
        let bytes = encode_embedding(&vector);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_embedding("x", &bytes).unwrap(), vector);
        assert!(matches!(
            decode_embedding("x", &bytes[..5]),
            Err(CoreError::Index(IndexError::CorruptEntry { .. }))
        ));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_metadata_values_round_trip_through_json() {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), "subreddit".into());
        metadata.insert("interactions_count".to_string(), 7u64.into());
        metadata.insert("over_18".to_string(), Some(false).into());
        metadata.insert("flair".to_string(), MetadataValue::from(None::<String>));

        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(
            json,
            r#"{"type":"subreddit","interactions_count":7,"over_18":false,"flair":""}"#
        );
        let parsed: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
    }
}
