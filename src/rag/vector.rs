//! SQLite-backed vector index.
//!
//! Documents are stored with their metadata as JSON text and their
//! embedding as a little-endian `f32` blob. Search embeds the query,
//! scores every row by cosine similarity in parallel and keeps the top
//! `k`. Blocking database work runs on the blocking thread pool.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rayon::prelude::*;
use rusqlite::{Connection, OpenFlags, params};
use serde_json::Value;
use tracing::debug;

use super::capability::{Embedder, VectorIndex};
use crate::core::{CROP_KEY, Document};
use crate::error::{AgentError, StorageError};

/// Index location used when none is configured.
pub const DEFAULT_DB_PATH: &str = ".cropwise/index.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    crop TEXT,
    embedding BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_crop ON documents(crop);
";

/// Encodes a vector as a little-endian `f32` blob.
#[must_use]
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decodes a little-endian `f32` blob.
///
/// # Errors
///
/// Returns [`StorageError::CorruptEmbedding`] if the length is not a
/// multiple of four.
pub fn decode_embedding(id: i64, bytes: &[u8]) -> Result<Vec<f32>, StorageError> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::CorruptEmbedding {
            id,
            len: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity; zero when either vector has zero norm or the
/// lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// One row of index statistics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CropCount {
    /// Crop tag, or `None` for untagged documents.
    pub crop: Option<String>,
    /// Number of documents.
    pub documents: usize,
}

/// Vector index stored in a single SQLite database.
pub struct SqliteVectorIndex {
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorIndex {
    /// Opens (and initializes) an index at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?, embedder)
    }

    /// Creates a private in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if initialization fails.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?, embedder)
    }

    fn from_connection(conn: Connection, embedder: Arc<dyn Embedder>) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedder,
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on database failure.
    pub async fn count(&self) -> Result<usize, StorageError> {
        self.with_conn(|conn| count_documents(conn)).await
    }

    /// Document counts grouped by crop tag.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on database failure.
    pub async fn counts_by_crop(&self) -> Result<Vec<CropCount>, StorageError> {
        self.with_conn(|conn| crop_counts(conn)).await
    }
}

fn count_documents(conn: &Connection) -> Result<usize, StorageError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
    Ok(usize::try_from(n).unwrap_or(0))
}

fn crop_counts(conn: &Connection) -> Result<Vec<CropCount>, StorageError> {
    let mut stmt =
        conn.prepare("SELECT crop, COUNT(*) FROM documents GROUP BY crop ORDER BY crop")?;
    let rows = stmt.query_map([], |row| {
        Ok(CropCount {
            crop: row.get(0)?,
            documents: usize::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Summary of an index on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStatus {
    /// Total documents.
    pub documents: usize,
    /// Documents per crop tag.
    pub by_crop: Vec<CropCount>,
}

/// Reads index statistics without an embedder.
///
/// A missing database file is an empty index.
///
/// # Errors
///
/// Returns [`StorageError`] if the file exists but cannot be read.
pub fn read_status(path: impl AsRef<Path>) -> Result<IndexStatus, StorageError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(IndexStatus::default());
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    Ok(IndexStatus {
        documents: count_documents(&conn)?,
        by_crop: crop_counts(&conn)?,
    })
}

impl std::fmt::Debug for SqliteVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorIndex")
            .field("dimension", &self.embedder.dimension())
            .finish_non_exhaustive()
    }
}

struct Row {
    id: i64,
    content: String,
    metadata: String,
    embedding: Vec<u8>,
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>, AgentError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed_query(query).await?;

        let rows = self
            .with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id, content, metadata, embedding FROM documents")?;
                let rows = stmt.query_map([], |row| {
                    Ok(Row {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        metadata: row.get(2)?,
                        embedding: row.get(3)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;

        let mut scored = rows
            .into_par_iter()
            .map(|row| -> Result<(f32, Row), StorageError> {
                let vector = decode_embedding(row.id, &row.embedding)?;
                Ok((cosine_similarity(&query_vector, &vector), row))
            })
            .collect::<Result<Vec<_>, _>>()?;

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.truncate(k);
        debug!(query_len = query.len(), hits = scored.len(), "similarity search");

        scored
            .into_iter()
            .map(|(_, row)| -> Result<Document, AgentError> {
                let metadata: BTreeMap<String, Value> = serde_json::from_str(&row.metadata)
                    .map_err(StorageError::from)?;
                Ok(Document {
                    content: row.content,
                    metadata,
                })
            })
            .collect()
    }

    async fn add_documents(&self, documents: &[Document]) -> Result<usize, AgentError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        if vectors.len() != documents.len() {
            return Err(AgentError::Embedding {
                message: format!(
                    "expected {} embeddings, got {}",
                    documents.len(),
                    vectors.len()
                ),
            });
        }

        let mut prepared = Vec::with_capacity(documents.len());
        for (doc, vector) in documents.iter().zip(&vectors) {
            prepared.push((
                doc.content.clone(),
                serde_json::to_string(&doc.metadata).map_err(StorageError::from)?,
                doc.metadata
                    .get(CROP_KEY)
                    .and_then(Value::as_str)
                    .map(str::to_string),
                encode_embedding(vector),
            ));
        }

        let added = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO documents (content, metadata, crop, embedding) VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for (content, metadata, crop, blob) in &prepared {
                        stmt.execute(params![content, metadata, crop, blob])?;
                    }
                }
                tx.commit()?;
                Ok(prepared.len())
            })
            .await?;

        debug!(added, "indexed documents");
        Ok(added)
    }
}
