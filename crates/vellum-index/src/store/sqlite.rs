use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::{EmbeddingStore, PathState, StoreStats};
use crate::chunker::{ChunkKind, ChunkMetadata};
use crate::error::{IndexError, Result};
use crate::record::{EmbeddingRecord, decode_vector, encode_vector};

const SELECT_COLUMNS: &str = "SELECT id, file_path, chunk_index, content, kind, name, line_start, \
     line_end, file_hash, dimensions, vector, created_at, updated_at FROM embeddings";

/// `SQLite`-backed store. `":memory:"` keeps everything in a single private connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    file_path: String,
    chunk_index: i64,
    content: String,
    kind: String,
    name: Option<String>,
    line_start: i64,
    line_end: i64,
    file_hash: String,
    dimensions: i64,
    vector: Vec<u8>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<RecordRow> for EmbeddingRecord {
    type Error = IndexError;

    fn try_from(row: RecordRow) -> Result<Self> {
        let kind = ChunkKind::from_str(&row.kind).map_err(IndexError::Codec)?;
        let vector = decode_vector(&row.vector, usize::try_from(row.dimensions)?)?;
        Ok(Self {
            id: row.id,
            file_path: row.file_path,
            chunk_index: usize::try_from(row.chunk_index)?,
            content: row.content,
            metadata: ChunkMetadata {
                line_start: usize::try_from(row.line_start)?,
                line_end: usize::try_from(row.line_end)?,
                kind,
                name: row.name,
            },
            file_hash: row.file_hash,
            vector,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| IndexError::Codec(format!("timestamp out of range: {ms}")))
}

impl SqliteStore {
    /// Open (or create) the database at `path`. Schema setup happens in [`EmbeddingStore::init`].
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened.
    pub async fn open(path: &str) -> Result<Self> {
        let pool = if path == ":memory:" {
            let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(opts)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            let opts = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(5));
            SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(opts)
                .await?
        };
        tracing::debug!(path, "opened embedding database");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn insert_record<'e, E>(executor: E, record: &EmbeddingRecord, created_at: i64, now: i64) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO embeddings \
         (id, file_path, chunk_index, content, kind, name, line_start, line_end, \
          file_hash, dimensions, vector, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
         file_path = excluded.file_path, chunk_index = excluded.chunk_index, \
         content = excluded.content, kind = excluded.kind, name = excluded.name, \
         line_start = excluded.line_start, line_end = excluded.line_end, \
         file_hash = excluded.file_hash, dimensions = excluded.dimensions, \
         vector = excluded.vector, updated_at = excluded.updated_at",
    )
    .bind(&record.id)
    .bind(&record.file_path)
    .bind(i64::try_from(record.chunk_index)?)
    .bind(&record.content)
    .bind(record.metadata.kind.as_str())
    .bind(record.metadata.name.as_deref())
    .bind(i64::try_from(record.metadata.line_start)?)
    .bind(i64::try_from(record.metadata.line_end)?)
    .bind(&record.file_hash)
    .bind(i64::try_from(record.dimensions())?)
    .bind(encode_vector(&record.vector))
    .bind(created_at)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

impl EmbeddingStore for SqliteStore {
    async fn init(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn put(&self, record: EmbeddingRecord) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        insert_record(&self.pool, &record, record.created_at.timestamp_millis(), now).await
    }

    async fn get_by_path(&self, path: &str) -> Result<Vec<EmbeddingRecord>> {
        let rows: Vec<RecordRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE file_path = ? ORDER BY chunk_index"))
                .bind(path)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(EmbeddingRecord::try_from).collect()
    }

    async fn delete_by_path(&self, path: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM embeddings WHERE file_path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn scan_all(&self) -> Result<Vec<EmbeddingRecord>> {
        let rows: Vec<RecordRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY file_path, chunk_index"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(EmbeddingRecord::try_from).collect()
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM embeddings")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_path(&self, path: &str, records: Vec<EmbeddingRecord>) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let existing: Vec<(String, i64)> =
            sqlx::query_as("SELECT id, created_at FROM embeddings WHERE file_path = ?")
                .bind(path)
                .fetch_all(&mut *tx)
                .await?;
        let created: HashMap<String, i64> = existing.into_iter().collect();

        sqlx::query("DELETE FROM embeddings WHERE file_path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;

        for record in &records {
            let created_at = created
                .get(&record.id)
                .copied()
                .unwrap_or_else(|| record.created_at.timestamp_millis());
            insert_record(&mut *tx, record, created_at, now).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn indexed_paths(&self) -> Result<Vec<String>> {
        let paths: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT file_path FROM embeddings ORDER BY file_path")
                .fetch_all(&self.pool)
                .await?;
        Ok(paths)
    }

    async fn touch_path(&self, path: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE embeddings SET updated_at = ? WHERE file_path = ?")
            .bind(Utc::now().timestamp_millis())
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn path_state(&self, path: &str) -> Result<Option<PathState>> {
        let (count, oldest, min_hash, max_hash): (i64, Option<i64>, Option<String>, Option<String>) =
            sqlx::query_as(
                "SELECT COUNT(*), MIN(updated_at), MIN(file_hash), MAX(file_hash) \
                 FROM embeddings WHERE file_path = ?",
            )
            .bind(path)
            .fetch_one(&self.pool)
            .await?;

        let Some(oldest) = oldest.filter(|_| count > 0) else {
            return Ok(None);
        };
        let file_hash = match (min_hash, max_hash) {
            (Some(min), Some(max)) if min == max && !min.is_empty() => Some(min),
            _ => None,
        };
        Ok(Some(PathState {
            oldest_update: from_millis(oldest)?,
            file_hash,
            records: u64::try_from(count)?,
        }))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let (total, files): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT file_path) FROM embeddings")
                .fetch_one(&self.pool)
                .await?;
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats {
            total_embeddings: u64::try_from(total)?,
            unique_files: u64::try_from(files)?,
            size_bytes: u64::try_from(page_count.saturating_mul(page_size))?,
        })
    }
}
