//! Postgres implementation of the record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;
use vidshare_core::{
    AppError, NewStoredFile, Resolution, StoredFile, UserId, Video, VideoId, VideoStatus,
};

use crate::store::{VideoStore, VideoTransaction};
use crate::transaction::TransactionGuard;

#[derive(Debug, sqlx::FromRow)]
struct VideoRow {
    id: VideoId,
    status: VideoStatus,
    owner_id: UserId,
    origin_metadata_id: Uuid,
    thumbnail_metadata_id: Option<Uuid>,
    video_hls_file_location: Option<String>,
    hls_renditions: Vec<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct StoredFileRow {
    id: Uuid,
    owner_id: UserId,
    bucket: String,
    key: String,
    original_name: String,
    extension: String,
    mime_type: String,
    size: i64,
    checksum: String,
    is_public: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoredFileRow> for StoredFile {
    fn from(row: StoredFileRow) -> Self {
        StoredFile {
            id: row.id,
            owner_id: row.owner_id,
            bucket: row.bucket,
            key: row.key,
            original_name: row.original_name,
            extension: row.extension,
            mime_type: row.mime_type,
            size: row.size,
            checksum: row.checksum,
            is_public: row.is_public,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn renditions_from_column(values: &[i32]) -> Vec<Resolution> {
    values
        .iter()
        .filter_map(|h| u32::try_from(*h).ok())
        .map(Resolution::new)
        .collect()
}

fn renditions_to_column(renditions: &[Resolution]) -> Vec<i32> {
    renditions
        .iter()
        .filter_map(|r| i32::try_from(r.height()).ok())
        .collect()
}

async fn fetch_stored_file(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<StoredFile>, AppError> {
    let row: Option<StoredFileRow> =
        sqlx::query_as::<Postgres, StoredFileRow>("SELECT * FROM stored_files WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(StoredFile::from))
}

async fn current_status(
    conn: &mut PgConnection,
    video_id: &VideoId,
) -> Result<Option<VideoStatus>, AppError> {
    let status: Option<VideoStatus> =
        sqlx::query_scalar::<Postgres, VideoStatus>("SELECT status FROM videos WHERE id = $1")
            .bind(video_id)
            .fetch_optional(conn)
            .await?;
    Ok(status)
}

/// Explain why a guarded update touched no row.
async fn rejected_transition(
    conn: &mut PgConnection,
    video_id: &VideoId,
    to: VideoStatus,
) -> AppError {
    match current_status(conn, video_id).await {
        Ok(Some(from)) => AppError::InvalidTransition { from, to },
        Ok(None) => AppError::NotFound(format!("video {}", video_id)),
        Err(e) => e,
    }
}

/// Record store backed by Postgres
#[derive(Clone)]
pub struct PgVideoStore {
    pool: PgPool,
}

impl PgVideoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select", db.record_id = %id))]
    async fn find_video(&self, id: &VideoId) -> Result<Option<Video>, AppError> {
        let mut conn = self.pool.acquire().await?;

        let row: Option<VideoRow> =
            sqlx::query_as::<Postgres, VideoRow>("SELECT * FROM videos WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let origin_metadata = fetch_stored_file(&mut conn, row.origin_metadata_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "video {} references missing origin file {}",
                    row.id, row.origin_metadata_id
                ))
            })?;

        let thumbnail_metadata = match row.thumbnail_metadata_id {
            Some(thumb_id) => fetch_stored_file(&mut conn, thumb_id).await?,
            None => None,
        };

        Ok(Some(Video {
            id: row.id,
            status: row.status,
            owner_id: row.owner_id,
            origin_metadata,
            thumbnail_metadata,
            video_hls_file_location: row.video_hls_file_location,
            hls_renditions: renditions_from_column(&row.hls_renditions),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn begin(&self) -> Result<Box<dyn VideoTransaction>, AppError> {
        let guard = TransactionGuard::begin(&self.pool).await?;
        Ok(Box::new(PgVideoTransaction { guard }))
    }
}

/// A job's unit of work on Postgres
pub struct PgVideoTransaction {
    guard: TransactionGuard,
}

#[async_trait]
impl VideoTransaction for PgVideoTransaction {
    #[tracing::instrument(skip(self, file), fields(db.table = "stored_files", db.operation = "insert", key = %file.key))]
    async fn insert_stored_file(&mut self, file: NewStoredFile) -> Result<StoredFile, AppError> {
        let now = Utc::now();
        let row: StoredFileRow = sqlx::query_as::<Postgres, StoredFileRow>(
            r#"
            INSERT INTO stored_files (
                id, owner_id, bucket, key, original_name, extension, mime_type,
                size, checksum, is_public, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&file.owner_id)
        .bind(&file.bucket)
        .bind(&file.key)
        .bind(&file.original_name)
        .bind(&file.extension)
        .bind(&file.mime_type)
        .bind(file.size)
        .bind(&file.checksum)
        .bind(file.is_public)
        .bind(now)
        .fetch_one(self.guard.conn()?)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "update", db.record_id = %video_id))]
    async fn mark_thumbnail_generated(
        &mut self,
        video_id: &VideoId,
        thumbnail_file_id: Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = $3, thumbnail_metadata_id = $2, updated_at = NOW()
            WHERE id = $1
              AND status = $4
              AND thumbnail_metadata_id IS NULL
            "#,
        )
        .bind(video_id)
        .bind(thumbnail_file_id)
        .bind(VideoStatus::ThumbnailGenerated)
        .bind(VideoStatus::OriginalUploaded)
        .execute(self.guard.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(
                rejected_transition(self.guard.conn()?, video_id, VideoStatus::ThumbnailGenerated)
                    .await,
            );
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, renditions), fields(db.table = "videos", db.operation = "update", db.record_id = %video_id))]
    async fn mark_hls_completed(
        &mut self,
        video_id: &VideoId,
        location: &str,
        renditions: &[Resolution],
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = $2,
                video_hls_file_location = COALESCE(video_hls_file_location, $3),
                hls_renditions = $4,
                updated_at = NOW()
            WHERE id = $1
              AND status IN ($5, $2)
            "#,
        )
        .bind(video_id)
        .bind(VideoStatus::HlsEncodingCompleted)
        .bind(location)
        .bind(renditions_to_column(renditions))
        .bind(VideoStatus::ThumbnailGenerated)
        .execute(self.guard.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(rejected_transition(
                self.guard.conn()?,
                video_id,
                VideoStatus::HlsEncodingCompleted,
            )
            .await);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.guard.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.guard.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendition_column_conversion() {
        let list = vec![Resolution::P360, Resolution::P720];
        assert_eq!(renditions_to_column(&list), vec![360, 720]);
        assert_eq!(renditions_from_column(&[360, 720]), list);
        assert!(renditions_from_column(&[-1]).is_empty());
    }
}
