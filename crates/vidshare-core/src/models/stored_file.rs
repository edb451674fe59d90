use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::UserId;

/// One object-storage blob owned by a user.
///
/// Immutable once created, except for the `is_deleted` flag which is managed
/// outside the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub owner_id: UserId,
    pub bucket: String,
    pub key: String,
    pub original_name: String,
    pub extension: String,
    pub mime_type: String,
    pub size: i64,
    /// Object store ETag returned by the upload.
    pub checksum: String,
    pub is_public: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to persist a freshly uploaded blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStoredFile {
    pub owner_id: UserId,
    pub bucket: String,
    pub key: String,
    pub original_name: String,
    pub extension: String,
    pub mime_type: String,
    pub size: i64,
    pub checksum: String,
    pub is_public: bool,
}

impl NewStoredFile {
    /// Materialize the row with a fresh id and timestamps.
    pub fn into_stored(self, now: DateTime<Utc>) -> StoredFile {
        StoredFile {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            bucket: self.bucket,
            key: self.key,
            original_name: self.original_name,
            extension: self.extension,
            mime_type: self.mime_type,
            size: self.size,
            checksum: self.checksum,
            is_public: self.is_public,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}
