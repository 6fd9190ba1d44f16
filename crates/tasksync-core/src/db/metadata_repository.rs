//! Sync metadata repository implementation

use crate::error::{Error, Result};
use crate::models::{SyncKey, SyncMetadata, SyncMetadataPatch, SyncStatus};
use libsql::{params, Connection, Row};

use super::values::{count, integer_or_null, parse_column, text_or_null};

const METADATA_COLUMNS: &str = "task_id, integration_id, external_id, sync_status, last_sync_at, \
     last_external_update, retry_count, last_error, created_at, updated_at";

/// libSQL storage for per-pair sync metadata
pub struct LibSqlSyncMetadataRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncMetadataRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, key: SyncKey) -> Result<Option<SyncMetadata>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {METADATA_COLUMNS} FROM sync_metadata
                     WHERE task_id = ? AND integration_id = ?"
                ),
                params![key.task_id.as_str(), key.integration_id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_metadata(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert a record; the pair must not have one yet
    pub async fn create(&self, metadata: &SyncMetadata) -> Result<SyncMetadata> {
        let key = metadata.key();
        if self.get(key).await?.is_some() {
            return Err(Error::AlreadyExists(format!("sync metadata {key}")));
        }
        self.write(metadata, true).await?;
        Ok(metadata.clone())
    }

    /// Patch an existing record, stamping `updated_at` with `now`
    pub async fn update(
        &self,
        key: SyncKey,
        patch: &SyncMetadataPatch,
        now: i64,
    ) -> Result<SyncMetadata> {
        let mut metadata = self
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync metadata {key}")))?;
        metadata.apply(patch, now);
        self.write(&metadata, false).await?;
        Ok(metadata)
    }

    pub async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<SyncMetadata>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {METADATA_COLUMNS} FROM sync_metadata
                     WHERE sync_status = ? ORDER BY updated_at ASC"
                ),
                [status.as_str()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_metadata(&row)?);
        }
        Ok(records)
    }

    async fn write(&self, metadata: &SyncMetadata, insert: bool) -> Result<()> {
        let sql = if insert {
            format!("INSERT INTO sync_metadata ({METADATA_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)")
        } else {
            "UPDATE sync_metadata
             SET external_id = ?3, sync_status = ?4, last_sync_at = ?5,
                 last_external_update = ?6, retry_count = ?7, last_error = ?8,
                 created_at = ?9, updated_at = ?10
             WHERE task_id = ?1 AND integration_id = ?2"
                .to_string()
        };

        self.conn
            .execute(
                &sql,
                params![
                    metadata.task_id.as_str(),
                    metadata.integration_id.as_str(),
                    text_or_null(metadata.external_id.as_deref()),
                    metadata.sync_status.as_str(),
                    integer_or_null(metadata.last_sync_at),
                    integer_or_null(metadata.last_external_update),
                    i64::from(metadata.retry_count),
                    text_or_null(metadata.last_error.as_deref()),
                    metadata.created_at,
                    metadata.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    fn parse_metadata(row: &Row) -> Result<SyncMetadata> {
        let task_id: String = row.get(0)?;
        let integration_id: String = row.get(1)?;
        let status: String = row.get(3)?;
        let retry_count: i64 = row.get(6)?;

        Ok(SyncMetadata {
            task_id: parse_column(&task_id, "task id")?,
            integration_id: parse_column(&integration_id, "integration id")?,
            external_id: row.get(2)?,
            sync_status: parse_column(&status, "sync status")?,
            last_sync_at: row.get(4)?,
            last_external_update: row.get(5)?,
            retry_count: count(retry_count),
            last_error: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}
