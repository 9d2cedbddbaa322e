//! Database model for sync audit records.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use rilievo_core::sync::SyncRecord;

use crate::errors::StorageError;
use crate::survey::{format_timestamp, parse_timestamp, parse_uuid};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncRecordDB {
    pub id: String,
    pub device_id: String,
    pub platform: Option<String>,
    pub app_version: Option<String>,
    pub client_timestamp: Option<String>,
    pub synced_at: String,
    pub total_entities: i64,
    pub created_count: i64,
    pub updated_count: i64,
    pub deleted_count: i64,
    pub unchanged_count: i64,
    pub files_processed: i64,
    pub files_succeeded: i64,
    pub files_failed: i64,
    pub file_sync_completed: bool,
    pub file_sync_completed_at: Option<String>,
}

impl From<&SyncRecord> for SyncRecordDB {
    fn from(record: &SyncRecord) -> Self {
        Self {
            id: record.id.to_string(),
            device_id: record.device_id.clone(),
            platform: record.platform.clone(),
            app_version: record.app_version.clone(),
            client_timestamp: record.client_timestamp.clone(),
            synced_at: format_timestamp(record.synced_at),
            total_entities: record.total_entities,
            created_count: record.created,
            updated_count: record.updated,
            deleted_count: record.deleted,
            unchanged_count: record.unchanged,
            files_processed: record.files_processed,
            files_succeeded: record.files_succeeded,
            files_failed: record.files_failed,
            file_sync_completed: record.file_sync_completed,
            file_sync_completed_at: record.file_sync_completed_at.map(format_timestamp),
        }
    }
}

impl TryFrom<SyncRecordDB> for SyncRecord {
    type Error = StorageError;

    fn try_from(row: SyncRecordDB) -> Result<Self, Self::Error> {
        Ok(SyncRecord {
            id: parse_uuid(&row.id)?,
            device_id: row.device_id,
            platform: row.platform,
            app_version: row.app_version,
            client_timestamp: row.client_timestamp,
            synced_at: parse_timestamp(&row.synced_at)?,
            total_entities: row.total_entities,
            created: row.created_count,
            updated: row.updated_count,
            deleted: row.deleted_count,
            unchanged: row.unchanged_count,
            files_processed: row.files_processed,
            files_succeeded: row.files_succeeded,
            files_failed: row.files_failed,
            file_sync_completed: row.file_sync_completed,
            file_sync_completed_at: row
                .file_sync_completed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }
}
