//! Repository for sync runs and their audit records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use rilievo_core::errors::Result;
use rilievo_core::sync::{
    FileSyncNotice, SyncJob, SyncOutcome, SyncRecord, SyncRepositoryTrait,
};

use super::model::SyncRecordDB;
use super::unit_of_work::SqliteUnitOfWork;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_records;
use crate::survey::format_timestamp;

fn latest_record_row(
    conn: &mut SqliteConnection,
    device_id: &str,
) -> Result<Option<SyncRecordDB>> {
    let row = sync_records::table
        .filter(sync_records::device_id.eq(device_id))
        .order((sync_records::synced_at.desc(), sync_records::id.desc()))
        .select(SyncRecordDB::as_select())
        .first::<SyncRecordDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    Ok(row)
}

pub struct SyncRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SyncRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    /// All audit records of a device, newest first.
    pub fn list_sync_records(&self, device_id: &str) -> Result<Vec<SyncRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_records::table
            .filter(sync_records::device_id.eq(device_id))
            .order((sync_records::synced_at.desc(), sync_records::id.desc()))
            .select(SyncRecordDB::as_select())
            .load::<SyncRecordDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| SyncRecord::try_from(row).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl SyncRepositoryTrait for SyncRepository {
    async fn run_in_transaction(&self, job: SyncJob) -> Result<SyncOutcome> {
        self.writer
            .exec(move |conn| {
                let mut uow = SqliteUnitOfWork::new(conn);
                job(&mut uow)
            })
            .await
    }

    fn get_latest_sync_record(&self, device_id: &str) -> Result<Option<SyncRecord>> {
        let mut conn = get_connection(&self.pool)?;
        latest_record_row(&mut conn, device_id)?
            .map(|row| SyncRecord::try_from(row).map_err(Into::into))
            .transpose()
    }

    async fn complete_file_sync(
        &self,
        notice: FileSyncNotice,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<SyncRecord>> {
        self.writer
            .exec(move |conn| {
                let Some(mut row) = latest_record_row(conn, &notice.device_id)? else {
                    debug!(
                        "No sync record to complete for device {}",
                        notice.device_id
                    );
                    return Ok(None);
                };

                row.files_processed = notice.processed;
                row.files_succeeded = notice.succeeded;
                row.files_failed = notice.failed;
                row.file_sync_completed = notice.failed == 0;
                row.file_sync_completed_at = Some(format_timestamp(completed_at));

                diesel::update(sync_records::table.find(row.id.clone()))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;

                Ok(Some(SyncRecord::try_from(row)?))
            })
            .await
    }
}
