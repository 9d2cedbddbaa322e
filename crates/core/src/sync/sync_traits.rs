use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::sync_model::{FileSyncNotice, SyncOutcome, SyncRecord, SyncStats};
use crate::errors::Result;
use crate::survey::{EntityKind, EntityLink, EntityRecord, EntityRef};

/// Storage operations available to one sync run, all inside the run's transaction.
pub trait SyncUnitOfWork {
    /// Entities of `kind` whose id is in `ids`. Missing ids are simply absent.
    fn load_entities(&mut self, kind: EntityKind, ids: &[Uuid]) -> Result<Vec<EntityRecord>>;

    /// Every entity of `kind`, ordered by id.
    fn list_entities(&mut self, kind: EntityKind) -> Result<Vec<EntityRecord>>;

    fn get_entity(&mut self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRecord>>;

    fn upsert_entity(&mut self, entity: &EntityRecord) -> Result<()>;

    fn delete_entity(&mut self, entity: EntityRef) -> Result<()>;

    /// Inserting an existing link is a no-op.
    fn insert_link(&mut self, link: EntityLink) -> Result<()>;

    fn delete_link(&mut self, link: EntityLink) -> Result<()>;

    fn links_to_child(&mut self, child: EntityRef) -> Result<Vec<EntityLink>>;

    fn links_from_parent(&mut self, parent: EntityRef) -> Result<Vec<EntityLink>>;

    fn insert_sync_record(&mut self, record: &SyncRecord) -> Result<()>;

    /// Runs `job` in a nested scope. On error every write made by `job` is
    /// undone and the error is returned; the enclosing work stays intact.
    fn savepoint(
        &mut self,
        job: &mut dyn FnMut(&mut dyn SyncUnitOfWork) -> Result<SyncStats>,
    ) -> Result<SyncStats>;
}

/// Work executed by [`SyncRepositoryTrait::run_in_transaction`].
pub type SyncJob = Box<dyn FnOnce(&mut dyn SyncUnitOfWork) -> Result<SyncOutcome> + Send>;

#[async_trait]
pub trait SyncRepositoryTrait: Send + Sync {
    /// Runs `job` in one transaction, committed only when `job` returns `Ok`.
    async fn run_in_transaction(&self, job: SyncJob) -> Result<SyncOutcome>;

    fn get_latest_sync_record(&self, device_id: &str) -> Result<Option<SyncRecord>>;

    /// Applies `notice` to the device's most recent record, if any.
    async fn complete_file_sync(
        &self,
        notice: FileSyncNotice,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<SyncRecord>>;
}

/// Storage for attachment files uploaded after a sync.
#[async_trait]
pub trait BlobStoreTrait: Send + Sync {
    /// Stores `bytes` and returns the path they were written to.
    async fn store(&self, device_id: &str, file_name: &str, bytes: Vec<u8>) -> Result<String>;
}
