//! `SyncUnitOfWork` over a connection that is already inside a transaction.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use uuid::Uuid;

use rilievo_core::errors::{Error, Result};
use rilievo_core::survey::{EntityKind, EntityLink, EntityRecord, EntityRef};
use rilievo_core::sync::{SyncRecord, SyncStats, SyncUnitOfWork};

use super::model::SyncRecordDB;
use crate::errors::StorageError;
use crate::schema::sync_records;
use crate::survey;

pub struct SqliteUnitOfWork<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> SqliteUnitOfWork<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        Self { conn }
    }
}

impl SyncUnitOfWork for SqliteUnitOfWork<'_> {
    fn load_entities(&mut self, kind: EntityKind, ids: &[Uuid]) -> Result<Vec<EntityRecord>> {
        survey::load_entities(self.conn, kind, ids)
    }

    fn list_entities(&mut self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        survey::list_entities(self.conn, kind)
    }

    fn get_entity(&mut self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRecord>> {
        survey::get_entity(self.conn, kind, id)
    }

    fn upsert_entity(&mut self, entity: &EntityRecord) -> Result<()> {
        survey::upsert_entity(self.conn, entity)
    }

    fn delete_entity(&mut self, entity: EntityRef) -> Result<()> {
        survey::delete_entity(self.conn, entity)
    }

    fn insert_link(&mut self, link: EntityLink) -> Result<()> {
        survey::insert_link(self.conn, link)
    }

    fn delete_link(&mut self, link: EntityLink) -> Result<()> {
        survey::delete_link(self.conn, link)
    }

    fn links_to_child(&mut self, child: EntityRef) -> Result<Vec<EntityLink>> {
        survey::links_to_child(self.conn, child)
    }

    fn links_from_parent(&mut self, parent: EntityRef) -> Result<Vec<EntityLink>> {
        survey::links_from_parent(self.conn, parent)
    }

    fn insert_sync_record(&mut self, record: &SyncRecord) -> Result<()> {
        diesel::insert_into(sync_records::table)
            .values(SyncRecordDB::from(record))
            .execute(&mut *self.conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Nested diesel transactions are SQLite savepoints.
    fn savepoint(
        &mut self,
        job: &mut dyn FnMut(&mut dyn SyncUnitOfWork) -> Result<SyncStats>,
    ) -> Result<SyncStats> {
        self.conn
            .transaction::<SyncStats, StorageError, _>(|conn| {
                let mut scope = SqliteUnitOfWork::new(conn);
                job(&mut scope).map_err(StorageError::from)
            })
            .map_err(Error::from)
    }
}
