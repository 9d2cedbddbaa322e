use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use rilievo_core::errors::Result;
use rilievo_core::survey::{
    EntityKind, EntityLink, EntityRecord, EntityRef, EntityRepositoryTrait,
};

use super::model::{EntityDB, EntityLinkDB};
use crate::db::get_connection;
use crate::errors::StorageError;
use crate::schema::{entities, entity_links};

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
const ID_CHUNK_SIZE: usize = 500;

fn to_records(rows: Vec<EntityDB>) -> Result<Vec<EntityRecord>> {
    rows.into_iter()
        .map(|row| EntityRecord::try_from(row).map_err(Into::into))
        .collect()
}

fn to_links(rows: Vec<EntityLinkDB>) -> Result<Vec<EntityLink>> {
    rows.into_iter()
        .map(|row| EntityLink::try_from(row).map_err(Into::into))
        .collect()
}

pub(crate) fn load_entities(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    ids: &[Uuid],
) -> Result<Vec<EntityRecord>> {
    let mut rows = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK_SIZE) {
        let chunk_ids: Vec<String> = chunk.iter().map(Uuid::to_string).collect();
        let loaded = entities::table
            .filter(entities::kind.eq(kind.as_db_str()))
            .filter(entities::id.eq_any(chunk_ids))
            .select(EntityDB::as_select())
            .load::<EntityDB>(conn)
            .map_err(StorageError::from)?;
        rows.extend(loaded);
    }
    to_records(rows)
}

pub(crate) fn list_entities(
    conn: &mut SqliteConnection,
    kind: EntityKind,
) -> Result<Vec<EntityRecord>> {
    let rows = entities::table
        .filter(entities::kind.eq(kind.as_db_str()))
        .order(entities::id.asc())
        .select(EntityDB::as_select())
        .load::<EntityDB>(conn)
        .map_err(StorageError::from)?;
    to_records(rows)
}

pub(crate) fn get_entity(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: Uuid,
) -> Result<Option<EntityRecord>> {
    let row = entities::table
        .find((kind.as_db_str(), id.to_string()))
        .select(EntityDB::as_select())
        .first::<EntityDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    row.map(|row| EntityRecord::try_from(row).map_err(Into::into))
        .transpose()
}

pub(crate) fn upsert_entity(conn: &mut SqliteConnection, entity: &EntityRecord) -> Result<()> {
    let row = EntityDB::try_from(entity)?;
    diesel::insert_into(entities::table)
        .values(&row)
        .on_conflict((entities::kind, entities::id))
        .do_update()
        .set(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

pub(crate) fn delete_entity(conn: &mut SqliteConnection, entity: EntityRef) -> Result<()> {
    diesel::delete(entities::table.find((entity.kind.as_db_str(), entity.id.to_string())))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

pub(crate) fn insert_link(conn: &mut SqliteConnection, link: EntityLink) -> Result<()> {
    diesel::insert_into(entity_links::table)
        .values(EntityLinkDB::new(link, Utc::now()))
        .on_conflict_do_nothing()
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

pub(crate) fn delete_link(conn: &mut SqliteConnection, link: EntityLink) -> Result<()> {
    diesel::delete(
        entity_links::table
            .filter(entity_links::parent_kind.eq(link.parent.kind.as_db_str()))
            .filter(entity_links::parent_id.eq(link.parent.id.to_string()))
            .filter(entity_links::child_kind.eq(link.child.kind.as_db_str()))
            .filter(entity_links::child_id.eq(link.child.id.to_string())),
    )
    .execute(conn)
    .map_err(StorageError::from)?;
    Ok(())
}

pub(crate) fn links_to_child(
    conn: &mut SqliteConnection,
    child: EntityRef,
) -> Result<Vec<EntityLink>> {
    let rows = entity_links::table
        .filter(entity_links::child_kind.eq(child.kind.as_db_str()))
        .filter(entity_links::child_id.eq(child.id.to_string()))
        .order((entity_links::parent_kind.asc(), entity_links::parent_id.asc()))
        .select(EntityLinkDB::as_select())
        .load::<EntityLinkDB>(conn)
        .map_err(StorageError::from)?;
    to_links(rows)
}

pub(crate) fn links_from_parent(
    conn: &mut SqliteConnection,
    parent: EntityRef,
) -> Result<Vec<EntityLink>> {
    let rows = entity_links::table
        .filter(entity_links::parent_kind.eq(parent.kind.as_db_str()))
        .filter(entity_links::parent_id.eq(parent.id.to_string()))
        .order((entity_links::child_kind.asc(), entity_links::child_id.asc()))
        .select(EntityLinkDB::as_select())
        .load::<EntityLinkDB>(conn)
        .map_err(StorageError::from)?;
    to_links(rows)
}

/// Read side of the survey entity store.
pub struct EntityRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
}

impl EntityRepository {
    pub fn new(pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>) -> Self {
        Self { pool }
    }

    /// Relational links whose parent is `parent`.
    pub fn get_links_from(&self, parent: EntityRef) -> Result<Vec<EntityLink>> {
        let mut conn = get_connection(&self.pool)?;
        links_from_parent(&mut conn, parent)
    }
}

impl EntityRepositoryTrait for EntityRepository {
    fn list_entities(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        let mut conn = get_connection(&self.pool)?;
        list_entities(&mut conn, kind)
    }

    fn get_entity(&self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRecord>> {
        let mut conn = get_connection(&self.pool)?;
        get_entity(&mut conn, kind, id)
    }
}
