//! Database models for survey entities and their links.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rilievo_core::survey::{EntityKind, EntityLink, EntityRecord, EntityRef};

use crate::errors::StorageError;

pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("Invalid timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_kind(value: &str) -> Result<EntityKind, StorageError> {
    EntityKind::from_db_str(value)
        .ok_or_else(|| StorageError::Corrupt(format!("Unknown entity kind '{}'", value)))
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(value)
        .map_err(|e| StorageError::Corrupt(format!("Invalid id '{}': {}", value, e)))
}

fn parse_ref(kind: &str, id: &str) -> Result<EntityRef, StorageError> {
    Ok(EntityRef::new(parse_kind(kind)?, parse_uuid(id)?))
}

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
#[diesel(primary_key(kind, id))]
#[diesel(table_name = crate::schema::entities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct EntityDB {
    pub kind: String,
    pub id: String,
    pub parent_kind: Option<String>,
    pub parent_id: Option<String>,
    pub fields: String,
    pub child_ids: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<&EntityRecord> for EntityDB {
    type Error = StorageError;

    fn try_from(entity: &EntityRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: entity.kind.as_db_str().to_string(),
            id: entity.id.to_string(),
            parent_kind: entity.parent.map(|p| p.kind.as_db_str().to_string()),
            parent_id: entity.parent.map(|p| p.id.to_string()),
            fields: serde_json::to_string(&entity.fields)?,
            child_ids: serde_json::to_string(&entity.child_ids)?,
            created_at: format_timestamp(entity.created_at),
            updated_at: format_timestamp(entity.updated_at),
        })
    }
}

impl TryFrom<EntityDB> for EntityRecord {
    type Error = StorageError;

    fn try_from(row: EntityDB) -> Result<Self, Self::Error> {
        let parent = match (row.parent_kind.as_deref(), row.parent_id.as_deref()) {
            (Some(kind), Some(id)) => Some(parse_ref(kind, id)?),
            _ => None,
        };
        let child_ids: BTreeMap<EntityKind, Vec<Uuid>> = serde_json::from_str(&row.child_ids)?;
        Ok(EntityRecord {
            kind: parse_kind(&row.kind)?,
            id: parse_uuid(&row.id)?,
            parent,
            fields: serde_json::from_str(&row.fields)?,
            child_ids,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(
    Queryable, Identifiable, Insertable, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(primary_key(parent_kind, parent_id, child_kind, child_id))]
#[diesel(table_name = crate::schema::entity_links)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EntityLinkDB {
    pub parent_kind: String,
    pub parent_id: String,
    pub child_kind: String,
    pub child_id: String,
    pub created_at: String,
}

impl EntityLinkDB {
    pub fn new(link: EntityLink, created_at: DateTime<Utc>) -> Self {
        Self {
            parent_kind: link.parent.kind.as_db_str().to_string(),
            parent_id: link.parent.id.to_string(),
            child_kind: link.child.kind.as_db_str().to_string(),
            child_id: link.child.id.to_string(),
            created_at: format_timestamp(created_at),
        }
    }
}

impl TryFrom<EntityLinkDB> for EntityLink {
    type Error = StorageError;

    fn try_from(row: EntityLinkDB) -> Result<Self, Self::Error> {
        Ok(EntityLink::new(
            parse_ref(&row.parent_kind, &row.parent_id)?,
            parse_ref(&row.child_kind, &row.child_id)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_row_preserves_the_record() {
        let parent = EntityRef::new(EntityKind::Complesso, Uuid::new_v4());
        let mut fields = serde_json::Map::new();
        fields.insert("Cod".to_string(), json!("X"));
        let mut record = EntityRecord::new(
            EntityKind::Edificio,
            Uuid::new_v4(),
            Some(parent),
            fields,
            parse_timestamp("2025-06-01T10:00:00.123456Z").unwrap(),
        );
        record.cache_child(EntityRef::new(EntityKind::UnitaImmobiliare, Uuid::new_v4()));

        let row = EntityDB::try_from(&record).unwrap();
        assert_eq!(row.kind, "edificio");
        assert_eq!(row.parent_kind.as_deref(), Some("complesso"));
        assert_eq!(row.created_at, "2025-06-01T10:00:00.123456Z");
        assert!(row.child_ids.contains("unita_immobiliare"));

        assert_eq!(EntityRecord::try_from(row).unwrap(), record);
    }

    #[test]
    fn unknown_kind_is_reported_as_corrupt() {
        let row = EntityDB {
            kind: "garage".to_string(),
            id: Uuid::new_v4().to_string(),
            parent_kind: None,
            parent_id: None,
            fields: "{}".to_string(),
            child_ids: "{}".to_string(),
            created_at: "2025-06-01T10:00:00Z".to_string(),
            updated_at: "2025-06-01T10:00:00Z".to_string(),
        };
        assert!(matches!(
            EntityRecord::try_from(row),
            Err(StorageError::Corrupt(_))
        ));
    }
}
