use uuid::Uuid;

use super::survey_model::{EntityKind, EntityRecord};
use crate::errors::Result;

/// Read-only access to persisted survey entities.
pub trait EntityRepositoryTrait: Send + Sync {
    /// All entities of `kind`, ordered by id.
    fn list_entities(&self, kind: EntityKind) -> Result<Vec<EntityRecord>>;

    fn get_entity(&self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRecord>>;
}
