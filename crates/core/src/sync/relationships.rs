//! Relationship maintenance for the sync engine.
//!
//! Before reconciliation every identifier in a transfer record is rewritten to
//! its canonical form. During reconciliation a parent's cached child list and
//! the link table are always changed together.

use std::collections::HashSet;

use log::{debug, warn};
use uuid::Uuid;

use super::identity::IdentityMap;
use super::sync_traits::SyncUnitOfWork;
use crate::errors::{Error, Result};
use crate::survey::{EntityKind, EntityLink, EntityRecord, EntityRef, TransferRecord};

/// Rewrites the id, parent pointer and reference lists of `record` in place.
pub fn rewrite_record<R: TransferRecord>(
    kind: EntityKind,
    record: &mut R,
    ids: &mut IdentityMap,
) -> Result<()> {
    let id = ids.resolve(kind, record.id())?;
    *record.id_mut() = id.to_string();

    let parent_kind = record.parent(kind)?.map(|(parent_kind, _)| parent_kind);
    if let (Some(parent_kind), Some(parent_id)) = (parent_kind, record.parent_id_mut()) {
        *parent_id = ids.resolve(parent_kind, parent_id)?.to_string();
    }

    for (target_kind, list) in record.references_mut(kind) {
        for raw in list.iter_mut() {
            *raw = ids.resolve(target_kind, raw)?.to_string();
        }
    }
    Ok(())
}

/// Parses an identifier that has already been rewritten.
pub fn canonical_id(kind: EntityKind, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| {
        Error::Identity(format!(
            "Identifier '{}' in {} was not rewritten to a canonical id",
            raw, kind
        ))
    })
}

/// Links `child` under `parent` and caches it in the parent's child list.
///
/// Returns false without writing anything when the parent does not exist.
pub fn link(uow: &mut dyn SyncUnitOfWork, parent: EntityRef, child: EntityRef) -> Result<bool> {
    let Some(mut parent_entity) = uow.get_entity(parent.kind, parent.id)? else {
        warn!(
            "[Sync] Skipping link {} -> {}: parent does not exist",
            parent, child
        );
        return Ok(false);
    };

    uow.insert_link(EntityLink::new(parent, child))?;
    if parent_entity.cache_child(child) {
        uow.upsert_entity(&parent_entity)?;
    }
    Ok(true)
}

/// Removes the link between `parent` and `child` and drops the cached id.
pub fn unlink(uow: &mut dyn SyncUnitOfWork, parent: EntityRef, child: EntityRef) -> Result<()> {
    uow.delete_link(EntityLink::new(parent, child))?;
    if let Some(mut parent_entity) = uow.get_entity(parent.kind, parent.id)? {
        if parent_entity.uncache_child(child) {
            uow.upsert_entity(&parent_entity)?;
        }
    }
    Ok(())
}

/// Drops the reference links in `links` whose child still does not exist.
///
/// Run once every collection of a call has been reconciled, so children that
/// arrive later in the same payload keep their links.
pub fn prune_unresolved(uow: &mut dyn SyncUnitOfWork, links: &[EntityLink]) -> Result<usize> {
    let mut seen = HashSet::new();
    let mut pruned = 0;
    for link in links {
        if !seen.insert(*link) {
            continue;
        }
        if uow.get_entity(link.child.kind, link.child.id)?.is_some() {
            continue;
        }
        warn!(
            "[Sync] Dropping reference {} -> {}: child does not exist",
            link.parent, link.child
        );
        unlink(uow, link.parent, link.child)?;
        pruned += 1;
    }
    Ok(pruned)
}

/// Detaches `entity` from everything that points at it or that it points at,
/// so it can be deleted without leaving dangling cache entries.
pub fn detach(uow: &mut dyn SyncUnitOfWork, entity: &EntityRecord) -> Result<()> {
    let this = entity.entity_ref();

    let mut parents: Vec<EntityRef> = uow
        .links_to_child(this)?
        .into_iter()
        .map(|link| link.parent)
        .collect();
    if let Some(parent) = entity.parent {
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }
    for parent in parents {
        unlink(uow, parent, this)?;
    }

    for link in uow.links_from_parent(this)? {
        uow.delete_link(link)?;
        let Some(mut child) = uow.get_entity(link.child.kind, link.child.id)? else {
            continue;
        };
        if child.parent == Some(this) {
            debug!("[Sync] Clearing parent of {} before deleting {}", link.child, this);
            child.parent = None;
            uow.upsert_entity(&child)?;
        }
    }
    Ok(())
}
