//! Per-collection diff of an incoming snapshot against persisted state.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::debug;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::identity::IdentityMap;
use super::relationships::{canonical_id, detach, link, rewrite_record, unlink};
use super::sync_model::SyncStats;
use super::sync_traits::SyncUnitOfWork;
use crate::errors::{Error, Result};
use crate::survey::{
    ComplessoRecord, EdificioRecord, EntityKind, EntityLink, EntityRecord, EntityRef,
    ImpiantoRecord,
    SegnalazioneRecord, TransferRecord, UnitaImmobiliareRecord,
};

/// Reconciles one full collection of `kind` against storage.
///
/// Absent entities are created, present ones updated when their fields or
/// parent changed, and persisted entities missing from `records` are deleted.
/// Records must already carry canonical ids. Reference links to children that
/// do not exist yet are appended to `unresolved`.
pub fn reconcile_collection<R: TransferRecord>(
    uow: &mut dyn SyncUnitOfWork,
    kind: EntityKind,
    records: &[R],
    now: DateTime<Utc>,
    unresolved: &mut Vec<EntityLink>,
) -> Result<SyncStats> {
    let mut stats = SyncStats {
        total: records.len(),
        ..SyncStats::default()
    };

    let incoming = records
        .iter()
        .map(|record| canonical_id(kind, record.id()))
        .collect::<Result<Vec<_>>>()?;
    let incoming_set: HashSet<Uuid> = incoming.iter().copied().collect();

    let mut unique_ids: Vec<Uuid> = incoming_set.iter().copied().collect();
    unique_ids.sort();
    let mut existing: HashMap<Uuid, EntityRecord> = uow
        .load_entities(kind, &unique_ids)?
        .into_iter()
        .map(|entity| (entity.id, entity))
        .collect();

    for (record, id) in records.iter().zip(incoming) {
        let this = EntityRef::new(kind, id);
        let fields = record.fields()?;
        let parent = match record.parent(kind)? {
            Some((parent_kind, raw)) => {
                Some(EntityRef::new(parent_kind, canonical_id(parent_kind, raw)?))
            }
            None => None,
        };

        match existing.get_mut(&id) {
            None => {
                let entity = EntityRecord::new(kind, id, parent, fields, now);
                uow.upsert_entity(&entity)?;
                existing.insert(id, entity);
                stats.created += 1;
            }
            Some(current) if current.fields != fields || current.parent != parent => {
                if let Some(previous) = current.parent.filter(|p| Some(*p) != parent) {
                    unlink(uow, previous, this)?;
                }
                current.fields = fields;
                current.parent = parent;
                current.updated_at = now;
                uow.upsert_entity(current)?;
                stats.updated += 1;
            }
            Some(_) => {
                stats.unchanged += 1;
            }
        }

        if let Some(parent) = parent {
            link(uow, parent, this)?;
        }

        let mut linked_children = false;
        for (child_kind, child_ids) in record.references(kind) {
            for raw in child_ids {
                let child = EntityRef::new(child_kind, canonical_id(child_kind, raw)?);
                if !link(uow, this, child)? {
                    continue;
                }
                linked_children = true;
                if uow.get_entity(child.kind, child.id)?.is_none() {
                    unresolved.push(EntityLink::new(this, child));
                }
            }
        }
        // Linking children rewrote this entity's cache in storage.
        if linked_children {
            if let Some(fresh) = uow.get_entity(kind, id)? {
                existing.insert(id, fresh);
            }
        }
    }

    let stale: Vec<EntityRecord> = uow
        .list_entities(kind)?
        .into_iter()
        .filter(|entity| !incoming_set.contains(&entity.id))
        .collect();
    for entity in &stale {
        detach(uow, entity)?;
        uow.delete_entity(entity.entity_ref())?;
        stats.deleted += 1;
    }

    debug!(
        "[Sync] Reconciled {}: {} created, {} updated, {} deleted, {} unchanged",
        kind, stats.created, stats.updated, stats.deleted, stats.unchanged
    );
    Ok(stats)
}

/// Typed records of one collection.
#[derive(Debug, Clone)]
pub enum DecodedCollection {
    Complessi(Vec<ComplessoRecord>),
    Edifici(Vec<EdificioRecord>),
    Unita(Vec<UnitaImmobiliareRecord>),
    Impianti(Vec<ImpiantoRecord>),
    Segnalazioni(Vec<SegnalazioneRecord>),
}

fn decode_records<R: DeserializeOwned>(
    kind: EntityKind,
    values: Vec<serde_json::Value>,
) -> Result<Vec<R>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|err| {
                Error::conversion(format!("Record {} of {} is malformed: {}", index, kind, err))
            })
        })
        .collect()
}

fn rewrite_all<R: TransferRecord>(
    kind: EntityKind,
    records: &mut [R],
    ids: &mut IdentityMap,
) -> Result<()> {
    records
        .iter_mut()
        .try_for_each(|record| rewrite_record(kind, record, ids))
}

impl DecodedCollection {
    pub fn decode(kind: EntityKind, values: Vec<serde_json::Value>) -> Result<Self> {
        Ok(match kind {
            EntityKind::Complesso => Self::Complessi(decode_records(kind, values)?),
            EntityKind::Edificio => Self::Edifici(decode_records(kind, values)?),
            EntityKind::UnitaImmobiliare => Self::Unita(decode_records(kind, values)?),
            EntityKind::SegnalazioneProblema => Self::Segnalazioni(decode_records(kind, values)?),
            _ => Self::Impianti(decode_records(kind, values)?),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Complessi(records) => records.len(),
            Self::Edifici(records) => records.len(),
            Self::Unita(records) => records.len(),
            Self::Impianti(records) => records.len(),
            Self::Segnalazioni(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rewrite(&mut self, kind: EntityKind, ids: &mut IdentityMap) -> Result<()> {
        match self {
            Self::Complessi(records) => rewrite_all(kind, records, ids),
            Self::Edifici(records) => rewrite_all(kind, records, ids),
            Self::Unita(records) => rewrite_all(kind, records, ids),
            Self::Impianti(records) => rewrite_all(kind, records, ids),
            Self::Segnalazioni(records) => rewrite_all(kind, records, ids),
        }
    }

    pub fn reconcile(
        &self,
        uow: &mut dyn SyncUnitOfWork,
        kind: EntityKind,
        now: DateTime<Utc>,
        unresolved: &mut Vec<EntityLink>,
    ) -> Result<SyncStats> {
        match self {
            Self::Complessi(records) => reconcile_collection(uow, kind, records, now, unresolved),
            Self::Edifici(records) => reconcile_collection(uow, kind, records, now, unresolved),
            Self::Unita(records) => reconcile_collection(uow, kind, records, now, unresolved),
            Self::Impianti(records) => reconcile_collection(uow, kind, records, now, unresolved),
            Self::Segnalazioni(records) => {
                reconcile_collection(uow, kind, records, now, unresolved)
            }
        }
    }
}

/// One payload collection on its way through the engine.
///
/// A decode or rewrite fault is kept as the message that the orchestrator
/// logs when it reaches this kind.
#[derive(Debug, Clone)]
pub struct KindBatch {
    pub kind: EntityKind,
    pub total: usize,
    pub decoded: std::result::Result<DecodedCollection, String>,
}

impl KindBatch {
    pub fn decode(kind: EntityKind, values: Vec<serde_json::Value>) -> Self {
        let total = values.len();
        Self {
            kind,
            total,
            decoded: DecodedCollection::decode(kind, values).map_err(|err| err.to_string()),
        }
    }

    /// Rewrites identifiers; a fault marks the whole batch as failed.
    pub fn rewrite(&mut self, ids: &mut IdentityMap) {
        let rewritten = match self.decoded.as_mut() {
            Ok(collection) => collection.rewrite(self.kind, ids),
            Err(_) => Ok(()),
        };
        if let Err(err) = rewritten {
            self.decoded = Err(err.to_string());
        }
    }

    pub fn reconcile(
        &self,
        uow: &mut dyn SyncUnitOfWork,
        now: DateTime<Utc>,
        unresolved: &mut Vec<EntityLink>,
    ) -> Result<SyncStats> {
        match &self.decoded {
            Ok(collection) => collection.reconcile(uow, self.kind, now, unresolved),
            Err(message) => Err(Error::conversion(message.clone())),
        }
    }
}
