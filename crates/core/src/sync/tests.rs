use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::*;
use crate::errors::{Error, Result};
use crate::survey::{EntityKind, EntityLink, EntityRecord, EntityRef};

#[derive(Debug, Clone, Default, PartialEq)]
struct MemoryState {
    entities: BTreeMap<(EntityKind, Uuid), EntityRecord>,
    links: BTreeSet<(EntityRef, EntityRef)>,
    records: Vec<SyncRecord>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    fail_upserts_of: Option<EntityKind>,
    fail_audit: bool,
}

struct MemoryUnitOfWork {
    state: MemoryState,
    faults: Faults,
}

impl SyncUnitOfWork for MemoryUnitOfWork {
    fn load_entities(&mut self, kind: EntityKind, ids: &[Uuid]) -> Result<Vec<EntityRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.state.entities.get(&(kind, *id)).cloned())
            .collect())
    }

    fn list_entities(&mut self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        Ok(self
            .state
            .entities
            .values()
            .filter(|entity| entity.kind == kind)
            .cloned()
            .collect())
    }

    fn get_entity(&mut self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRecord>> {
        Ok(self.state.entities.get(&(kind, id)).cloned())
    }

    fn upsert_entity(&mut self, entity: &EntityRecord) -> Result<()> {
        if self.faults.fail_upserts_of == Some(entity.kind) {
            return Err(Error::Unexpected(format!("injected fault for {}", entity.kind)));
        }
        self.state
            .entities
            .insert((entity.kind, entity.id), entity.clone());
        Ok(())
    }

    fn delete_entity(&mut self, entity: EntityRef) -> Result<()> {
        self.state.entities.remove(&(entity.kind, entity.id));
        Ok(())
    }

    fn insert_link(&mut self, link: EntityLink) -> Result<()> {
        self.state.links.insert((link.parent, link.child));
        Ok(())
    }

    fn delete_link(&mut self, link: EntityLink) -> Result<()> {
        self.state.links.remove(&(link.parent, link.child));
        Ok(())
    }

    fn links_to_child(&mut self, child: EntityRef) -> Result<Vec<EntityLink>> {
        Ok(self
            .state
            .links
            .iter()
            .filter(|(_, c)| *c == child)
            .map(|(p, c)| EntityLink::new(*p, *c))
            .collect())
    }

    fn links_from_parent(&mut self, parent: EntityRef) -> Result<Vec<EntityLink>> {
        Ok(self
            .state
            .links
            .iter()
            .filter(|(p, _)| *p == parent)
            .map(|(p, c)| EntityLink::new(*p, *c))
            .collect())
    }

    fn insert_sync_record(&mut self, record: &SyncRecord) -> Result<()> {
        if self.faults.fail_audit {
            return Err(Error::Unexpected("injected audit fault".to_string()));
        }
        self.state.records.push(record.clone());
        Ok(())
    }

    fn savepoint(
        &mut self,
        job: &mut dyn FnMut(&mut dyn SyncUnitOfWork) -> Result<SyncStats>,
    ) -> Result<SyncStats> {
        let snapshot = self.state.clone();
        let result = job(self);
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }
}

#[derive(Default)]
struct MemoryRepository {
    state: Mutex<MemoryState>,
    faults: Mutex<Faults>,
}

impl MemoryRepository {
    fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    fn set_faults(&self, faults: Faults) {
        *self.faults.lock().unwrap() = faults;
    }

    fn entity(&self, kind: EntityKind, id: Uuid) -> Option<EntityRecord> {
        self.snapshot().entities.get(&(kind, id)).cloned()
    }

    fn count(&self, kind: EntityKind) -> usize {
        self.snapshot()
            .entities
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl SyncRepositoryTrait for MemoryRepository {
    async fn run_in_transaction(&self, job: SyncJob) -> Result<SyncOutcome> {
        let faults = *self.faults.lock().unwrap();
        let mut uow = MemoryUnitOfWork {
            state: self.snapshot(),
            faults,
        };
        let outcome = job(&mut uow)?;
        *self.state.lock().unwrap() = uow.state;
        Ok(outcome)
    }

    fn get_latest_sync_record(&self, device_id: &str) -> Result<Option<SyncRecord>> {
        Ok(self
            .snapshot()
            .records
            .into_iter()
            .filter(|record| record.device_id == device_id)
            .max_by_key(|record| (record.synced_at, record.id)))
    }

    async fn complete_file_sync(
        &self,
        notice: FileSyncNotice,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<SyncRecord>> {
        let mut state = self.state.lock().unwrap();
        let latest = state
            .records
            .iter_mut()
            .filter(|record| record.device_id == notice.device_id)
            .max_by_key(|record| (record.synced_at, record.id));
        Ok(latest.map(|record| {
            record.files_processed = notice.processed;
            record.files_succeeded = notice.succeeded;
            record.files_failed = notice.failed;
            record.file_sync_completed = notice.failed == 0;
            record.file_sync_completed_at = Some(completed_at);
            record.clone()
        }))
    }
}

fn setup(config: SyncConfig) -> (Arc<MemoryRepository>, SyncService) {
    let repository = Arc::new(MemoryRepository::default());
    let service = SyncService::new(repository.clone(), config);
    (repository, service)
}

fn request(data: Value) -> SyncRequest {
    serde_json::from_value(json!({
        "deviceId": "tablet-1",
        "platform": "android",
        "appVersion": "3.1.0",
        "timestamp": "2025-06-01T08:00:00Z",
        "data": data,
    }))
    .unwrap()
}

fn id(raw: &str) -> Uuid {
    derive_id(raw)
}

const INFISSO_UUID: &str = "0b8e9f5e-4a0c-4c6e-9d47-2f0f1f6b7a11";

fn survey_payload() -> Value {
    json!({
        "complessi": [
            { "Id": "C1", "Cod": "X", "Denominazione": "Scuola Verdi", "EdificiIds": ["E1"] }
        ],
        "edifici": [
            { "Id": "E1", "ParentId": "C1", "ParentType": "complesso", "NumeroPiani": 3,
              "InfissiIds": [format!("IF-{}", INFISSO_UUID)] },
            { "Id": "E2", "ParentId": "C1", "SuperficieLorda": 420.5 }
        ],
        "unitaImmobiliari": [
            { "Id": "U1", "ParentId": "E1", "ParentType": "edificio", "Vani": 4 }
        ],
        "strutture": [
            { "Id": "S1", "ParentId": "E1", "ParentType": "edificio", "Tipologia": "solaio",
              "SegnalazioniIds": ["P1"] }
        ],
        "infissi": [
            { "Id": format!("IF-{}", INFISSO_UUID), "ParentId": "U1", "ParentType": "unita",
              "Attributi": { "materiale": "legno" } }
        ],
        "segnalazioniProblemi": [
            { "Id": "P1", "StrutturaId": "S1", "Titolo": "Crepa", "Foto": ["a.jpg"] }
        ]
    })
}

#[tokio::test]
async fn creates_then_updates_a_single_complesso() {
    let (repository, service) = setup(SyncConfig::default());

    let outcome = service
        .sync_data(request(json!({ "complessi": [{ "Id": "C1", "Cod": "X" }] })))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.stats.created, 1);
    assert_eq!(outcome.per_kind_stats["complessi"].created, 1);

    let outcome = service
        .sync_data(request(json!({ "complessi": [{ "Id": "C1", "Cod": "Y" }] })))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.stats.updated, 1);
    assert_eq!(outcome.stats.created, 0);

    let stored = repository.entity(EntityKind::Complesso, id("C1")).unwrap();
    assert_eq!(stored.fields.get("Cod"), Some(&json!("Y")));
}

#[tokio::test]
async fn resubmitting_the_same_payload_changes_nothing() {
    let (repository, service) = setup(SyncConfig::default());

    let first = service.sync_data(request(survey_payload())).await.unwrap();
    assert!(first.success, "{}", first.message);
    assert_eq!(first.stats.created, 7);
    let state_after_first = repository.snapshot();

    let second = service.sync_data(request(survey_payload())).await.unwrap();
    assert!(second.success);
    assert_eq!(second.stats.created, 0);
    assert_eq!(second.stats.updated, 0);
    assert_eq!(second.stats.deleted, 0);
    assert_eq!(second.stats.unchanged, 7);

    let state_after_second = repository.snapshot();
    assert_eq!(state_after_first.entities, state_after_second.entities);
    assert_eq!(state_after_first.links, state_after_second.links);
    assert_eq!(state_after_second.records.len(), 2);
}

#[tokio::test]
async fn identifiers_resolve_deterministically() {
    let (repository, service) = setup(SyncConfig::default());
    service.sync_data(request(survey_payload())).await.unwrap();

    let edificio = repository.entity(EntityKind::Edificio, id("E1")).unwrap();
    assert_eq!(
        edificio.parent,
        Some(EntityRef::new(EntityKind::Complesso, id("C1")))
    );

    let infisso_id = Uuid::parse_str(INFISSO_UUID).unwrap();
    let infisso = repository.entity(EntityKind::Infisso, infisso_id).unwrap();
    assert_eq!(
        infisso.parent,
        Some(EntityRef::new(EntityKind::UnitaImmobiliare, id("U1")))
    );
    assert_eq!(
        infisso.fields.get("Attributi"),
        Some(&json!({ "materiale": "legno" }))
    );
}

#[tokio::test]
async fn parent_caches_mirror_links() {
    let (repository, service) = setup(SyncConfig::default());
    service.sync_data(request(survey_payload())).await.unwrap();

    let c1 = EntityRef::new(EntityKind::Complesso, id("C1"));
    let e1 = EntityRef::new(EntityKind::Edificio, id("E1"));
    let e2 = EntityRef::new(EntityKind::Edificio, id("E2"));

    let complesso = repository.entity(c1.kind, c1.id).unwrap();
    assert_eq!(complesso.cached_children(EntityKind::Edificio), &[e1.id, e2.id]);

    let edificio = repository.entity(e1.kind, e1.id).unwrap();
    let infisso_id = Uuid::parse_str(INFISSO_UUID).unwrap();
    assert_eq!(edificio.cached_children(EntityKind::Infisso), &[infisso_id]);

    let struttura = repository.entity(EntityKind::Struttura, id("S1")).unwrap();
    assert_eq!(
        struttura.cached_children(EntityKind::SegnalazioneProblema),
        &[id("P1")]
    );

    // Every cached id has a link and every link is cached.
    let state = repository.snapshot();
    for entity in state.entities.values() {
        for (kind, ids) in &entity.child_ids {
            for child in ids {
                assert!(state
                    .links
                    .contains(&(entity.entity_ref(), EntityRef::new(*kind, *child))));
            }
        }
    }
    for (parent, child) in &state.links {
        let parent = &state.entities[&(parent.kind, parent.id)];
        assert!(parent.cached_children(child.kind).contains(&child.id));
    }
}

#[tokio::test]
async fn moving_a_child_relinks_both_parents() {
    let (repository, service) = setup(SyncConfig::default());
    service
        .sync_data(request(json!({
            "complessi": [{ "Id": "C1" }, { "Id": "C2" }],
            "edifici": [{ "Id": "E1", "ParentId": "C1" }]
        })))
        .await
        .unwrap();

    let outcome = service
        .sync_data(request(json!({
            "complessi": [{ "Id": "C1" }, { "Id": "C2" }],
            "edifici": [{ "Id": "E1", "ParentId": "C2" }]
        })))
        .await
        .unwrap();
    assert_eq!(outcome.per_kind_stats["edifici"].updated, 1);

    let c1 = repository.entity(EntityKind::Complesso, id("C1")).unwrap();
    let c2 = repository.entity(EntityKind::Complesso, id("C2")).unwrap();
    assert!(c1.cached_children(EntityKind::Edificio).is_empty());
    assert_eq!(c2.cached_children(EntityKind::Edificio), &[id("E1")]);
    assert_eq!(repository.snapshot().links.len(), 1);
}

#[tokio::test]
async fn omitted_entities_are_deleted_and_detached() {
    let (repository, service) = setup(SyncConfig::default());
    service.sync_data(request(survey_payload())).await.unwrap();

    let outcome = service
        .sync_data(request(json!({
            "edifici": [{ "Id": "E1", "ParentId": "C1" }]
        })))
        .await
        .unwrap();
    assert_eq!(outcome.per_kind_stats["edifici"].deleted, 1);
    assert_eq!(outcome.per_kind_stats["edifici"].updated, 1);
    assert!(!outcome.per_kind_stats.contains_key("complessi"));

    let complesso = repository.entity(EntityKind::Complesso, id("C1")).unwrap();
    assert_eq!(complesso.cached_children(EntityKind::Edificio), &[id("E1")]);
    assert!(repository.entity(EntityKind::Edificio, id("E2")).is_none());
    // Absent collections are untouched.
    assert_eq!(repository.count(EntityKind::UnitaImmobiliare), 1);
}

#[tokio::test]
async fn empty_collection_deletes_every_entity_of_its_kind() {
    let (repository, service) = setup(SyncConfig::default());
    service.sync_data(request(survey_payload())).await.unwrap();

    let outcome = service
        .sync_data(request(json!({ "complessi": [] })))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.stats.deleted, 1);
    assert_eq!(repository.count(EntityKind::Complesso), 0);

    // Children survive with their parent pointer cleared.
    let edificio = repository.entity(EntityKind::Edificio, id("E1")).unwrap();
    assert!(edificio.parent.is_none());
    let state = repository.snapshot();
    assert!(state
        .links
        .iter()
        .all(|(parent, _)| parent.kind != EntityKind::Complesso));
}

#[tokio::test]
async fn failing_collection_is_rolled_back_alone() {
    let (repository, service) = setup(SyncConfig::default());
    repository.set_faults(Faults {
        fail_upserts_of: Some(EntityKind::Infisso),
        ..Faults::default()
    });

    let outcome = service.sync_data(request(survey_payload())).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.message.contains("infissi"), "{}", outcome.message);
    assert_eq!(outcome.per_kind_stats["infissi"], SyncStats::degraded(1));
    assert_eq!(outcome.per_kind_stats["edifici"].created, 2);

    assert_eq!(repository.count(EntityKind::Infisso), 0);
    assert_eq!(repository.count(EntityKind::Edificio), 2);
    assert_eq!(repository.count(EntityKind::SegnalazioneProblema), 1);
    assert_eq!(repository.snapshot().records.len(), 1);
}

#[tokio::test]
async fn malformed_collection_degrades_without_blocking_others() {
    let (repository, service) = setup(SyncConfig::default());

    let outcome = service
        .sync_data(request(json!({
            "complessi": [{ "Id": "C1" }],
            "edifici": [{ "Id": "E1", "NumeroPiani": "tre" }, { "Id": "E2" }]
        })))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.per_kind_stats["edifici"], SyncStats::degraded(2));
    assert_eq!(outcome.stats.total, 3);
    assert_eq!(outcome.stats.created, 1);
    assert_eq!(repository.count(EntityKind::Complesso), 1);
    assert_eq!(repository.count(EntityKind::Edificio), 0);
}

#[tokio::test]
async fn audit_fault_rolls_back_everything() {
    let (repository, service) = setup(SyncConfig::default());
    repository.set_faults(Faults {
        fail_audit: true,
        ..Faults::default()
    });

    let outcome = service.sync_data(request(survey_payload())).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(repository.snapshot(), MemoryState::default());
}

#[tokio::test]
async fn malformed_requests_are_rejected_before_any_write() {
    let (repository, service) = setup(SyncConfig::default());

    let missing_data: SyncRequest =
        serde_json::from_value(json!({ "deviceId": "tablet-1" })).unwrap();
    assert!(matches!(
        service.sync_data(missing_data).await,
        Err(Error::Validation(_))
    ));

    let mut blank_device = request(json!({ "complessi": [] }));
    blank_device.device_id = "  ".to_string();
    assert!(matches!(
        service.sync_data(blank_device).await,
        Err(Error::Validation(_))
    ));

    assert_eq!(repository.snapshot(), MemoryState::default());
}

#[tokio::test]
async fn mobile_payload_is_normalized_before_reconciliation() {
    let (repository, service) = setup(SyncConfig::default());

    let outcome = service
        .sync_data(request(json!({
            "complessi": [{ "id": "C1", "cod": "X", "syncStatus": "dirty" }],
            "edifici": [{ "id": "E1", "idComplesso": "C1", "numeroPiani": "2" }]
        })))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.stats.created, 2);

    let edificio = repository.entity(EntityKind::Edificio, id("E1")).unwrap();
    assert_eq!(
        edificio.parent,
        Some(EntityRef::new(EntityKind::Complesso, id("C1")))
    );
    assert_eq!(edificio.fields.get("NumeroPiani"), Some(&json!(2)));
}

#[tokio::test]
async fn mobile_scope_keys_are_not_taken_as_parents() {
    let (repository, service) = setup(SyncConfig::default());

    let outcome = service
        .sync_data(request(json!({
            "complessi": [{ "id": "C1" }],
            "edifici": [{ "id": "E1", "idEdificio": "E1", "idComplesso": "C1" }],
            "unitaImmobiliari": [{ "id": "U1", "idUnita": "U1", "idEdificio": "E1" }]
        })))
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(!outcome.message.contains("errors"), "{}", outcome.message);
    assert_eq!(outcome.stats.created, 3);

    let edificio = repository.entity(EntityKind::Edificio, id("E1")).unwrap();
    assert_eq!(
        edificio.parent,
        Some(EntityRef::new(EntityKind::Complesso, id("C1")))
    );
    let unita = repository
        .entity(EntityKind::UnitaImmobiliare, id("U1"))
        .unwrap();
    assert_eq!(
        unita.parent,
        Some(EntityRef::new(EntityKind::Edificio, id("E1")))
    );
}

#[tokio::test]
async fn blank_parent_type_keeps_the_collection() {
    let (repository, service) = setup(SyncConfig::default());

    let outcome = service
        .sync_data(request(json!({
            "complessi": [{ "Id": "C1" }],
            "edifici": [
                { "Id": "E1", "ParentId": "", "ParentType": "" },
                { "Id": "E2", "ParentId": "C1", "ParentType": " " }
            ]
        })))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.per_kind_stats["edifici"].created, 2);

    assert_eq!(repository.entity(EntityKind::Edificio, id("E1")).unwrap().parent, None);
    assert_eq!(
        repository.entity(EntityKind::Edificio, id("E2")).unwrap().parent,
        Some(EntityRef::new(EntityKind::Complesso, id("C1")))
    );
}

#[tokio::test]
async fn normalization_fault_fails_the_call_without_writes() {
    let (repository, service) = setup(SyncConfig::default());

    let outcome = service
        .sync_data(request(json!({ "complessi": [{ "id": "C1" }, 42] })))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(repository.snapshot(), MemoryState::default());
}

#[tokio::test]
async fn duplicate_ids_update_the_first_occurrence() {
    let (repository, service) = setup(SyncConfig::default());

    let outcome = service
        .sync_data(request(json!({
            "complessi": [{ "Id": "C1", "Cod": "A" }, { "Id": "C1", "Cod": "B" }]
        })))
        .await
        .unwrap();
    assert_eq!(outcome.stats.total, 2);
    assert_eq!(outcome.stats.created, 1);
    assert_eq!(outcome.stats.updated, 1);
    assert_eq!(repository.count(EntityKind::Complesso), 1);
    let stored = repository.entity(EntityKind::Complesso, id("C1")).unwrap();
    assert_eq!(stored.fields.get("Cod"), Some(&json!("B")));
}

#[tokio::test]
async fn prefixed_ids_without_uuid_follow_the_configured_fallback() {
    let payload = json!({ "documentiGenerali": [{ "Id": "DG-7", "NomeFile": "pianta.pdf" }] });

    let (repository, service) = setup(SyncConfig::default());
    service.sync_data(request(payload.clone())).await.unwrap();
    let outcome = service.sync_data(request(payload.clone())).await.unwrap();
    assert_eq!(outcome.stats.created, 1);
    assert_eq!(outcome.stats.deleted, 1);
    assert_eq!(repository.count(EntityKind::DocumentoGenerale), 1);

    let (repository, service) = setup(SyncConfig {
        prefixed_id_fallback: PrefixedIdFallback::Deterministic,
    });
    service.sync_data(request(payload.clone())).await.unwrap();
    let outcome = service.sync_data(request(payload)).await.unwrap();
    assert_eq!(outcome.stats.unchanged, 1);
    assert!(repository
        .entity(EntityKind::DocumentoGenerale, id("DG-7"))
        .is_some());
}

#[tokio::test]
async fn link_to_missing_parent_is_skipped() {
    let (repository, service) = setup(SyncConfig::default());

    let outcome = service
        .sync_data(request(json!({
            "unitaImmobiliari": [{ "Id": "U1", "ParentId": "E-missing" }]
        })))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.stats.created, 1);
    assert!(repository.snapshot().links.is_empty());
}

#[tokio::test]
async fn references_to_entities_that_never_arrive_are_dropped() {
    let (repository, service) = setup(SyncConfig::default());
    let payload = json!({ "complessi": [{ "Id": "C1", "InfissiIds": ["IF-7"] }] });

    for round in 0..2 {
        let outcome = service.sync_data(request(payload.clone())).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.stats.created + outcome.stats.unchanged, 1, "round {}", round);

        let complesso = repository.entity(EntityKind::Complesso, id("C1")).unwrap();
        assert!(complesso.cached_children(EntityKind::Infisso).is_empty());
        assert!(repository.snapshot().links.is_empty());
    }
}

#[tokio::test]
async fn references_to_previously_synced_entities_are_kept() {
    let (repository, service) = setup(SyncConfig::default());
    let infisso = format!("IF-{}", INFISSO_UUID);
    let infisso_id = Uuid::parse_str(INFISSO_UUID).unwrap();

    service
        .sync_data(request(json!({
            "complessi": [{ "Id": "C1" }],
            "infissi": [{ "Id": infisso }]
        })))
        .await
        .unwrap();
    service
        .sync_data(request(json!({
            "complessi": [{ "Id": "C1", "InfissiIds": [infisso] }]
        })))
        .await
        .unwrap();

    let complesso = repository.entity(EntityKind::Complesso, id("C1")).unwrap();
    assert_eq!(complesso.cached_children(EntityKind::Infisso), &[infisso_id]);
    assert_eq!(repository.snapshot().links.len(), 1);
}

#[tokio::test]
async fn status_and_file_completion_track_the_latest_record() {
    let (_repository, service) = setup(SyncConfig::default());

    let status = service.get_sync_status("tablet-1").unwrap();
    assert_eq!(status.status, STATUS_NEVER_SYNCED);

    let missing = service
        .complete_file_sync(FileSyncNotice {
            device_id: "tablet-1".to_string(),
            processed: 1,
            succeeded: 1,
            failed: 0,
        })
        .await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    service
        .sync_data(request(json!({ "complessi": [{ "Id": "C1" }] })))
        .await
        .unwrap();
    let status = service.get_sync_status("tablet-1").unwrap();
    assert_eq!(status.status, STATUS_LAST_SYNC_COMPLETED);
    let record = status.last_record.unwrap();
    assert_eq!(record.created, 1);
    assert_eq!(record.platform.as_deref(), Some("android"));
    assert_eq!(record.client_timestamp.as_deref(), Some("2025-06-01T08:00:00Z"));

    let completed = service
        .complete_file_sync(FileSyncNotice {
            device_id: "tablet-1".to_string(),
            processed: 3,
            succeeded: 2,
            failed: 1,
        })
        .await
        .unwrap();
    assert_eq!(completed.id, record.id);
    assert_eq!(completed.files_failed, 1);
    assert!(!completed.file_sync_completed);
    assert!(completed.file_sync_completed_at.is_some());
}
