//! Canonical survey entities as persisted by the storage layer.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every entity kind handled by the sync engine.
///
/// Declaration order is the reconciliation order: parents come before the
/// children that attach to them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Complesso,
    Edificio,
    UnitaImmobiliare,
    Struttura,
    Infisso,
    IdraulicoAdduzione,
    ScarichiIdriciFognari,
    ImpiantoClimaAcs,
    ImpiantiElettrici,
    AltriImpianti,
    DocumentoGenerale,
    SegnalazioneProblema,
}

impl EntityKind {
    /// Reconciliation order used by the sync orchestrator.
    pub const SYNC_ORDER: [EntityKind; 12] = [
        EntityKind::Complesso,
        EntityKind::Edificio,
        EntityKind::UnitaImmobiliare,
        EntityKind::Struttura,
        EntityKind::Infisso,
        EntityKind::IdraulicoAdduzione,
        EntityKind::ScarichiIdriciFognari,
        EntityKind::ImpiantoClimaAcs,
        EntityKind::ImpiantiElettrici,
        EntityKind::AltriImpianti,
        EntityKind::DocumentoGenerale,
        EntityKind::SegnalazioneProblema,
    ];

    /// Name of the payload collection carrying this kind.
    pub fn collection_name(self) -> &'static str {
        match self {
            EntityKind::Complesso => "complessi",
            EntityKind::Edificio => "edifici",
            EntityKind::UnitaImmobiliare => "unitaImmobiliari",
            EntityKind::Struttura => "strutture",
            EntityKind::Infisso => "infissi",
            EntityKind::IdraulicoAdduzione => "idraulicoAdduzione",
            EntityKind::ScarichiIdriciFognari => "scarichiIdriciFognari",
            EntityKind::ImpiantoClimaAcs => "impiantoClimaAcs",
            EntityKind::ImpiantiElettrici => "impiantiElettrici",
            EntityKind::AltriImpianti => "altriImpianti",
            EntityKind::DocumentoGenerale => "documentiGenerali",
            EntityKind::SegnalazioneProblema => "segnalazioniProblemi",
        }
    }

    pub fn from_collection_name(name: &str) -> Option<Self> {
        Self::SYNC_ORDER
            .into_iter()
            .find(|kind| kind.collection_name() == name)
    }

    /// Storage discriminator, identical to the serde representation.
    pub fn as_db_str(self) -> &'static str {
        match self {
            EntityKind::Complesso => "complesso",
            EntityKind::Edificio => "edificio",
            EntityKind::UnitaImmobiliare => "unita_immobiliare",
            EntityKind::Struttura => "struttura",
            EntityKind::Infisso => "infisso",
            EntityKind::IdraulicoAdduzione => "idraulico_adduzione",
            EntityKind::ScarichiIdriciFognari => "scarichi_idrici_fognari",
            EntityKind::ImpiantoClimaAcs => "impianto_clima_acs",
            EntityKind::ImpiantiElettrici => "impianti_elettrici",
            EntityKind::AltriImpianti => "altri_impianti",
            EntityKind::DocumentoGenerale => "documento_generale",
            EntityKind::SegnalazioneProblema => "segnalazione_problema",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        Self::SYNC_ORDER
            .into_iter()
            .find(|kind| kind.as_db_str() == value)
    }

    /// Two-letter category code accepted in front of client ids.
    ///
    /// Kinds with a code resolve ids through the prefixed convention; the
    /// others always use deterministic derivation.
    pub fn id_prefix(self) -> Option<&'static str> {
        match self {
            EntityKind::Infisso => Some("IF"),
            EntityKind::IdraulicoAdduzione => Some("IA"),
            EntityKind::ScarichiIdriciFognari => Some("SF"),
            EntityKind::ImpiantoClimaAcs => Some("CA"),
            EntityKind::ImpiantiElettrici => Some("EL"),
            EntityKind::AltriImpianti => Some("AI"),
            EntityKind::DocumentoGenerale => Some("DG"),
            _ => None,
        }
    }

    /// Kinds that share the installation transfer shape.
    pub fn is_installation(self) -> bool {
        matches!(
            self,
            EntityKind::Struttura
                | EntityKind::Infisso
                | EntityKind::IdraulicoAdduzione
                | EntityKind::ScarichiIdriciFognari
                | EntityKind::ImpiantoClimaAcs
                | EntityKind::ImpiantiElettrici
                | EntityKind::AltriImpianti
                | EntityKind::DocumentoGenerale
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// Parent discriminator carried by transfer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentType {
    #[serde(alias = "Complesso")]
    Complesso,
    #[serde(alias = "Edificio")]
    Edificio,
    #[serde(alias = "Unita", alias = "unitaImmobiliare", alias = "UnitaImmobiliare")]
    Unita,
}

impl ParentType {
    pub fn kind(self) -> EntityKind {
        match self {
            ParentType::Complesso => EntityKind::Complesso,
            ParentType::Edificio => EntityKind::Edificio,
            ParentType::Unita => EntityKind::UnitaImmobiliare,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParentType::Complesso => "complesso",
            ParentType::Edificio => "edificio",
            ParentType::Unita => "unita",
        }
    }
}

/// Typed pointer to a persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_db_str(), self.id)
    }
}

/// Relational parent/child link. The parent's cached id list mirrors these rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLink {
    pub parent: EntityRef,
    pub child: EntityRef,
}

impl EntityLink {
    pub fn new(parent: EntityRef, child: EntityRef) -> Self {
        Self { parent, child }
    }
}

/// A canonical entity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub id: Uuid,
    pub parent: Option<EntityRef>,
    /// Mapped scalar fields, keyed by canonical field name.
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// Cached child id lists, one per child kind.
    pub child_ids: BTreeMap<EntityKind, Vec<Uuid>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(
        kind: EntityKind,
        id: Uuid,
        parent: Option<EntityRef>,
        fields: serde_json::Map<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            id,
            parent,
            fields,
            child_ids: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id)
    }

    pub fn cached_children(&self, kind: EntityKind) -> &[Uuid] {
        self.child_ids.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Adds `child` to the cached list. Returns false when it was already there.
    pub fn cache_child(&mut self, child: EntityRef) -> bool {
        let ids = self.child_ids.entry(child.kind).or_default();
        if ids.contains(&child.id) {
            return false;
        }
        ids.push(child.id);
        true
    }

    /// Removes `child` from the cached list. Returns false when it was absent.
    pub fn uncache_child(&mut self, child: EntityRef) -> bool {
        let Some(ids) = self.child_ids.get_mut(&child.kind) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|id| *id != child.id);
        let removed = ids.len() != before;
        if ids.is_empty() {
            self.child_ids.remove(&child.kind);
        }
        removed
    }
}
