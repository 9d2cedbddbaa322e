//! Wire-shaped transfer records received from survey clients.
//!
//! Transfer records carry string identifiers (client ids may be short codes) and
//! explicit `ParentId`/`ParentType` discriminators instead of foreign keys. Each
//! record splits into structural fields (ids, parent pointer, reference lists),
//! which the sync engine rewrites and turns into links, and a data part whose
//! serialized form is what gets persisted and compared.

use rust_decimal::Decimal;
use serde::de::value::StrDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Deserializer, Serialize};

use super::survey_model::{EntityKind, ParentType};
use crate::errors::{Error, Result};

/// Treats an explicit `null` list like an absent one.
fn nullable_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_map<'de, D>(
    deserializer: D,
) -> std::result::Result<serde_json::Map<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<serde_json::Map<String, serde_json::Value>>::deserialize(deserializer)?
        .unwrap_or_default())
}

/// Blank or whitespace-only discriminators mean "no parent type".
fn blank_parent_type<'de, D>(deserializer: D) -> std::result::Result<Option<ParentType>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: StrDeserializer<'_, D::Error> = trimmed.into_deserializer();
    ParentType::deserialize(value).map(Some)
}

/// Contract implemented by every transfer record shape.
///
/// The same shape may serve several kinds (installations share one), so
/// kind-dependent answers take the kind being reconciled.
pub trait TransferRecord: DeserializeOwned + Send + Sync {
    fn id(&self) -> &str;

    fn id_mut(&mut self) -> &mut String;

    /// Declared parent as (kind, id). Fails when the discriminator is not a
    /// valid parent scope for `kind`.
    fn parent(&self, kind: EntityKind) -> Result<Option<(EntityKind, &str)>>;

    fn parent_id_mut(&mut self) -> Option<&mut String>;

    /// Many-to-many reference lists, keyed by the kind they point to.
    fn references(&self, kind: EntityKind) -> Vec<(EntityKind, &[String])>;

    fn references_mut(&mut self, kind: EntityKind) -> Vec<(EntityKind, &mut Vec<String>)>;

    /// Mapped scalar fields as persisted on the canonical entity.
    fn fields(&self) -> Result<serde_json::Map<String, serde_json::Value>>;
}

fn data_fields<T: Serialize>(data: &T) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(data)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::Unexpected(format!(
            "Transfer record data serialized to a non-object value: {}",
            other
        ))),
    }
}

/// `ParentId`/`ParentType` pair.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParentPointer {
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "blank_parent_type")]
    pub parent_type: Option<ParentType>,
}

impl ParentPointer {
    /// Resolves the pointer against the parent scopes `kind` accepts. A missing
    /// discriminator falls back to the single natural parent when there is one.
    fn resolve(
        &self,
        kind: EntityKind,
        allowed: &[ParentType],
    ) -> Result<Option<(EntityKind, &str)>> {
        let Some(parent_id) = self
            .parent_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };

        let parent_type = match (self.parent_type, allowed) {
            (Some(parent_type), _) => parent_type,
            (None, [only]) => *only,
            (None, _) => {
                return Err(Error::conversion(format!(
                    "{} record with ParentId '{}' has no ParentType",
                    kind, parent_id
                )))
            }
        };

        if !allowed.contains(&parent_type) {
            return Err(Error::conversion(format!(
                "ParentType '{}' is not a valid parent for {}",
                parent_type.as_str(),
                kind
            )));
        }

        Ok(Some((parent_type.kind(), parent_id)))
    }

    fn id_mut(&mut self) -> Option<&mut String> {
        self.parent_id.as_mut().filter(|id| !id.trim().is_empty())
    }
}

/// Installation reference lists carried by complexes, buildings and units.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallationRefs {
    #[serde(default, deserialize_with = "nullable_list")]
    pub strutture_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub infissi_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub idraulico_adduzione_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub scarichi_idrici_fognari_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub impianto_clima_acs_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub impianti_elettrici_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub altri_impianti_ids: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub documenti_generali_ids: Vec<String>,
}

impl InstallationRefs {
    fn lists(&self) -> Vec<(EntityKind, &[String])> {
        vec![
            (EntityKind::Struttura, self.strutture_ids.as_slice()),
            (EntityKind::Infisso, self.infissi_ids.as_slice()),
            (EntityKind::IdraulicoAdduzione, self.idraulico_adduzione_ids.as_slice()),
            (EntityKind::ScarichiIdriciFognari, self.scarichi_idrici_fognari_ids.as_slice()),
            (EntityKind::ImpiantoClimaAcs, self.impianto_clima_acs_ids.as_slice()),
            (EntityKind::ImpiantiElettrici, self.impianti_elettrici_ids.as_slice()),
            (EntityKind::AltriImpianti, self.altri_impianti_ids.as_slice()),
            (EntityKind::DocumentoGenerale, self.documenti_generali_ids.as_slice()),
        ]
    }

    fn lists_mut(&mut self) -> Vec<(EntityKind, &mut Vec<String>)> {
        vec![
            (EntityKind::Struttura, &mut self.strutture_ids),
            (EntityKind::Infisso, &mut self.infissi_ids),
            (EntityKind::IdraulicoAdduzione, &mut self.idraulico_adduzione_ids),
            (EntityKind::ScarichiIdriciFognari, &mut self.scarichi_idrici_fognari_ids),
            (EntityKind::ImpiantoClimaAcs, &mut self.impianto_clima_acs_ids),
            (EntityKind::ImpiantiElettrici, &mut self.impianti_elettrici_ids),
            (EntityKind::AltriImpianti, &mut self.altri_impianti_ids),
            (EntityKind::DocumentoGenerale, &mut self.documenti_generali_ids),
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Complesso
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComplessoData {
    #[serde(default)]
    pub cod: Option<String>,
    #[serde(default)]
    pub denominazione: Option<String>,
    #[serde(default)]
    pub indirizzo: Option<String>,
    #[serde(default)]
    pub comune: Option<String>,
    #[serde(default)]
    pub provincia: Option<String>,
    #[serde(default)]
    pub cap: Option<String>,
    #[serde(default)]
    pub latitudine: Option<Decimal>,
    #[serde(default)]
    pub longitudine: Option<Decimal>,
    #[serde(default)]
    pub data_rilievo: Option<String>,
    #[serde(default)]
    pub rilevatore: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComplessoRecord {
    pub id: String,
    #[serde(default, deserialize_with = "nullable_list")]
    pub edifici_ids: Vec<String>,
    #[serde(flatten)]
    pub refs: InstallationRefs,
    #[serde(flatten)]
    pub data: ComplessoData,
}

impl TransferRecord for ComplessoRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn id_mut(&mut self) -> &mut String {
        &mut self.id
    }

    fn parent(&self, _kind: EntityKind) -> Result<Option<(EntityKind, &str)>> {
        Ok(None)
    }

    fn parent_id_mut(&mut self) -> Option<&mut String> {
        None
    }

    fn references(&self, _kind: EntityKind) -> Vec<(EntityKind, &[String])> {
        let mut lists = vec![(EntityKind::Edificio, self.edifici_ids.as_slice())];
        lists.extend(self.refs.lists());
        lists
    }

    fn references_mut(&mut self, _kind: EntityKind) -> Vec<(EntityKind, &mut Vec<String>)> {
        let mut lists = vec![(EntityKind::Edificio, &mut self.edifici_ids)];
        lists.extend(self.refs.lists_mut());
        lists
    }

    fn fields(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        data_fields(&self.data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Edificio
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EdificioData {
    #[serde(default)]
    pub cod: Option<String>,
    #[serde(default)]
    pub denominazione: Option<String>,
    #[serde(default)]
    pub numero_piani: Option<i32>,
    #[serde(default)]
    pub anno_costruzione: Option<i32>,
    #[serde(default)]
    pub superficie_lorda: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub destinazione_uso: Option<String>,
    #[serde(default)]
    pub stato_conservazione: Option<String>,
    #[serde(default)]
    pub data_rilievo: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EdificioRecord {
    pub id: String,
    #[serde(flatten)]
    pub parent: ParentPointer,
    #[serde(default, deserialize_with = "nullable_list")]
    pub unita_immobiliari_ids: Vec<String>,
    #[serde(flatten)]
    pub refs: InstallationRefs,
    #[serde(flatten)]
    pub data: EdificioData,
}

impl TransferRecord for EdificioRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn id_mut(&mut self) -> &mut String {
        &mut self.id
    }

    fn parent(&self, kind: EntityKind) -> Result<Option<(EntityKind, &str)>> {
        self.parent.resolve(kind, &[ParentType::Complesso])
    }

    fn parent_id_mut(&mut self) -> Option<&mut String> {
        self.parent.id_mut()
    }

    fn references(&self, _kind: EntityKind) -> Vec<(EntityKind, &[String])> {
        let mut lists = vec![(
            EntityKind::UnitaImmobiliare,
            self.unita_immobiliari_ids.as_slice(),
        )];
        lists.extend(self.refs.lists());
        lists
    }

    fn references_mut(&mut self, _kind: EntityKind) -> Vec<(EntityKind, &mut Vec<String>)> {
        let mut lists = vec![(EntityKind::UnitaImmobiliare, &mut self.unita_immobiliari_ids)];
        lists.extend(self.refs.lists_mut());
        lists
    }

    fn fields(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        data_fields(&self.data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UnitaImmobiliare
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitaImmobiliareData {
    #[serde(default)]
    pub cod: Option<String>,
    #[serde(default)]
    pub piano: Option<String>,
    #[serde(default)]
    pub interno: Option<String>,
    #[serde(default)]
    pub destinazione_uso: Option<String>,
    #[serde(default)]
    pub superficie: Option<Decimal>,
    #[serde(default)]
    pub vani: Option<i32>,
    #[serde(default)]
    pub foglio: Option<String>,
    #[serde(default)]
    pub particella: Option<String>,
    #[serde(default)]
    pub subalterno: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitaImmobiliareRecord {
    pub id: String,
    #[serde(flatten)]
    pub parent: ParentPointer,
    #[serde(flatten)]
    pub refs: InstallationRefs,
    #[serde(flatten)]
    pub data: UnitaImmobiliareData,
}

impl TransferRecord for UnitaImmobiliareRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn id_mut(&mut self) -> &mut String {
        &mut self.id
    }

    fn parent(&self, kind: EntityKind) -> Result<Option<(EntityKind, &str)>> {
        self.parent.resolve(kind, &[ParentType::Edificio])
    }

    fn parent_id_mut(&mut self) -> Option<&mut String> {
        self.parent.id_mut()
    }

    fn references(&self, _kind: EntityKind) -> Vec<(EntityKind, &[String])> {
        self.refs.lists()
    }

    fn references_mut(&mut self, _kind: EntityKind) -> Vec<(EntityKind, &mut Vec<String>)> {
        self.refs.lists_mut()
    }

    fn fields(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        data_fields(&self.data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Structures, installations and documents
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImpiantoData {
    #[serde(default)]
    pub cod: Option<String>,
    #[serde(default)]
    pub tipologia: Option<String>,
    #[serde(default)]
    pub descrizione: Option<String>,
    #[serde(default)]
    pub stato: Option<String>,
    #[serde(default)]
    pub quantita: Option<Decimal>,
    #[serde(default)]
    pub data_installazione: Option<String>,
    #[serde(default)]
    pub nome_file: Option<String>,
    #[serde(default)]
    pub percorso_file: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Kind-specific attributes kept as sent.
    #[serde(default, deserialize_with = "nullable_map")]
    pub attributi: serde_json::Map<String, serde_json::Value>,
}

/// Shared shape of Strutture, the installation kinds and DocumentiGenerali.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImpiantoRecord {
    pub id: String,
    #[serde(flatten)]
    pub parent: ParentPointer,
    /// Only meaningful on Strutture.
    #[serde(default, deserialize_with = "nullable_list")]
    pub segnalazioni_ids: Vec<String>,
    #[serde(flatten)]
    pub data: ImpiantoData,
}

impl TransferRecord for ImpiantoRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn id_mut(&mut self) -> &mut String {
        &mut self.id
    }

    fn parent(&self, kind: EntityKind) -> Result<Option<(EntityKind, &str)>> {
        self.parent.resolve(
            kind,
            &[ParentType::Complesso, ParentType::Edificio, ParentType::Unita],
        )
    }

    fn parent_id_mut(&mut self) -> Option<&mut String> {
        self.parent.id_mut()
    }

    fn references(&self, kind: EntityKind) -> Vec<(EntityKind, &[String])> {
        if kind == EntityKind::Struttura {
            vec![(EntityKind::SegnalazioneProblema, self.segnalazioni_ids.as_slice())]
        } else {
            Vec::new()
        }
    }

    fn references_mut(&mut self, kind: EntityKind) -> Vec<(EntityKind, &mut Vec<String>)> {
        if kind == EntityKind::Struttura {
            vec![(EntityKind::SegnalazioneProblema, &mut self.segnalazioni_ids)]
        } else {
            Vec::new()
        }
    }

    fn fields(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        data_fields(&self.data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SegnalazioneProblema
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SegnalazioneData {
    #[serde(default)]
    pub titolo: Option<String>,
    #[serde(default)]
    pub descrizione: Option<String>,
    #[serde(default)]
    pub priorita: Option<String>,
    #[serde(default)]
    pub stato: Option<String>,
    #[serde(default)]
    pub data_segnalazione: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub foto: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SegnalazioneRecord {
    pub id: String,
    #[serde(default)]
    pub struttura_id: Option<String>,
    #[serde(flatten)]
    pub data: SegnalazioneData,
}

impl TransferRecord for SegnalazioneRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn id_mut(&mut self) -> &mut String {
        &mut self.id
    }

    fn parent(&self, _kind: EntityKind) -> Result<Option<(EntityKind, &str)>> {
        Ok(self
            .struttura_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| (EntityKind::Struttura, id)))
    }

    fn parent_id_mut(&mut self) -> Option<&mut String> {
        self.struttura_id
            .as_mut()
            .filter(|id| !id.trim().is_empty())
    }

    fn references(&self, _kind: EntityKind) -> Vec<(EntityKind, &[String])> {
        Vec::new()
    }

    fn references_mut(&mut self, _kind: EntityKind) -> Vec<(EntityKind, &mut Vec<String>)> {
        Vec::new()
    }

    fn fields(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        data_fields(&self.data)
    }
}
