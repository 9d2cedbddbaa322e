//! Projection of legacy/mobile payloads onto the canonical record shape.
//!
//! Mobile clients send camelCase field names and legacy parent keys
//! (`idComplesso`, `idEdificio`, `idUnita`, `idStruttura`). Each kind has a
//! static mapping table; fields without a mapping are dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::sync_model::SyncData;
use crate::errors::{Error, Result};
use crate::survey::{EntityKind, ParentType};

/// Field names only the mobile convention uses.
const MOBILE_MARKERS: [&str; 9] = [
    "id",
    "idComplesso",
    "idEdificio",
    "idUnita",
    "cod",
    "denominazione",
    "dataRilievo",
    "syncStatus",
    "lastModified",
];

/// Legacy parent keys an installation may carry, most specific first.
const INSTALLATION_PARENT_KEYS: &[(&str, ParentType)] = &[
    ("idUnita", ParentType::Unita),
    ("idEdificio", ParentType::Edificio),
    ("idComplesso", ParentType::Complesso),
];

/// Legacy keys that name the parent of a `kind` record. A record's own scope
/// key (`idEdificio` on a building) is its identity, never its parent.
fn legacy_parent_keys(kind: EntityKind) -> &'static [(&'static str, ParentType)] {
    match kind {
        EntityKind::Edificio => &[("idComplesso", ParentType::Complesso)],
        EntityKind::UnitaImmobiliare => &[("idEdificio", ParentType::Edificio)],
        kind if kind.is_installation() => INSTALLATION_PARENT_KEYS,
        _ => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Text,
    Timestamp,
    Decimal,
    Integer,
    Bool,
    TextList,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: &'static str,
    pub dest: &'static str,
    pub coercion: Coercion,
}

const fn map(source: &'static str, dest: &'static str, coercion: Coercion) -> FieldMapping {
    FieldMapping {
        source,
        dest,
        coercion,
    }
}

const INSTALLATION_REFS: &[FieldMapping] = &[
    map("struttureIds", "StruttureIds", Coercion::TextList),
    map("infissiIds", "InfissiIds", Coercion::TextList),
    map("idraulicoAdduzioneIds", "IdraulicoAdduzioneIds", Coercion::TextList),
    map("scarichiIdriciFognariIds", "ScarichiIdriciFognariIds", Coercion::TextList),
    map("impiantoClimaAcsIds", "ImpiantoClimaAcsIds", Coercion::TextList),
    map("impiantiElettriciIds", "ImpiantiElettriciIds", Coercion::TextList),
    map("altriImpiantiIds", "AltriImpiantiIds", Coercion::TextList),
    map("documentiGeneraliIds", "DocumentiGeneraliIds", Coercion::TextList),
];

const PARENT_POINTER: &[FieldMapping] = &[
    map("parentId", "ParentId", Coercion::Text),
    map("parentType", "ParentType", Coercion::Text),
];

const COMPLESSO_FIELDS: &[FieldMapping] = &[
    map("id", "Id", Coercion::Text),
    map("cod", "Cod", Coercion::Text),
    map("denominazione", "Denominazione", Coercion::Text),
    map("indirizzo", "Indirizzo", Coercion::Text),
    map("comune", "Comune", Coercion::Text),
    map("provincia", "Provincia", Coercion::Text),
    map("cap", "Cap", Coercion::Text),
    map("latitudine", "Latitudine", Coercion::Decimal),
    map("longitudine", "Longitudine", Coercion::Decimal),
    map("dataRilievo", "DataRilievo", Coercion::Timestamp),
    map("rilevatore", "Rilevatore", Coercion::Text),
    map("note", "Note", Coercion::Text),
    map("tags", "Tags", Coercion::TextList),
    map("edificiIds", "EdificiIds", Coercion::TextList),
];

const EDIFICIO_FIELDS: &[FieldMapping] = &[
    map("id", "Id", Coercion::Text),
    map("cod", "Cod", Coercion::Text),
    map("denominazione", "Denominazione", Coercion::Text),
    map("numeroPiani", "NumeroPiani", Coercion::Integer),
    map("annoCostruzione", "AnnoCostruzione", Coercion::Integer),
    map("superficieLorda", "SuperficieLorda", Coercion::Decimal),
    map("volume", "Volume", Coercion::Decimal),
    map("destinazioneUso", "DestinazioneUso", Coercion::Text),
    map("statoConservazione", "StatoConservazione", Coercion::Text),
    map("dataRilievo", "DataRilievo", Coercion::Timestamp),
    map("note", "Note", Coercion::Text),
    map("unitaImmobiliariIds", "UnitaImmobiliariIds", Coercion::TextList),
];

const UNITA_FIELDS: &[FieldMapping] = &[
    map("id", "Id", Coercion::Text),
    map("cod", "Cod", Coercion::Text),
    map("piano", "Piano", Coercion::Text),
    map("interno", "Interno", Coercion::Text),
    map("destinazioneUso", "DestinazioneUso", Coercion::Text),
    map("superficie", "Superficie", Coercion::Decimal),
    map("vani", "Vani", Coercion::Integer),
    map("foglio", "Foglio", Coercion::Text),
    map("particella", "Particella", Coercion::Text),
    map("subalterno", "Subalterno", Coercion::Text),
    map("note", "Note", Coercion::Text),
];

const IMPIANTO_FIELDS: &[FieldMapping] = &[
    map("id", "Id", Coercion::Text),
    map("cod", "Cod", Coercion::Text),
    map("tipologia", "Tipologia", Coercion::Text),
    map("descrizione", "Descrizione", Coercion::Text),
    map("stato", "Stato", Coercion::Text),
    map("quantita", "Quantita", Coercion::Decimal),
    map("dataInstallazione", "DataInstallazione", Coercion::Timestamp),
    map("nomeFile", "NomeFile", Coercion::Text),
    map("percorsoFile", "PercorsoFile", Coercion::Text),
    map("note", "Note", Coercion::Text),
    map("attributi", "Attributi", Coercion::Json),
    map("segnalazioniIds", "SegnalazioniIds", Coercion::TextList),
];

const SEGNALAZIONE_FIELDS: &[FieldMapping] = &[
    map("id", "Id", Coercion::Text),
    map("strutturaId", "StrutturaId", Coercion::Text),
    map("idStruttura", "StrutturaId", Coercion::Text),
    map("titolo", "Titolo", Coercion::Text),
    map("descrizione", "Descrizione", Coercion::Text),
    map("priorita", "Priorita", Coercion::Text),
    map("stato", "Stato", Coercion::Text),
    map("dataSegnalazione", "DataSegnalazione", Coercion::Timestamp),
    map("foto", "Foto", Coercion::TextList),
    map("note", "Note", Coercion::Text),
];

/// Mapping tables applied to a record of `kind`, in order.
pub fn field_mappings(kind: EntityKind) -> Vec<&'static [FieldMapping]> {
    match kind {
        EntityKind::Complesso => vec![COMPLESSO_FIELDS, INSTALLATION_REFS],
        EntityKind::Edificio => vec![EDIFICIO_FIELDS, PARENT_POINTER, INSTALLATION_REFS],
        EntityKind::UnitaImmobiliare => vec![UNITA_FIELDS, PARENT_POINTER, INSTALLATION_REFS],
        EntityKind::SegnalazioneProblema => vec![SEGNALAZIONE_FIELDS],
        _ => vec![IMPIANTO_FIELDS, PARENT_POINTER],
    }
}

/// Whether the payload uses the mobile naming convention.
///
/// Only the first record of `complessi` is inspected, or of `edifici` when
/// there are no complexes.
pub fn needs_normalization(data: &SyncData) -> bool {
    let sample = [EntityKind::Complesso, EntityKind::Edificio]
        .into_iter()
        .filter_map(|kind| data.collection(kind))
        .find_map(|records| records.first());

    match sample.and_then(Value::as_object) {
        Some(record) => MOBILE_MARKERS.iter().any(|key| record.contains_key(*key)),
        None => false,
    }
}

/// Rewrites every collection of `data` into canonical field names.
pub fn normalize(mut data: SyncData) -> Result<SyncData> {
    for kind in EntityKind::SYNC_ORDER {
        let Some(records) = data.take(kind) else {
            continue;
        };
        let normalized = records
            .iter()
            .enumerate()
            .map(|(index, record)| normalize_record(kind, index, record))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "[Sync] Normalized {} {} record(s) from the mobile format",
            normalized.len(),
            kind
        );
        *data.collection_mut(kind) = Some(normalized);
    }
    Ok(data)
}

fn normalize_record(kind: EntityKind, index: usize, record: &Value) -> Result<Value> {
    let source = record.as_object().ok_or_else(|| {
        Error::conversion(format!(
            "Record {} of {} is not a JSON object",
            index, kind
        ))
    })?;

    let mut target = Map::new();
    for table in field_mappings(kind) {
        for mapping in table {
            let Some(value) = source.get(mapping.source).filter(|v| !v.is_null()) else {
                continue;
            };
            if let Some(coerced) = coerce(mapping, value) {
                target.insert(mapping.dest.to_string(), coerced);
            }
        }
    }

    apply_legacy_parent(legacy_parent_keys(kind), source, &mut target);

    Ok(Value::Object(target))
}

fn apply_legacy_parent(
    keys: &[(&str, ParentType)],
    source: &Map<String, Value>,
    target: &mut Map<String, Value>,
) {
    let explicit = target
        .get("ParentId")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if explicit {
        return;
    }
    let legacy = keys.iter().find_map(|(key, parent_type)| {
        source
            .get(*key)
            .and_then(scalar_text)
            .filter(|id| !id.trim().is_empty())
            .map(|id| (id, *parent_type))
    });
    if let Some((parent_id, parent_type)) = legacy {
        target.insert("ParentId".to_string(), Value::String(parent_id));
        target.insert(
            "ParentType".to_string(),
            Value::String(parent_type.as_str().to_string()),
        );
    }
}

fn coerce(mapping: &FieldMapping, value: &Value) -> Option<Value> {
    match mapping.coercion {
        Coercion::Text => scalar_text(value).map(Value::String).or_else(|| {
            warn!(
                "[Sync] Dropping non-scalar value for text field '{}'",
                mapping.source
            );
            None
        }),
        Coercion::Timestamp => Some(Value::String(timestamp_text(value)?)),
        Coercion::Decimal => Some(decimal_value(mapping.source, value)),
        Coercion::Integer => integer_value(value).map(Value::from).or_else(|| {
            warn!(
                "[Sync] Dropping unparseable integer '{}' for field '{}'",
                value, mapping.source
            );
            None
        }),
        Coercion::Bool => bool_value(value).map(Value::Bool),
        Coercion::TextList => match value {
            Value::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .filter_map(scalar_text)
                    .map(Value::String)
                    .collect(),
            )),
            other => scalar_text(other).map(|single| Value::Array(vec![Value::String(single)])),
        },
        Coercion::Json => Some(value.clone()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch milliseconds or a parseable date string, rendered as RFC 3339.
/// Unparseable strings are kept as sent.
fn timestamp_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => {
            let millis = number.as_i64().or_else(|| number.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single().map(format_timestamp)
        }
        Value::String(text) => Some(parse_timestamp(text).map(format_timestamp).unwrap_or_else(|| {
            debug!("[Sync] Keeping unparseable timestamp '{}' as text", text);
            text.clone()
        })),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Best-effort decimal; anything unparseable becomes zero.
fn decimal_value(field: &str, value: &Value) -> Value {
    let parsed = match value {
        Value::Number(number) => number
            .to_string()
            .parse::<Decimal>()
            .ok()
            .or_else(|| number.as_f64().and_then(Decimal::from_f64_retain)),
        Value::String(text) => text.trim().replace(',', ".").parse::<Decimal>().ok(),
        _ => None,
    };
    let decimal = parsed.unwrap_or_else(|| {
        warn!(
            "[Sync] Unparseable decimal '{}' for field '{}', using 0",
            value, field
        );
        Decimal::ZERO
    });
    serde_json::to_value(decimal).unwrap_or(Value::from(0))
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|f| f as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

fn bool_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "si" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
