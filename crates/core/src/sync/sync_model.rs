//! Bulk sync request, outcome and audit models.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::PrefixedIdFallback;
use crate::survey::EntityKind;

/// Engine settings handed to the sync service at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub prefixed_id_fallback: PrefixedIdFallback,
}

/// Per-collection reconciliation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl SyncStats {
    /// Stats reported for a collection whose reconciliation was rolled back.
    pub fn degraded(total: usize) -> Self {
        Self {
            total,
            unchanged: total,
            ..Self::default()
        }
    }
}

impl AddAssign for SyncStats {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
    }
}

/// Result of one bulk sync call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    pub stats: SyncStats,
    /// Keyed by payload collection name.
    pub per_kind_stats: BTreeMap<String, SyncStats>,
    pub timestamp: DateTime<Utc>,
}

impl SyncOutcome {
    pub fn failed(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: false,
            message: message.into(),
            stats: SyncStats::default(),
            per_kind_stats: BTreeMap::new(),
            timestamp,
        }
    }
}

/// Client snapshot, one optional collection per entity kind.
///
/// An absent collection leaves its kind untouched; a present but empty one
/// removes every entity of that kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complessi: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edifici: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unita_immobiliari: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strutture: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infissi: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idraulico_adduzione: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scarichi_idrici_fognari: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impianto_clima_acs: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impianti_elettrici: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altri_impianti: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documenti_generali: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segnalazioni_problemi: Option<Vec<serde_json::Value>>,
}

impl SyncData {
    pub fn collection(&self, kind: EntityKind) -> Option<&Vec<serde_json::Value>> {
        match kind {
            EntityKind::Complesso => self.complessi.as_ref(),
            EntityKind::Edificio => self.edifici.as_ref(),
            EntityKind::UnitaImmobiliare => self.unita_immobiliari.as_ref(),
            EntityKind::Struttura => self.strutture.as_ref(),
            EntityKind::Infisso => self.infissi.as_ref(),
            EntityKind::IdraulicoAdduzione => self.idraulico_adduzione.as_ref(),
            EntityKind::ScarichiIdriciFognari => self.scarichi_idrici_fognari.as_ref(),
            EntityKind::ImpiantoClimaAcs => self.impianto_clima_acs.as_ref(),
            EntityKind::ImpiantiElettrici => self.impianti_elettrici.as_ref(),
            EntityKind::AltriImpianti => self.altri_impianti.as_ref(),
            EntityKind::DocumentoGenerale => self.documenti_generali.as_ref(),
            EntityKind::SegnalazioneProblema => self.segnalazioni_problemi.as_ref(),
        }
    }

    pub fn collection_mut(&mut self, kind: EntityKind) -> &mut Option<Vec<serde_json::Value>> {
        match kind {
            EntityKind::Complesso => &mut self.complessi,
            EntityKind::Edificio => &mut self.edifici,
            EntityKind::UnitaImmobiliare => &mut self.unita_immobiliari,
            EntityKind::Struttura => &mut self.strutture,
            EntityKind::Infisso => &mut self.infissi,
            EntityKind::IdraulicoAdduzione => &mut self.idraulico_adduzione,
            EntityKind::ScarichiIdriciFognari => &mut self.scarichi_idrici_fognari,
            EntityKind::ImpiantoClimaAcs => &mut self.impianto_clima_acs,
            EntityKind::ImpiantiElettrici => &mut self.impianti_elettrici,
            EntityKind::AltriImpianti => &mut self.altri_impianti,
            EntityKind::DocumentoGenerale => &mut self.documenti_generali,
            EntityKind::SegnalazioneProblema => &mut self.segnalazioni_problemi,
        }
    }

    /// Removes and returns the collection of `kind`.
    pub fn take(&mut self, kind: EntityKind) -> Option<Vec<serde_json::Value>> {
        self.collection_mut(kind).take()
    }
}

/// Envelope posted by survey clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub data: Option<SyncData>,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    /// Client clock at submission, kept as sent.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Audit row written once per committed sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub id: Uuid,
    pub device_id: String,
    pub platform: Option<String>,
    pub app_version: Option<String>,
    pub client_timestamp: Option<String>,
    pub synced_at: DateTime<Utc>,
    pub total_entities: i64,
    pub created: i64,
    pub updated: i64,
    pub deleted: i64,
    pub unchanged: i64,
    pub files_processed: i64,
    pub files_succeeded: i64,
    pub files_failed: i64,
    pub file_sync_completed: bool,
    pub file_sync_completed_at: Option<DateTime<Utc>>,
}

impl SyncRecord {
    pub fn new(request: &SyncRequest, stats: SyncStats, synced_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            device_id: request.device_id.trim().to_string(),
            platform: request.platform.clone(),
            app_version: request.app_version.clone(),
            client_timestamp: request.timestamp.clone(),
            synced_at,
            total_entities: stats.total as i64,
            created: stats.created as i64,
            updated: stats.updated as i64,
            deleted: stats.deleted as i64,
            unchanged: stats.unchanged as i64,
            files_processed: 0,
            files_succeeded: 0,
            files_failed: 0,
            file_sync_completed: false,
            file_sync_completed_at: None,
        }
    }
}

/// Client notice that attachment uploads for the last sync have finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSyncNotice {
    pub device_id: String,
    #[serde(default)]
    pub processed: i64,
    #[serde(default)]
    pub succeeded: i64,
    #[serde(default)]
    pub failed: i64,
}

pub const STATUS_NEVER_SYNCED: &str = "never synced";
pub const STATUS_LAST_SYNC_COMPLETED: &str = "last sync completed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub device_id: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub status: String,
    pub last_record: Option<SyncRecord>,
}

impl SyncStatus {
    pub fn from_record(device_id: &str, record: Option<SyncRecord>) -> Self {
        let status = if record.is_some() {
            STATUS_LAST_SYNC_COMPLETED
        } else {
            STATUS_NEVER_SYNCED
        };
        Self {
            device_id: device_id.to_string(),
            last_sync: record.as_ref().map(|r| r.synced_at),
            status: status.to_string(),
            last_record: record,
        }
    }
}
