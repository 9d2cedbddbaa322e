use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};

use super::identity::IdentityMap;
use super::normalizer::{needs_normalization, normalize};
use super::reconciler::KindBatch;
use super::relationships::prune_unresolved;
use super::sync_model::{
    FileSyncNotice, SyncConfig, SyncOutcome, SyncRecord, SyncRequest, SyncStats, SyncStatus,
};
use super::sync_traits::{SyncJob, SyncRepositoryTrait, SyncUnitOfWork};
use crate::errors::{Error, Result};
use crate::survey::EntityKind;

#[async_trait]
pub trait SyncServiceTrait: Send + Sync {
    /// Merges a client snapshot into storage.
    ///
    /// Malformed requests are rejected with `Error::Validation` before anything
    /// is written. Every other fault is reported through the outcome: a failed
    /// collection is rolled back alone and counted as unchanged, while a fault
    /// outside the per-collection scopes rolls back the whole call and yields
    /// `success == false`.
    async fn sync_data(&self, request: SyncRequest) -> Result<SyncOutcome>;

    fn get_sync_status(&self, device_id: &str) -> Result<SyncStatus>;

    /// Records attachment upload results on the device's latest sync record.
    async fn complete_file_sync(&self, notice: FileSyncNotice) -> Result<SyncRecord>;
}

#[derive(Clone)]
pub struct SyncService {
    repository: Arc<dyn SyncRepositoryTrait>,
    config: SyncConfig,
}

impl SyncService {
    pub fn new(repository: Arc<dyn SyncRepositoryTrait>, config: SyncConfig) -> Self {
        Self { repository, config }
    }

    fn validate_device_id(device_id: &str) -> Result<&str> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(Error::validation("Device id is required"));
        }
        Ok(device_id)
    }

    fn completion_message(stats: &SyncStats, failed_kinds: &[EntityKind]) -> String {
        let summary = format!(
            "{} created, {} updated, {} deleted, {} unchanged",
            stats.created, stats.updated, stats.deleted, stats.unchanged
        );
        if failed_kinds.is_empty() {
            format!("Sync completed: {}", summary)
        } else {
            let names = failed_kinds
                .iter()
                .map(|kind| kind.collection_name())
                .collect::<Vec<_>>()
                .join(", ");
            format!("Sync completed with errors in {}: {}", names, summary)
        }
    }
}

#[async_trait]
impl SyncServiceTrait for SyncService {
    async fn sync_data(&self, mut request: SyncRequest) -> Result<SyncOutcome> {
        let Some(data) = request.data.take() else {
            return Err(Error::validation("Sync payload has no data"));
        };
        let device_id = Self::validate_device_id(&request.device_id)?.to_string();
        let now = Utc::now();

        info!(
            "[Sync] Starting sync for device {} (platform: {}, app version: {})",
            device_id,
            request.platform.as_deref().unwrap_or("unknown"),
            request.app_version.as_deref().unwrap_or("unknown")
        );

        let mut data = if needs_normalization(&data) {
            debug!("[Sync] Payload uses the mobile format, normalizing");
            match normalize(data) {
                Ok(normalized) => normalized,
                Err(err) => {
                    error!("[Sync] Normalization failed for device {}: {}", device_id, err);
                    return Ok(SyncOutcome::failed(err.to_string(), now));
                }
            }
        } else {
            data
        };

        let mut batches: Vec<KindBatch> = EntityKind::SYNC_ORDER
            .into_iter()
            .filter_map(|kind| data.take(kind).map(|values| KindBatch::decode(kind, values)))
            .collect();

        let mut ids = IdentityMap::new(self.config.prefixed_id_fallback);
        for batch in &mut batches {
            batch.rewrite(&mut ids);
        }
        debug!("[Sync] Resolved {} identifier(s)", ids.len());

        let job: SyncJob = Box::new(move |uow: &mut dyn SyncUnitOfWork| {
            let mut stats = SyncStats::default();
            let mut per_kind_stats = BTreeMap::new();
            let mut failed_kinds = Vec::new();
            let mut unresolved = Vec::new();

            for batch in &batches {
                let kind_stats = match uow.savepoint(&mut |scope: &mut dyn SyncUnitOfWork| {
                    batch.reconcile(scope, now, &mut unresolved)
                }) {
                    Ok(kind_stats) => kind_stats,
                    Err(err) => {
                        error!(
                            "[Sync] Reconciliation of {} failed, rolled back: {}",
                            batch.kind, err
                        );
                        failed_kinds.push(batch.kind);
                        SyncStats::degraded(batch.total)
                    }
                };
                stats += kind_stats;
                per_kind_stats.insert(batch.kind.collection_name().to_string(), kind_stats);
            }

            let pruned = prune_unresolved(uow, &unresolved)?;
            if pruned > 0 {
                debug!("[Sync] Dropped {} reference(s) to missing entities", pruned);
            }

            uow.insert_sync_record(&SyncRecord::new(&request, stats, now))?;

            Ok(SyncOutcome {
                success: true,
                message: Self::completion_message(&stats, &failed_kinds),
                stats,
                per_kind_stats,
                timestamp: now,
            })
        });

        match self.repository.run_in_transaction(job).await {
            Ok(outcome) => {
                info!("[Sync] Device {}: {}", device_id, outcome.message);
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    "[Sync] Sync transaction for device {} rolled back: {}",
                    device_id, err
                );
                Ok(SyncOutcome::failed(format!("Sync failed: {}", err), now))
            }
        }
    }

    fn get_sync_status(&self, device_id: &str) -> Result<SyncStatus> {
        let device_id = Self::validate_device_id(device_id)?;
        let record = self.repository.get_latest_sync_record(device_id)?;
        Ok(SyncStatus::from_record(device_id, record))
    }

    async fn complete_file_sync(&self, mut notice: FileSyncNotice) -> Result<SyncRecord> {
        notice.device_id = Self::validate_device_id(&notice.device_id)?.to_string();
        if notice.processed < 0 || notice.succeeded < 0 || notice.failed < 0 {
            return Err(Error::validation("File counters must not be negative"));
        }
        if notice.failed > 0 {
            warn!(
                "[Sync] Device {} reported {} failed file upload(s)",
                notice.device_id, notice.failed
            );
        }

        let device_id = notice.device_id.clone();
        self.repository
            .complete_file_sync(notice, Utc::now())
            .await?
            .ok_or_else(|| Error::not_found(format!("No sync record for device {}", device_id)))
    }
}
