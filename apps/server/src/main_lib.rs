use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use rilievo_core::survey::EntityRepositoryTrait;
use rilievo_core::sync::{BlobStoreTrait, SyncService, SyncServiceTrait};
use rilievo_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, EntityRepository, SyncRepository,
};

use crate::blob_store::LocalBlobStore;
use crate::config::Config;

pub struct AppState {
    pub sync_service: Arc<dyn SyncServiceTrait>,
    pub entity_repository: Arc<dyn EntityRepositoryTrait>,
    pub blob_store: Arc<dyn BlobStoreTrait>,
}

pub fn build_state(config: &Config) -> Result<Arc<AppState>> {
    let data_dir = config.data_dir.to_string_lossy().to_string();
    let db_path = init(&data_dir).context("Failed to initialize database")?;
    run_migrations(&db_path).context("Failed to run migrations")?;
    let pool = create_pool(&db_path).context("Failed to create connection pool")?;
    let writer = spawn_writer(pool.as_ref().clone());
    info!("Database ready at {}", db_path);

    let sync_repository = Arc::new(SyncRepository::new(pool.clone(), writer));
    let sync_service = Arc::new(SyncService::new(sync_repository, config.sync));
    let entity_repository = Arc::new(EntityRepository::new(pool));
    let blob_store = Arc::new(LocalBlobStore::new(&config.data_dir));

    Ok(Arc::new(AppState {
        sync_service,
        entity_repository,
        blob_store,
    }))
}
