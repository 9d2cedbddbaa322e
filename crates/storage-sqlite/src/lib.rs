pub mod db;
pub mod errors;
pub mod schema;
pub mod survey;
pub mod sync;

pub use db::{create_pool, get_connection, init, run_migrations, write_actor::spawn_writer};
pub use db::{DbPool, WriteHandle};
pub use errors::StorageError;
pub use survey::EntityRepository;
pub use sync::SyncRepository;
