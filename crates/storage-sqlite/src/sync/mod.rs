//! SQLite storage for sync runs: the transactional unit of work and audit records.

mod model;
mod repository;
mod unit_of_work;

pub use model::SyncRecordDB;
pub use repository::SyncRepository;
pub use unit_of_work::SqliteUnitOfWork;
