//! Bulk synchronization of survey snapshots.

mod identity;
mod normalizer;
mod reconciler;
mod relationships;
mod sync_model;
mod sync_service;
mod sync_traits;

pub use identity::*;
pub use normalizer::*;
pub use reconciler::*;
pub use relationships::*;
pub use sync_model::*;
pub use sync_service::*;
pub use sync_traits::*;

#[cfg(test)]
mod tests;
