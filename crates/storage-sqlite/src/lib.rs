//! SQLite persistence for BioQuest.
//!
//! Reads go through the r2d2 pool; writes are funnelled through the single
//! writer actor in [`db::write_actor`].

pub mod achievements;
pub mod classification;
pub mod db;
pub mod errors;
pub mod observations;
pub mod reconciliation;
pub mod schema;
pub mod sync;

mod utils;

pub use achievements::AchievementRepository;
pub use classification::ClassificationRepository;
pub use db::{create_pool, get_connection, init, run_migrations, write_actor::spawn_writer, WriteHandle};
pub use errors::StorageError;
pub use observations::ObservationRepository;
pub use reconciliation::ReconciliationRepository;
pub use sync::SyncStateRepository;

#[cfg(test)]
pub(crate) mod test_utils;
