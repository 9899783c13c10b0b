//! SQLite storage for per-user sync watermarks.

mod model;
mod repository;

pub use model::UserSyncStateDB;
pub use repository::SyncStateRepository;
