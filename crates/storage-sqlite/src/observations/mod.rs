//! SQLite storage for synced observations.

mod model;
mod repository;

pub use model::ObservationDB;
pub use repository::ObservationRepository;
pub(crate) use repository::apply_rarity_tx;
