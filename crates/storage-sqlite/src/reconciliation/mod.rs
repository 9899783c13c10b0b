//! SQLite storage for pending deletion checks.

mod model;
mod repository;

pub use model::ReconciliationJobDB;
pub use repository::ReconciliationRepository;
