//! SQLite storage for the rarity classification job queue.

mod model;
mod repository;

pub use model::ClassificationJobDB;
pub use repository::ClassificationRepository;
