//! Incremental synchronization from the external observation source.

mod sync_locks;
mod sync_model;
mod sync_progress;
mod sync_service;
mod sync_traits;

pub use sync_locks::*;
pub use sync_model::*;
pub use sync_progress::*;
pub use sync_service::*;
pub use sync_traits::*;

#[cfg(test)]
mod tests;
