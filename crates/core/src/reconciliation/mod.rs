//! Deferred removal of local observations deleted at the source.

mod reconciliation_model;
mod reconciliation_service;

pub use reconciliation_model::*;
pub use reconciliation_service::*;
