//! Geo recommendations and the short-lived cache in front of them.

mod cache;
mod recommendations_model;
mod recommendations_service;

pub use cache::*;
pub use recommendations_model::*;
pub use recommendations_service::*;
