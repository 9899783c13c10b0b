//! Asynchronous rarity classification queue.

mod classification_model;
mod classification_service;
mod classification_traits;
mod classifier;

pub use classification_model::*;
pub use classification_service::*;
pub use classification_traits::*;
pub use classifier::*;
