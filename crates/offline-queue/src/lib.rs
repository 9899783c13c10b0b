//! Client-resident queue of actions attempted while offline.
//!
//! Actions are appended to a durable store and replayed against the server
//! when connectivity returns. A drain never runs concurrently with itself and
//! keeps actions of the same type in their original order.

mod error;
mod executor;
mod model;
mod queue;
mod store;

pub use error::{OfflineQueueError, Result};
pub use executor::{ActionExecutor, HttpActionExecutor};
pub use model::{ActionType, DrainReport, DroppedAction, OfflineAction, MAX_RETRIES};
pub use queue::{spawn_reconnect_listener, OfflineQueue};
pub use store::{JsonFileQueueStore, MemoryQueueStore, QueueStore};
