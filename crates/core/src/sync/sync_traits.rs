use async_trait::async_trait;

use super::{SyncCursor, SyncProgress, SyncResult};
use crate::errors::Result;
use crate::observations::SourceCredentials;

#[async_trait]
pub trait SyncStateRepositoryTrait: Send + Sync {
    /// Stored watermark, or the empty state for a user never synced.
    fn get_cursor(&self, user_id: &str) -> Result<SyncCursor>;

    async fn save_cursor(&self, user_id: &str, cursor: SyncCursor) -> Result<()>;
}

#[async_trait]
pub trait SyncServiceTrait: Send + Sync {
    async fn sync(
        &self,
        user_id: &str,
        external_username: &str,
        credentials: &SourceCredentials,
    ) -> Result<SyncResult>;

    /// Progress of the user's current or most recent run.
    fn progress(&self, user_id: &str) -> Option<SyncProgress>;
}
