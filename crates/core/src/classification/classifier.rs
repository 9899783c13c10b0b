use async_trait::async_trait;
use std::sync::Arc;

use super::{ClassificationJob, RarityClassifier};
use crate::errors::{Error, Result};
use crate::gamification::RarityOutcome;
use crate::observations::ObservationSource;

/// Classifies a taxon from its global observation count at the source.
pub struct SourceRarityClassifier {
    source: Arc<dyn ObservationSource>,
}

impl SourceRarityClassifier {
    pub fn new(source: Arc<dyn ObservationSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl RarityClassifier for SourceRarityClassifier {
    async fn classify(&self, job: &ClassificationJob) -> Result<RarityOutcome> {
        let global = self
            .source
            .taxon_observation_count(job.taxon_id, None)
            .await
            .map_err(|e| Error::Classification {
                taxon_id: job.taxon_id,
                transient: e.is_transient(),
                message: e.to_string(),
            })?;
        Ok(RarityOutcome::from_counts(global, None))
    }
}
