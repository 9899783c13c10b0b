use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use bioquest_core::achievements::AchievementReconciler;
use bioquest_core::classification::{
    ClassificationConfig, ClassificationQueueService, ClassificationQueueTrait,
    SourceRarityClassifier,
};
use bioquest_core::clock::{Clock, SystemClock};
use bioquest_core::observations::{ObservationRepositoryTrait, ObservationSource};
use bioquest_core::recommendations::{
    spawn_cleanup_task, FixtureRecommendationEngine, Recommendation, RecommendationCache,
    RecommendationEngine, RecommendationService, RecommendationServiceTrait,
};
use bioquest_core::reconciliation::{DeletionReconciler, ReconciliationServiceTrait};
use bioquest_core::sync::{SyncConfig, SyncOrchestrator, SyncServiceTrait};
use bioquest_inat::{INatClient, INatRecommendationEngine, MockObservationSource};
use bioquest_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, AchievementRepository,
    ClassificationRepository, ObservationRepository, ReconciliationRepository,
    SyncStateRepository,
};

use crate::config::ServerConfig;

pub struct AppState {
    pub sync_service: Arc<dyn SyncServiceTrait>,
    pub classification_queue: Arc<dyn ClassificationQueueTrait>,
    pub reconciliation_service: Arc<dyn ReconciliationServiceTrait>,
    pub recommendation_service: Arc<dyn RecommendationServiceTrait>,
    pub recommendation_cache: Arc<RecommendationCache<Vec<Recommendation>>>,
    pub mock_mode: bool,
}

/// Opens the database, wires every service and runs startup recovery.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let db_path = init(&config.data_dir)
        .with_context(|| format!("Failed to prepare data directory {}", config.data_dir))?;
    run_migrations(&db_path).context("Failed to run database migrations")?;
    let pool = create_pool(&db_path).context("Failed to open database pool")?;
    let writer = spawn_writer(pool.as_ref().clone());
    info!("Database ready at {}", db_path);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let observation_repository: Arc<dyn ObservationRepositoryTrait> = Arc::new(
        ObservationRepository::new(pool.clone(), writer.clone()),
    );
    let sync_state_repository = Arc::new(SyncStateRepository::new(pool.clone(), writer.clone()));
    let classification_repository =
        Arc::new(ClassificationRepository::new(pool.clone(), writer.clone()));
    let reconciliation_repository =
        Arc::new(ReconciliationRepository::new(pool.clone(), writer.clone()));
    let achievement_repository = Arc::new(AchievementRepository::new(pool.clone(), writer));

    let (source, engine): (Arc<dyn ObservationSource>, Arc<dyn RecommendationEngine>) =
        if config.mock_mode {
            warn!("No iNaturalist client configured, serving fixture data");
            (
                Arc::new(MockObservationSource::default()),
                Arc::new(FixtureRecommendationEngine),
            )
        } else {
            let client = INatClient::new(&config.inat_api_url, config.requests_per_minute)
                .context("Failed to build iNaturalist client")?;
            let engine = INatRecommendationEngine::new(
                client.clone(),
                observation_repository.clone(),
                clock.clone(),
            );
            (Arc::new(client), Arc::new(engine))
        };

    let sync_config = SyncConfig {
        page_delay: config.sync_page_delay,
        ..SyncConfig::default()
    };
    let classification_config = ClassificationConfig {
        job_delay: if config.mock_mode {
            Duration::ZERO
        } else {
            ClassificationConfig::default().job_delay
        },
        ..ClassificationConfig::default()
    };

    let classification_queue: Arc<dyn ClassificationQueueTrait> = Arc::new(
        ClassificationQueueService::new(
            classification_repository,
            observation_repository.clone(),
            Arc::new(SourceRarityClassifier::new(source.clone())),
        )
        .with_config(classification_config),
    );
    let reconciliation_service: Arc<dyn ReconciliationServiceTrait> =
        Arc::new(DeletionReconciler::new(
            reconciliation_repository,
            observation_repository.clone(),
            source.clone(),
            &sync_config,
        ));
    let achievements = Arc::new(AchievementReconciler::new(
        achievement_repository,
        observation_repository.clone(),
        clock.clone(),
    ));
    let sync_service: Arc<dyn SyncServiceTrait> = Arc::new(
        SyncOrchestrator::new(
            source,
            observation_repository.clone(),
            sync_state_repository,
            classification_queue.clone(),
            reconciliation_service.clone(),
            achievements,
            clock.clone(),
        )
        .with_config(sync_config),
    );

    let ttl = chrono::Duration::from_std(config.recommendation_ttl)
        .context("Recommendation TTL out of range")?;
    let recommendation_cache = Arc::new(RecommendationCache::new(clock, ttl));
    let recommendation_service: Arc<dyn RecommendationServiceTrait> =
        Arc::new(RecommendationService::new(
            recommendation_cache.clone(),
            engine,
            observation_repository,
        ));

    recover_stale_jobs(classification_queue.as_ref()).await;

    Ok(Arc::new(AppState {
        sync_service,
        classification_queue,
        reconciliation_service,
        recommendation_service,
        recommendation_cache,
        mock_mode: config.mock_mode,
    }))
}

/// Returns jobs left processing by a previous process to the queue.
/// Failures are logged and never stop startup.
pub async fn recover_stale_jobs(queue: &dyn ClassificationQueueTrait) -> usize {
    match queue.reset_stale_processing_items().await {
        Ok(count) => count,
        Err(e) => {
            error!("[RarityQueue] Stale job recovery failed: {}", e);
            0
        }
    }
}

pub fn spawn_background_tasks(state: &AppState, config: &ServerConfig) -> JoinHandle<()> {
    info!(
        "[RecommendationCache] Sweeping expired entries every {}s",
        config.cache_sweep_interval.as_secs()
    );
    spawn_cleanup_task(
        state.recommendation_cache.clone(),
        config.cache_sweep_interval,
    )
}
