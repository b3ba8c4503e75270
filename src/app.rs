//! Application state and service initialization
//!
//! All services are wired here so the daemon and tests share one dependency
//! graph. The storage backend decides which store implementations are used;
//! everything above the store traits is identical for both.

use std::sync::Arc;

use crate::db::memory::MemoryStore;
use crate::db::repository::{AppealRepository, ArgumentRepository, TrainingDataRepository};
use crate::db::{AppealStore, ArgumentStore, TrainingSampleStore};
use crate::model::{Config, StorageBackend};
use crate::service::{
    AnnotationQueue, AnnotationUpdater, AppealManager, ArgumentService, DetectionClient,
    RetrainingService, TrainingDataRecorder,
};

/// Store handles for one backend
struct Stores {
    arguments: Arc<dyn ArgumentStore>,
    appeals: Arc<dyn AppealStore>,
    samples: Arc<dyn TrainingSampleStore>,
}

/// Application state containing all services and shared resources
pub struct AppState {
    pub config: Config,
    /// Classifier client, shared by annotation and retraining
    pub detection_client: Arc<DetectionClient>,
    pub annotation_queue: Arc<AnnotationQueue>,
    pub argument_service: ArgumentService,
    pub appeal_manager: Arc<AppealManager>,
    pub retraining_service: Arc<RetrainingService>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// Must be called inside a Tokio runtime: the annotation workers are
    /// spawned here.
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let stores = match config.storage {
            StorageBackend::Postgres => Self::postgres_stores().await?,
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on exit");
                Self::memory_stores()
            }
        };

        let detection_client = Arc::new(
            DetectionClient::new(config.detection.clone())
                .map_err(|e| AppError::InvalidConfig(e.to_string()))?,
        );

        let annotation_queue = Arc::new(AnnotationQueue::start(
            Arc::clone(&detection_client) as _,
            Arc::new(AnnotationUpdater::new(Arc::clone(&stores.arguments))),
            detection_client.timeout(),
            &config.annotation,
        ));

        let argument_service = ArgumentService::new(
            Arc::clone(&stores.arguments),
            Arc::clone(&annotation_queue),
            detection_client.language(),
        );

        let recorder = TrainingDataRecorder::new(Arc::clone(&stores.samples));

        let appeal_manager = Arc::new(AppealManager::new(
            Arc::clone(&stores.arguments),
            Arc::clone(&stores.appeals),
            recorder.clone(),
            config.appeal.clone(),
        ));

        let retraining_service = Arc::new(RetrainingService::new(
            stores.arguments,
            stores.appeals,
            stores.samples,
            recorder,
            Arc::clone(&detection_client) as _,
            config.appeal.clone(),
        ));

        tracing::info!(
            service_url = %config.detection.service_url,
            appeal_threshold = config.appeal.threshold,
            storage = ?config.storage,
            "Application state initialized"
        );

        Ok(Self {
            config,
            detection_client,
            annotation_queue,
            argument_service,
            appeal_manager,
            retraining_service,
        })
    }

    async fn postgres_stores() -> Result<Stores, AppError> {
        let db_pool = crate::db::create_pool()
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        crate::db::init_schema(&db_pool)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        Ok(Stores {
            arguments: Arc::new(ArgumentRepository::new(db_pool.clone())),
            appeals: Arc::new(AppealRepository::new(db_pool.clone())),
            samples: Arc::new(TrainingDataRepository::new(db_pool)),
        })
    }

    fn memory_stores() -> Stores {
        let store = MemoryStore::new();
        Stores {
            arguments: Arc::new(store.clone()),
            appeals: Arc::new(store.clone()),
            samples: Arc::new(store),
        }
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Database initialization failed
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewArgument, TopicContext};

    #[tokio::test]
    async fn test_memory_backend_wires_services() {
        let config = Config {
            storage: StorageBackend::Memory,
            ..Config::default()
        };

        let state = AppState::new(config).await.unwrap();
        assert_eq!(state.appeal_manager.threshold(), 100);

        let argument = state
            .argument_service
            .create_argument(
                NewArgument {
                    topic_id: 1,
                    author_id: 1,
                    content: "text".to_string(),
                },
                TopicContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(state.appeal_manager.count_appeals(argument.id).await.unwrap().total, 0);

        state.annotation_queue.shutdown().await;
    }
}
