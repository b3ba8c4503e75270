//! Retraining data collection and batch submission
//!
//! A batch is marked used only after the retraining endpoint reports
//! success. Any failure leaves it untouched, so the same samples are
//! offered again on the next cycle (at-least-once delivery).

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{AppealStore, ArgumentStore, DbError, TrainingSampleStore};
use crate::model::{Appeal, AppealConfig, JudgmentSnapshot, LabeledText, TrainingSample};
use crate::service::detection::RetrainingEndpoint;
use crate::service::training_data::TrainingDataRecorder;

#[derive(Debug, thiserror::Error)]
pub enum RetrainingError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrainOutcome {
    /// Nothing unused to submit
    NoData,
    /// The endpoint accepted the batch and every sample in it was marked used
    Submitted { samples: usize },
    /// The endpoint failed or refused; the batch stays unused for the next cycle
    Rejected { samples: usize },
    /// Another trigger cycle holds the guard
    AlreadyRunning,
}

pub struct RetrainingService {
    arguments: Arc<dyn ArgumentStore>,
    appeals: Arc<dyn AppealStore>,
    samples: Arc<dyn TrainingSampleStore>,
    recorder: TrainingDataRecorder,
    endpoint: Arc<dyn RetrainingEndpoint>,
    config: AppealConfig,
    cycle: Mutex<()>,
}

impl RetrainingService {
    pub fn new(
        arguments: Arc<dyn ArgumentStore>,
        appeals: Arc<dyn AppealStore>,
        samples: Arc<dyn TrainingSampleStore>,
        recorder: TrainingDataRecorder,
        endpoint: Arc<dyn RetrainingEndpoint>,
        config: AppealConfig,
    ) -> Self {
        Self {
            arguments,
            appeals,
            samples,
            recorder,
            endpoint,
            config,
            cycle: Mutex::new(()),
        }
    }

    /// Create one sample for every eligible argument that has none yet.
    ///
    /// The label comes from the argument's current judgment and the most
    /// recent PENDING appeal's reason. Returns the number of new samples.
    pub async fn collect_training_data(&self) -> Result<usize, RetrainingError> {
        let eligible = self
            .appeals
            .arguments_with_pending_at_least(self.config.threshold)
            .await?;

        tracing::info!(count = eligible.len(), "Collecting training data from appealed arguments");

        let mut created = 0;
        for argument_id in eligible {
            if !self.samples.find_by_argument(argument_id).await?.is_empty() {
                continue;
            }

            let Some(argument) = self.arguments.find_by_id(argument_id).await? else {
                tracing::debug!(argument_id, "Eligible argument no longer exists, skipping");
                continue;
            };

            let Some(trigger) = self.latest_pending_appeal(argument_id).await? else {
                continue;
            };

            let judgment = JudgmentSnapshot::capture(&argument);
            if self
                .recorder
                .record(&argument, &judgment, &trigger.reason)
                .await?
                .is_some()
            {
                created += 1;
            }
        }

        Ok(created)
    }

    async fn latest_pending_appeal(&self, argument_id: i64) -> Result<Option<Appeal>, DbError> {
        Ok(self
            .appeals
            .find_by_argument(argument_id)
            .await?
            .into_iter()
            .filter(Appeal::is_pending)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))))
    }

    pub async fn unused_samples(&self) -> Result<Vec<TrainingSample>, RetrainingError> {
        Ok(self.samples.find_unused().await?)
    }

    pub async fn count_unused_samples(&self) -> Result<i64, RetrainingError> {
        Ok(self.samples.count_unused().await?)
    }

    /// Sweep, then submit every unused sample as one batch.
    ///
    /// Only one cycle runs at a time; a concurrent call returns
    /// [`RetrainOutcome::AlreadyRunning`] without reading anything.
    pub async fn trigger_retraining(&self) -> Result<RetrainOutcome, RetrainingError> {
        let Ok(_guard) = self.cycle.try_lock() else {
            tracing::info!("Retraining cycle already in progress, skipping");
            return Ok(RetrainOutcome::AlreadyRunning);
        };

        tracing::info!("Triggering retraining");

        self.collect_training_data().await?;

        let unused = self.samples.find_unused().await?;
        if unused.is_empty() {
            tracing::warn!("No unused training data available for retraining");
            return Ok(RetrainOutcome::NoData);
        }

        tracing::info!(count = unused.len(), "Found unused training data samples");

        let batch: Vec<LabeledText> = unused.iter().map(LabeledText::from).collect();

        match self.endpoint.submit_batch(&batch).await {
            Ok(()) => {
                let ids: Vec<i64> = unused.iter().map(|s| s.id).collect();
                let marked = self.samples.mark_used(&ids).await?;
                tracing::info!(submitted = ids.len(), marked, "Retraining triggered successfully");
                Ok(RetrainOutcome::Submitted { samples: ids.len() })
            }
            Err(e) => {
                tracing::warn!(error = %e, count = batch.len(), "Retraining failed, data not marked as used");
                Ok(RetrainOutcome::Rejected {
                    samples: batch.len(),
                })
            }
        }
    }

    /// Scheduler hook: run a cycle when any argument is eligible.
    ///
    /// Eligibility is per argument; the submitted batch is every unused
    /// sample. Returns `None` when nothing was eligible.
    pub async fn check_retraining_threshold(&self) -> Result<Option<RetrainOutcome>, RetrainingError> {
        let eligible = self
            .appeals
            .arguments_with_pending_at_least(self.config.threshold)
            .await?;

        if eligible.is_empty() {
            tracing::debug!("No arguments at the retraining threshold");
            return Ok(None);
        }

        tracing::info!(count = eligible.len(), "Retraining threshold reached, arguments need review");
        Ok(Some(self.trigger_retraining().await?))
    }
}
