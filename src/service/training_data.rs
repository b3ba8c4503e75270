//! The single place where appeal-derived training samples are created

use std::sync::Arc;

use crate::db::{DbError, TrainingSampleStore};
use crate::model::{Argument, JudgmentSnapshot, NewTrainingSample, SampleSource, TrainingSample};
use crate::service::labeling::infer_corrected_label;

/// Creates at most one `user_appeal` sample per argument.
///
/// Both appeal approval and the retraining sweep go through here, so the
/// label rule and the dedup rule cannot drift apart.
#[derive(Clone)]
pub struct TrainingDataRecorder {
    samples: Arc<dyn TrainingSampleStore>,
}

impl TrainingDataRecorder {
    pub fn new(samples: Arc<dyn TrainingSampleStore>) -> Self {
        Self { samples }
    }

    /// Record a corrected sample for `argument` unless one already exists.
    ///
    /// Returns the new sample, or `None` when the argument already had one.
    pub async fn record(
        &self,
        argument: &Argument,
        judgment: &JudgmentSnapshot,
        appeal_reason: &str,
    ) -> Result<Option<TrainingSample>, DbError> {
        let label = infer_corrected_label(judgment, appeal_reason);

        let inserted = self
            .samples
            .insert_once_per_argument(NewTrainingSample {
                argument_id: Some(argument.id),
                text: argument.content.clone(),
                label,
                source: SampleSource::UserAppeal,
            })
            .await?;

        match &inserted {
            Some(sample) => {
                tracing::info!(argument_id = argument.id, sample_id = sample.id, label = %sample.label, "Training data created")
            }
            None => {
                tracing::debug!(argument_id = argument.id, "Training data already exists for argument")
            }
        }

        Ok(inserted)
    }
}
