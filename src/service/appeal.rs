//! Appeal lifecycle: filing, review and the approval side effect
//!
//! Appeals move `PENDING -> APPROVED` or `PENDING -> REJECTED` exactly once.
//! The transition is a compare-and-set in the store, so two reviewers acting
//! on the same appeal cannot both succeed.

use std::sync::Arc;

use crate::db::{AppealStore, ArgumentStore, DbError};
use crate::model::{
    Appeal, AppealConfig, AppealCounts, AppealPolicy, AppealStatus, JudgmentSnapshot, NewAppeal,
};
use crate::service::training_data::TrainingDataRecorder;

/// Coarse error category for the (external) controller layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AppealError {
    #[error("Argument not found: {0}")]
    ArgumentNotFound(i64),

    #[error("Appeal not found: {0}")]
    AppealNotFound(i64),

    #[error("Appeal {appeal_id} already processed ({status})")]
    AlreadyProcessed { appeal_id: i64, status: AppealStatus },

    #[error("Appeal {appeal_id} cannot move from PENDING to {to}")]
    InvalidTransition { appeal_id: i64, to: AppealStatus },

    #[error("User {user_id} may not appeal argument {argument_id}")]
    NotArgumentAuthor { argument_id: i64, user_id: i64 },

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl AppealError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppealError::ArgumentNotFound(_) | AppealError::AppealNotFound(_) => ErrorKind::NotFound,
            AppealError::AlreadyProcessed { .. } | AppealError::InvalidTransition { .. } => {
                ErrorKind::Conflict
            }
            AppealError::NotArgumentAuthor { .. } => ErrorKind::Forbidden,
            AppealError::Db(_) => ErrorKind::Internal,
        }
    }
}

pub struct AppealManager {
    arguments: Arc<dyn ArgumentStore>,
    appeals: Arc<dyn AppealStore>,
    recorder: TrainingDataRecorder,
    config: AppealConfig,
}

impl AppealManager {
    pub fn new(
        arguments: Arc<dyn ArgumentStore>,
        appeals: Arc<dyn AppealStore>,
        recorder: TrainingDataRecorder,
        config: AppealConfig,
    ) -> Self {
        Self {
            arguments,
            appeals,
            recorder,
            config,
        }
    }

    pub fn threshold(&self) -> i64 {
        self.config.threshold
    }

    /// File an appeal against the argument's current judgment.
    ///
    /// The judgment is frozen into the appeal. Reaching the PENDING threshold
    /// only marks the argument as eligible; retraining runs separately.
    pub async fn create_appeal(
        &self,
        argument_id: i64,
        appealer_id: i64,
        reason: &str,
    ) -> Result<Appeal, AppealError> {
        let argument = self
            .arguments
            .find_by_id(argument_id)
            .await?
            .filter(|a| a.active)
            .ok_or(AppealError::ArgumentNotFound(argument_id))?;

        if self.config.policy == AppealPolicy::AuthorOnly && argument.author_id != appealer_id {
            tracing::warn!(argument_id, appealer_id, author_id = argument.author_id, "Appeal denied: not the argument author");
            return Err(AppealError::NotArgumentAuthor {
                argument_id,
                user_id: appealer_id,
            });
        }

        let appeal = self
            .appeals
            .insert(NewAppeal {
                argument_id,
                appealer_id,
                reason: reason.to_string(),
                snapshot: JudgmentSnapshot::capture(&argument),
            })
            .await?;

        tracing::info!(appeal_id = appeal.id, argument_id, appealer_id, "Appeal created");

        let pending = self
            .appeals
            .count_by_argument_and_status(argument_id, AppealStatus::Pending)
            .await?;
        if pending >= self.config.threshold {
            tracing::info!(argument_id, pending, threshold = self.config.threshold, "Retraining threshold reached");
        }

        Ok(appeal)
    }

    /// Approve a PENDING appeal and record one corrected training sample
    pub async fn approve_appeal(&self, appeal_id: i64, admin_id: i64) -> Result<Appeal, AppealError> {
        let appeal = self.transition(appeal_id, AppealStatus::Approved).await?;
        tracing::info!(appeal_id, admin_id, "Appeal approved");

        match self.arguments.find_by_id(appeal.argument_id).await? {
            Some(argument) => {
                // The status change is already durable; a failure here is reported
                // but the appeal stays APPROVED
                if let Err(e) = self
                    .recorder
                    .record(&argument, &appeal.snapshot, &appeal.reason)
                    .await
                {
                    tracing::error!(appeal_id, argument_id = appeal.argument_id, error = %e, "Failed to record training data for approved appeal");
                    return Err(e.into());
                }
            }
            None => {
                tracing::warn!(appeal_id, argument_id = appeal.argument_id, "Argument gone, no training data recorded");
            }
        }

        Ok(appeal)
    }

    /// Reject a PENDING appeal; no training data is produced
    pub async fn reject_appeal(&self, appeal_id: i64, admin_id: i64) -> Result<Appeal, AppealError> {
        let appeal = self.transition(appeal_id, AppealStatus::Rejected).await?;
        tracing::info!(appeal_id, admin_id, "Appeal rejected");
        Ok(appeal)
    }

    async fn transition(&self, appeal_id: i64, to: AppealStatus) -> Result<Appeal, AppealError> {
        if !AppealStatus::Pending.can_transition_to(to) {
            return Err(AppealError::InvalidTransition { appeal_id, to });
        }

        if let Some(appeal) = self
            .appeals
            .transition(appeal_id, AppealStatus::Pending, to)
            .await?
        {
            return Ok(appeal);
        }

        // Lost the compare-and-set: report why without touching the row
        match self.appeals.find_by_id(appeal_id).await? {
            Some(current) => Err(AppealError::AlreadyProcessed {
                appeal_id,
                status: current.status,
            }),
            None => Err(AppealError::AppealNotFound(appeal_id)),
        }
    }

    pub async fn appeals_by_argument(&self, argument_id: i64) -> Result<Vec<Appeal>, AppealError> {
        Ok(self.appeals.find_by_argument(argument_id).await?)
    }

    /// All PENDING appeals, newest first
    pub async fn pending_appeals(&self) -> Result<Vec<Appeal>, AppealError> {
        Ok(self.appeals.find_by_status(AppealStatus::Pending).await?)
    }

    pub async fn count_appeals(&self, argument_id: i64) -> Result<AppealCounts, AppealError> {
        let total = self.appeals.count_by_argument(argument_id).await?;
        let pending = self.count_pending_appeals(argument_id).await?;
        Ok(AppealCounts { total, pending })
    }

    pub async fn count_pending_appeals(&self, argument_id: i64) -> Result<i64, AppealError> {
        Ok(self
            .appeals
            .count_by_argument_and_status(argument_id, AppealStatus::Pending)
            .await?)
    }

    /// Arguments whose PENDING appeals reached the threshold
    pub async fn eligible_arguments(&self) -> Result<Vec<i64>, AppealError> {
        Ok(self
            .appeals
            .arguments_with_pending_at_least(self.config.threshold)
            .await?)
    }
}
