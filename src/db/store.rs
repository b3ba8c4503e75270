//! Storage contracts consumed by the fallacy services
//!
//! Each trait is implemented by the PostgreSQL repositories and by the
//! in-process stores in [`super::memory`].

use async_trait::async_trait;

use super::DbError;
use crate::model::{
    Annotation, Appeal, AppealStatus, Argument, NewAppeal, NewArgument, NewTrainingSample,
    TrainingSample,
};

#[async_trait]
pub trait ArgumentStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Argument>, DbError>;

    /// Insert a new unchecked argument. The row is committed when this returns.
    async fn insert(&self, argument: NewArgument) -> Result<Argument, DbError>;

    /// Write an annotation in a transaction of its own.
    ///
    /// Returns `false` when the argument no longer exists.
    async fn apply_annotation(&self, id: i64, annotation: &Annotation) -> Result<bool, DbError>;
}

#[async_trait]
pub trait AppealStore: Send + Sync {
    async fn insert(&self, appeal: NewAppeal) -> Result<Appeal, DbError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Appeal>, DbError>;

    async fn find_by_argument(&self, argument_id: i64) -> Result<Vec<Appeal>, DbError>;

    /// Appeals in `status`, newest first
    async fn find_by_status(&self, status: AppealStatus) -> Result<Vec<Appeal>, DbError>;

    async fn count_by_argument(&self, argument_id: i64) -> Result<i64, DbError>;

    async fn count_by_argument_and_status(
        &self,
        argument_id: i64,
        status: AppealStatus,
    ) -> Result<i64, DbError>;

    /// Atomically move an appeal from `from` to `to`.
    ///
    /// Returns `None` without writing when the current status is not `from`
    /// (or the appeal does not exist).
    async fn transition(
        &self,
        id: i64,
        from: AppealStatus,
        to: AppealStatus,
    ) -> Result<Option<Appeal>, DbError>;

    /// Argument ids with at least `threshold` PENDING appeals, most appealed first
    async fn arguments_with_pending_at_least(&self, threshold: i64) -> Result<Vec<i64>, DbError>;
}

#[async_trait]
pub trait TrainingSampleStore: Send + Sync {
    /// Insert unless a sample already exists for the same argument.
    ///
    /// Samples without an argument id are always inserted. Returns `None`
    /// when an existing sample made this a no-op.
    async fn insert_once_per_argument(
        &self,
        sample: NewTrainingSample,
    ) -> Result<Option<TrainingSample>, DbError>;

    async fn find_by_argument(&self, argument_id: i64) -> Result<Vec<TrainingSample>, DbError>;

    /// Samples not yet consumed by a retraining batch, newest first
    async fn find_unused(&self) -> Result<Vec<TrainingSample>, DbError>;

    async fn count_unused(&self) -> Result<i64, DbError>;

    /// Flag the given samples as consumed. Already-used samples are left alone.
    async fn mark_used(&self, ids: &[i64]) -> Result<u64, DbError>;
}
