//! In-process stores for tests and `storage: memory` runs.
//!
//! Every operation holds the state lock for its full duration, which gives
//! the same atomicity the PostgreSQL queries provide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::store::{AppealStore, ArgumentStore, TrainingSampleStore};
use super::DbError;
use crate::model::{
    Annotation, Appeal, AppealStatus, Argument, NewAppeal, NewArgument, NewTrainingSample,
    TrainingSample,
};

#[derive(Default)]
struct State {
    next_id: i64,
    arguments: HashMap<i64, Argument>,
    appeals: Vec<Appeal>,
    samples: Vec<TrainingSample>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared in-memory backend implementing all three store traits.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, DbError> {
        self.state
            .lock()
            .map_err(|_| DbError::Serialization("memory store lock poisoned".to_string()))
    }

    /// Remove an argument outright, as a concurrent forum delete would
    pub fn remove_argument(&self, id: i64) -> Result<bool, DbError> {
        Ok(self.lock()?.arguments.remove(&id).is_some())
    }

    /// Soft-delete an argument the way the forum does
    pub fn deactivate_argument(&self, id: i64) -> Result<bool, DbError> {
        let mut state = self.lock()?;
        match state.arguments.get_mut(&id) {
            Some(argument) => {
                argument.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Overwrite an argument's annotation directly, bypassing the updater
    pub fn set_annotation(&self, id: i64, annotation: Option<Annotation>) -> Result<(), DbError> {
        let mut state = self.lock()?;
        let argument = state
            .arguments
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("argument {}", id)))?;
        argument.annotation = annotation;
        Ok(())
    }

    /// Every stored training sample, in insertion order
    pub fn all_samples(&self) -> Result<Vec<TrainingSample>, DbError> {
        Ok(self.lock()?.samples.clone())
    }
}

#[async_trait]
impl ArgumentStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Argument>, DbError> {
        Ok(self.lock()?.arguments.get(&id).cloned())
    }

    async fn insert(&self, argument: NewArgument) -> Result<Argument, DbError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let stored = Argument {
            id: state.next_id(),
            topic_id: argument.topic_id,
            author_id: argument.author_id,
            content: argument.content,
            active: true,
            annotation: None,
            created_at: now,
            updated_at: now,
        };
        state.arguments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn apply_annotation(&self, id: i64, annotation: &Annotation) -> Result<bool, DbError> {
        let mut state = self.lock()?;
        match state.arguments.get_mut(&id) {
            Some(argument) => {
                argument.annotation = Some(annotation.clone());
                argument.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AppealStore for MemoryStore {
    async fn insert(&self, appeal: NewAppeal) -> Result<Appeal, DbError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let stored = Appeal {
            id: state.next_id(),
            argument_id: appeal.argument_id,
            appealer_id: appeal.appealer_id,
            reason: appeal.reason,
            snapshot: appeal.snapshot,
            status: AppealStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.appeals.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Appeal>, DbError> {
        Ok(self.lock()?.appeals.iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_argument(&self, argument_id: i64) -> Result<Vec<Appeal>, DbError> {
        Ok(self
            .lock()?
            .appeals
            .iter()
            .filter(|a| a.argument_id == argument_id)
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: AppealStatus) -> Result<Vec<Appeal>, DbError> {
        Ok(self
            .lock()?
            .appeals
            .iter()
            .rev()
            .filter(|a| a.status == status)
            .cloned()
            .collect())
    }

    async fn count_by_argument(&self, argument_id: i64) -> Result<i64, DbError> {
        let state = self.lock()?;
        Ok(state.appeals.iter().filter(|a| a.argument_id == argument_id).count() as i64)
    }

    async fn count_by_argument_and_status(
        &self,
        argument_id: i64,
        status: AppealStatus,
    ) -> Result<i64, DbError> {
        let state = self.lock()?;
        Ok(state
            .appeals
            .iter()
            .filter(|a| a.argument_id == argument_id && a.status == status)
            .count() as i64)
    }

    async fn transition(
        &self,
        id: i64,
        from: AppealStatus,
        to: AppealStatus,
    ) -> Result<Option<Appeal>, DbError> {
        let mut state = self.lock()?;
        match state.appeals.iter_mut().find(|a| a.id == id) {
            Some(appeal) if appeal.status == from => {
                appeal.status = to;
                appeal.updated_at = Utc::now();
                Ok(Some(appeal.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn arguments_with_pending_at_least(&self, threshold: i64) -> Result<Vec<i64>, DbError> {
        let state = self.lock()?;
        let mut counts: HashMap<i64, i64> = HashMap::new();
        for appeal in state.appeals.iter().filter(|a| a.is_pending()) {
            *counts.entry(appeal.argument_id).or_default() += 1;
        }

        let mut eligible: Vec<(i64, i64)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .collect();
        eligible.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(eligible.into_iter().map(|(id, _)| id).collect())
    }
}

#[async_trait]
impl TrainingSampleStore for MemoryStore {
    async fn insert_once_per_argument(
        &self,
        sample: NewTrainingSample,
    ) -> Result<Option<TrainingSample>, DbError> {
        let mut state = self.lock()?;

        if let Some(argument_id) = sample.argument_id {
            if state.samples.iter().any(|s| s.argument_id == Some(argument_id)) {
                return Ok(None);
            }
        }

        let stored = TrainingSample {
            id: state.next_id(),
            argument_id: sample.argument_id,
            text: sample.text,
            label: sample.label,
            source: sample.source,
            used_for_training: false,
            created_at: Utc::now(),
        };
        state.samples.push(stored.clone());
        Ok(Some(stored))
    }

    async fn find_by_argument(&self, argument_id: i64) -> Result<Vec<TrainingSample>, DbError> {
        Ok(self
            .lock()?
            .samples
            .iter()
            .filter(|s| s.argument_id == Some(argument_id))
            .cloned()
            .collect())
    }

    async fn find_unused(&self) -> Result<Vec<TrainingSample>, DbError> {
        Ok(self
            .lock()?
            .samples
            .iter()
            .rev()
            .filter(|s| !s.used_for_training)
            .cloned()
            .collect())
    }

    async fn count_unused(&self) -> Result<i64, DbError> {
        let state = self.lock()?;
        Ok(state.samples.iter().filter(|s| !s.used_for_training).count() as i64)
    }

    async fn mark_used(&self, ids: &[i64]) -> Result<u64, DbError> {
        let mut state = self.lock()?;
        let mut updated = 0;
        for sample in state
            .samples
            .iter_mut()
            .filter(|s| !s.used_for_training && ids.contains(&s.id))
        {
            sample.used_for_training = true;
            updated += 1;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JudgmentSnapshot, SampleSource};

    async fn seeded() -> (MemoryStore, Argument) {
        let store = MemoryStore::new();
        let argument = ArgumentStore::insert(
            &store,
            NewArgument {
                topic_id: 1,
                author_id: 5,
                content: "Crime rose after the new mayor, so the mayor caused it".to_string(),
            },
        )
        .await
        .unwrap();
        (store, argument)
    }

    #[tokio::test]
    async fn test_apply_annotation_on_missing_argument() {
        let store = MemoryStore::new();
        let written = store
            .apply_annotation(42, &Annotation::clean(0.5, ""))
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let (store, argument) = seeded().await;
        let appeal = AppealStore::insert(
            &store,
            NewAppeal {
                argument_id: argument.id,
                appealer_id: 5,
                reason: "this is not false cause".to_string(),
                snapshot: JudgmentSnapshot::capture(&argument),
            },
        )
        .await
        .unwrap();

        let rejected = store
            .transition(appeal.id, AppealStatus::Pending, AppealStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(rejected.unwrap().status, AppealStatus::Rejected);

        let again = store
            .transition(appeal.id, AppealStatus::Pending, AppealStatus::Approved)
            .await
            .unwrap();
        assert!(again.is_none());
        let stored = AppealStore::find_by_id(&store, appeal.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppealStatus::Rejected);
    }

    #[tokio::test]
    async fn test_mark_used_only_counts_fresh_flips() {
        let (store, argument) = seeded().await;
        let sample = store
            .insert_once_per_argument(NewTrainingSample {
                argument_id: Some(argument.id),
                text: argument.content.clone(),
                label: "false_cause".to_string(),
                source: SampleSource::UserAppeal,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.mark_used(&[sample.id]).await.unwrap(), 1);
        assert_eq!(store.mark_used(&[sample.id]).await.unwrap(), 0);
        assert_eq!(store.count_unused().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_samples_without_argument_are_not_deduplicated() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            let inserted = store
                .insert_once_per_argument(NewTrainingSample {
                    argument_id: None,
                    text: "Curated example".to_string(),
                    label: "straw_man".to_string(),
                    source: SampleSource::Manual,
                })
                .await
                .unwrap();
            assert!(inserted.is_some());
        }
        assert_eq!(store.count_unused().await.unwrap(), 2);
    }
}
