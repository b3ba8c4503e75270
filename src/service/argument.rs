use std::sync::Arc;

use crate::db::{ArgumentStore, DbError};
use crate::model::{Argument, NewArgument, TopicContext};
use crate::service::annotation::{AnnotationJob, AnnotationQueue};
use crate::service::detection::DetectionRequest;

/// Argument creation with fallacy detection scheduled after the insert commits
pub struct ArgumentService {
    arguments: Arc<dyn ArgumentStore>,
    queue: Arc<AnnotationQueue>,
    language: String,
}

impl ArgumentService {
    pub fn new(arguments: Arc<dyn ArgumentStore>, queue: Arc<AnnotationQueue>, language: impl Into<String>) -> Self {
        Self {
            arguments,
            queue,
            language: language.into(),
        }
    }

    /// Persist the argument and schedule its detection.
    ///
    /// The caller gets the argument back unchecked whatever happens to the
    /// detection job; a saturated queue only costs the annotation.
    pub async fn create_argument(&self, new: NewArgument, topic: TopicContext) -> Result<Argument, DbError> {
        let argument = self.arguments.insert(new).await?;

        let job = AnnotationJob {
            argument_id: argument.id,
            request: DetectionRequest::new(argument.content.clone(), self.language.clone()).with_topic(topic),
        };

        match self.queue.submit(job) {
            Ok(()) => tracing::debug!(argument_id = argument.id, "Fallacy detection scheduled"),
            Err(e) => tracing::warn!(argument_id = argument.id, error = %e, "Fallacy detection not scheduled"),
        }

        Ok(argument)
    }
}
