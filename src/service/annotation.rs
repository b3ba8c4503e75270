//! Background annotation of newly created arguments
//!
//! Detection jobs go through a bounded queue drained by a small pool of
//! worker tasks. A worker runs the classifier and hands the outcome to
//! [`AnnotationUpdater`], which writes it back in a transaction of its own.
//! Nothing is retried: an argument whose detection fails stays unchecked.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::ArgumentStore;
use crate::model::AnnotationConfig;
use crate::service::detection::{
    DetectionOutcome, DetectionRequest, FallacyDetector, run_detection,
};

/// Detection work for one argument, keyed by the id captured at scheduling time
#[derive(Debug, Clone)]
pub struct AnnotationJob {
    pub argument_id: i64,
    pub request: DetectionRequest,
}

/// What a completion did with its detection outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionResult {
    Annotated,
    /// The argument was deleted before the result arrived
    ArgumentMissing,
    NoResult,
    TimedOut,
    WriteFailed,
}

/// Completion handler for finished detection calls
pub struct AnnotationUpdater {
    arguments: Arc<dyn ArgumentStore>,
}

impl AnnotationUpdater {
    pub fn new(arguments: Arc<dyn ArgumentStore>) -> Self {
        Self { arguments }
    }

    pub async fn complete(&self, argument_id: i64, outcome: DetectionOutcome) -> CompletionResult {
        let annotation = match outcome {
            DetectionOutcome::Detected(annotation) => annotation,
            DetectionOutcome::TimedOut => {
                tracing::warn!(argument_id, "Fallacy detection timeout");
                return CompletionResult::TimedOut;
            }
            DetectionOutcome::Unavailable(error) => {
                tracing::error!(argument_id, error = %error, "Fallacy detection failed");
                return CompletionResult::NoResult;
            }
        };

        match self.arguments.apply_annotation(argument_id, &annotation).await {
            Ok(true) => {
                tracing::info!(argument_id, has_fallacy = annotation.has_fallacy, fallacy_type = ?annotation.fallacy_type, "Fallacy detection result saved");
                CompletionResult::Annotated
            }
            Ok(false) => {
                tracing::warn!(argument_id, "Argument not found for fallacy update");
                CompletionResult::ArgumentMissing
            }
            Err(e) => {
                tracing::error!(argument_id, error = %e, "Failed to save fallacy detection result");
                CompletionResult::WriteFailed
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Annotation queue full, dropping argument {0}")]
    Full(i64),

    #[error("Annotation queue closed, dropping argument {0}")]
    Closed(i64),
}

/// Bounded detection queue with a fixed pool of workers
pub struct AnnotationQueue {
    sender: Mutex<Option<mpsc::Sender<AnnotationJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AnnotationQueue {
    /// Spawn `config.workers` workers on the current runtime
    pub fn start(
        detector: Arc<dyn FallacyDetector>,
        updater: Arc<AnnotationUpdater>,
        timeout: Duration,
        config: &AnnotationConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<AnnotationJob>(config.queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let detector = Arc::clone(&detector);
                let updater = Arc::clone(&updater);
                tokio::spawn(async move {
                    loop {
                        // Hold the receiver only while waiting for the next job
                        let job = receiver.lock().await.recv().await;
                        let Some(job) = job else { break };

                        let outcome = run_detection(detector.as_ref(), &job.request, timeout).await;
                        updater.complete(job.argument_id, outcome).await;
                    }
                    tracing::debug!(worker, "Annotation worker stopped");
                })
            })
            .collect();

        tracing::info!(workers = config.workers.max(1), capacity = config.queue_capacity.max(1), "Annotation queue started");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue without waiting; a full or closed queue drops the job
    pub fn submit(&self, job: AnnotationJob) -> Result<(), QueueError> {
        let argument_id = job.argument_id;
        let guard = self.sender.lock().map_err(|_| QueueError::Closed(argument_id))?;
        let sender = guard.as_ref().ok_or(QueueError::Closed(argument_id))?;

        sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full(argument_id),
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed(argument_id),
        })
    }

    /// Stop accepting jobs and wait until queued ones are processed
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        drop(sender);

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => Vec::new(),
        };

        for result in join_all(workers).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Annotation worker panicked");
            }
        }

        tracing::info!("Annotation queue drained");
    }
}
