pub mod annotation;
pub mod appeal;
pub mod argument;
pub mod detection;
pub mod labeling;
pub mod retraining;
pub mod training_data;

pub use annotation::{AnnotationJob, AnnotationQueue, AnnotationUpdater, CompletionResult, QueueError};
pub use appeal::{AppealError, AppealManager, ErrorKind};
pub use argument::ArgumentService;
pub use detection::{
    DetectionClient, DetectionError, DetectionOutcome, DetectionRequest, FallacyDetector,
    RetrainingEndpoint,
};
pub use labeling::infer_corrected_label;
pub use retraining::{RetrainOutcome, RetrainingError, RetrainingService};
pub use training_data::TrainingDataRecorder;
