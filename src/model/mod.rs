pub mod appeal;
pub mod argument;
pub mod config;
pub mod training;

pub use appeal::{Appeal, AppealCounts, AppealStatus, JudgmentSnapshot, NewAppeal};
pub use argument::{Annotation, Argument, NewArgument, TopicContext};
pub use config::{
    AnnotationConfig, AppealConfig, AppealPolicy, Config, DetectionConfig, RetrainingConfig,
    StorageBackend,
};
pub use training::{LabeledText, NewTrainingSample, SampleSource, TrainingSample};
