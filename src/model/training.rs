//! Labeled samples queued for classifier retraining

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const LABEL_NO_FALLACY: &str = "no_fallacy";
pub const LABEL_UNKNOWN_FALLACY: &str = "unknown_fallacy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSource {
    UserAppeal,
    AiVerified,
    Manual,
}

impl SampleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleSource::UserAppeal => "user_appeal",
            SampleSource::AiVerified => "ai_verified",
            SampleSource::Manual => "manual",
        }
    }
}

impl fmt::Display for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_appeal" => Ok(SampleSource::UserAppeal),
            "ai_verified" => Ok(SampleSource::AiVerified),
            "manual" => Ok(SampleSource::Manual),
            other => Err(format!("Unknown training data source: {}", other)),
        }
    }
}

/// A stored training sample.
///
/// `used_for_training` flips to true once, after the retraining endpoint
/// accepted a batch containing this sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub id: i64,
    pub argument_id: Option<i64>,
    pub text: String,
    pub label: String,
    pub source: SampleSource,
    pub used_for_training: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTrainingSample {
    pub argument_id: Option<i64>,
    pub text: String,
    pub label: String,
    pub source: SampleSource,
}

/// `{text, label}` pair as sent to the retraining endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledText {
    pub text: String,
    pub label: String,
}

impl From<&TrainingSample> for LabeledText {
    fn from(sample: &TrainingSample) -> Self {
        Self {
            text: sample.text.clone(),
            label: sample.label.clone(),
        }
    }
}
