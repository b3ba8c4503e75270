//! Debate arguments and the fallacy annotation attached to them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classifier judgment for a single argument.
///
/// `fallacy_type` is always present when `has_fallacy` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub has_fallacy: bool,
    pub fallacy_type: Option<String>,
    pub confidence: f64,
    pub explanation: String,
}

impl Annotation {
    /// Annotation for text the classifier considered sound
    pub fn clean(confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            has_fallacy: false,
            fallacy_type: None,
            confidence,
            explanation: explanation.into(),
        }
    }

    /// Annotation for text with a detected fallacy
    pub fn fallacy(fallacy_type: impl Into<String>, confidence: f64, explanation: impl Into<String>) -> Self {
        Self {
            has_fallacy: true,
            fallacy_type: Some(fallacy_type.into()),
            confidence,
            explanation: explanation.into(),
        }
    }
}

/// A user-submitted argument as seen by this subsystem.
///
/// The forum owns the record. Only `annotation` is written here, and
/// `None` means the argument has not been checked yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub id: i64,
    pub topic_id: i64,
    pub author_id: i64,
    pub content: String,
    pub active: bool,
    pub annotation: Option<Annotation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Argument {
    pub fn checked(&self) -> bool {
        self.annotation.is_some()
    }

    pub fn has_fallacy(&self) -> Option<bool> {
        self.annotation.as_ref().map(|a| a.has_fallacy)
    }
}

/// Fields supplied when the forum creates an argument
#[derive(Debug, Clone)]
pub struct NewArgument {
    pub topic_id: i64,
    pub author_id: i64,
    pub content: String,
}

/// Topic context forwarded to the classifier alongside the argument text
#[derive(Debug, Clone, Default)]
pub struct TopicContext {
    pub title: Option<String>,
    pub description: Option<String>,
}
