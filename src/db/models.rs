//! Database row models for arguments, appeals and training data

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::model::{
    Annotation, Appeal, AppealStatus, Argument, JudgmentSnapshot, SampleSource, TrainingSample,
};

/// Database representation of a debate argument (subsystem columns only)
#[derive(Debug, Clone, FromRow)]
pub struct ArgumentRow {
    pub id: i64,
    pub topic_id: i64,
    pub author_id: i64,
    pub content: String,
    pub active_yn: bool,
    pub fallacy_checked_yn: bool,
    pub fallacy_has_fallacy: Option<bool>,
    pub fallacy_type: Option<String>,
    pub fallacy_confidence: Option<f64>,
    pub fallacy_explanation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArgumentRow {
    /// Convert database row to domain model
    ///
    /// A row flagged as checked without `fallacy_has_fallacy` is read back as
    /// unchecked.
    pub fn into_domain(self) -> Argument {
        let annotation = match (self.fallacy_checked_yn, self.fallacy_has_fallacy) {
            (true, Some(has_fallacy)) => Some(Annotation {
                has_fallacy,
                fallacy_type: self.fallacy_type,
                confidence: self.fallacy_confidence.unwrap_or(0.0),
                explanation: self.fallacy_explanation.unwrap_or_default(),
            }),
            (true, None) => {
                tracing::warn!(argument_id = self.id, "Argument marked checked without a judgment");
                None
            }
            _ => None,
        };

        Argument {
            id: self.id,
            topic_id: self.topic_id,
            author_id: self.author_id,
            content: self.content,
            active: self.active_yn,
            annotation,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AppealRow {
    pub id: i64,
    pub argument_id: i64,
    pub appealer_id: i64,
    pub appeal_reason: String,
    pub ai_original_judgment: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppealRow {
    pub fn into_domain(self) -> Result<Appeal, String> {
        let status: AppealStatus = self.status.parse()?;
        let snapshot: JudgmentSnapshot = serde_json::from_value(self.ai_original_judgment)
            .map_err(|e| format!("Invalid judgment snapshot for appeal {}: {}", self.id, e))?;

        Ok(Appeal {
            id: self.id,
            argument_id: self.argument_id,
            appealer_id: self.appealer_id,
            reason: self.appeal_reason,
            snapshot,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TrainingSampleRow {
    pub id: i64,
    pub argument_id: Option<i64>,
    pub text: String,
    pub label: String,
    pub source: String,
    pub used_for_training: bool,
    pub created_at: DateTime<Utc>,
}

impl TrainingSampleRow {
    pub fn into_domain(self) -> Result<TrainingSample, String> {
        let source: SampleSource = self.source.parse()?;

        Ok(TrainingSample {
            id: self.id,
            argument_id: self.argument_id,
            text: self.text,
            label: self.label,
            source,
            used_for_training: self.used_for_training,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argument_row() -> ArgumentRow {
        ArgumentRow {
            id: 3,
            topic_id: 1,
            author_id: 9,
            content: "We must ban cars or accept pollution forever".to_string(),
            active_yn: true,
            fallacy_checked_yn: false,
            fallacy_has_fallacy: None,
            fallacy_type: None,
            fallacy_confidence: None,
            fallacy_explanation: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unchecked_row() {
        assert!(!argument_row().into_domain().checked());
    }

    #[test]
    fn test_checked_row_maps_annotation() {
        let row = ArgumentRow {
            fallacy_checked_yn: true,
            fallacy_has_fallacy: Some(true),
            fallacy_type: Some("false_dilemma".to_string()),
            fallacy_confidence: Some(0.82),
            fallacy_explanation: Some("only two options offered".to_string()),
            ..argument_row()
        };

        let argument = row.into_domain();
        assert_eq!(
            argument.annotation,
            Some(Annotation::fallacy("false_dilemma", 0.82, "only two options offered"))
        );
    }

    #[test]
    fn test_checked_without_judgment_reads_as_unchecked() {
        let row = ArgumentRow {
            fallacy_checked_yn: true,
            ..argument_row()
        };
        assert!(row.into_domain().annotation.is_none());
    }

    #[test]
    fn test_appeal_row_rejects_unknown_status() {
        let row = AppealRow {
            id: 1,
            argument_id: 3,
            appealer_id: 9,
            appeal_reason: "not a fallacy".to_string(),
            ai_original_judgment: serde_json::to_value(JudgmentSnapshot::of(None)).unwrap(),
            status: "ESCALATED".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(row.into_domain().is_err());
    }
}
