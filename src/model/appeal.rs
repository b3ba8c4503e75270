//! Appeals against automated fallacy judgments

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::argument::{Annotation, Argument};

/// Review state of an appeal.
///
/// `Pending` is the only state with outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
}

impl AppealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppealStatus::Pending => "PENDING",
            AppealStatus::Approved => "APPROVED",
            AppealStatus::Rejected => "REJECTED",
        }
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: AppealStatus) -> bool {
        matches!(
            (self, next),
            (AppealStatus::Pending, AppealStatus::Approved)
                | (AppealStatus::Pending, AppealStatus::Rejected)
        )
    }
}

impl fmt::Display for AppealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AppealStatus::Pending),
            "APPROVED" => Ok(AppealStatus::Approved),
            "REJECTED" => Ok(AppealStatus::Rejected),
            other => Err(format!("Unknown appeal status: {}", other)),
        }
    }
}

/// The judgment being disputed, frozen when the appeal is filed.
///
/// Later re-annotation of the argument never changes this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentSnapshot {
    pub checked: bool,
    pub has_fallacy: Option<bool>,
    pub fallacy_type: Option<String>,
    pub confidence: Option<f64>,
    pub explanation: Option<String>,
}

impl JudgmentSnapshot {
    pub fn of(annotation: Option<&Annotation>) -> Self {
        match annotation {
            Some(a) => Self {
                checked: true,
                has_fallacy: Some(a.has_fallacy),
                fallacy_type: a.fallacy_type.clone(),
                confidence: Some(a.confidence),
                explanation: Some(a.explanation.clone()),
            },
            None => Self {
                checked: false,
                has_fallacy: None,
                fallacy_type: None,
                confidence: None,
                explanation: None,
            },
        }
    }

    pub fn capture(argument: &Argument) -> Self {
        Self::of(argument.annotation.as_ref())
    }

    /// True only when the classifier positively flagged a fallacy
    pub fn flagged_fallacy(&self) -> bool {
        self.has_fallacy == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appeal {
    pub id: i64,
    pub argument_id: i64,
    pub appealer_id: i64,
    pub reason: String,
    pub snapshot: JudgmentSnapshot,
    pub status: AppealStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appeal {
    pub fn is_pending(&self) -> bool {
        self.status == AppealStatus::Pending
    }
}

/// Insert payload; new appeals always start as `Pending`
#[derive(Debug, Clone)]
pub struct NewAppeal {
    pub argument_id: i64,
    pub appealer_id: i64,
    pub reason: String,
    pub snapshot: JudgmentSnapshot,
}

/// Appeal totals for one argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppealCounts {
    pub total: i64,
    pub pending: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_has_outgoing_transitions() {
        use AppealStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Approved, Rejected] {
            for next in [Pending, Approved, Rejected] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_column_text() {
        for status in [AppealStatus::Pending, AppealStatus::Approved, AppealStatus::Rejected] {
            assert_eq!(status.as_str().parse::<AppealStatus>().unwrap(), status);
        }
        assert!("WITHDRAWN".parse::<AppealStatus>().is_err());
    }

    #[test]
    fn test_snapshot_of_unchecked_argument() {
        let snapshot = JudgmentSnapshot::of(None);
        assert!(!snapshot.checked);
        assert!(!snapshot.flagged_fallacy());
        assert_eq!(snapshot.confidence, None);
    }

    #[test]
    fn test_snapshot_copies_annotation_fields() {
        let annotation = Annotation::fallacy("straw_man", 0.75, "misrepresents the opponent");
        let snapshot = JudgmentSnapshot::of(Some(&annotation));

        assert!(snapshot.checked);
        assert!(snapshot.flagged_fallacy());
        assert_eq!(snapshot.fallacy_type.as_deref(), Some("straw_man"));
        assert_eq!(snapshot.confidence, Some(0.75));
    }

    #[test]
    fn test_snapshot_serializes_as_structured_fields() {
        let snapshot = JudgmentSnapshot::of(Some(&Annotation::clean(0.6, "")));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["has_fallacy"], serde_json::json!(false));
        assert_eq!(json["checked"], serde_json::json!(true));
    }
}
