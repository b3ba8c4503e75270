//! Corrected-label inference for disputed judgments
//!
//! This is a keyword heuristic, not an authoritative classification. It
//! exists so that a disputed argument can enter the retraining set with a
//! best-guess label.

use crate::model::JudgmentSnapshot;
use crate::model::training::{LABEL_NO_FALLACY, LABEL_UNKNOWN_FALLACY};

/// Korean and English cues mapped to fallacy labels, checked in order
const REASON_KEYWORDS: &[(&[&str], &str)] = &[
    (&["인신공격", "ad hominem"], "ad_hominem"),
    (&["허수아비", "straw man"], "straw_man"),
    (&["양자택일", "false dilemma"], "false_dilemma"),
    (&["감정", "emotion"], "appeal_to_emotion"),
    (&["순환", "circular"], "circular_reasoning"),
    (&["성급한", "hasty"], "hasty_generalization"),
    (&["인과", "cause"], "false_cause"),
    (&["다수", "bandwagon"], "bandwagon"),
    (&["권위", "authority"], "appeal_to_authority"),
    (&["빨간", "red herring"], "red_herring"),
];

/// Label the disputed text should carry, given the judgment and the appeal reason.
///
/// A disputed positive judgment was a false positive, so the label is
/// `no_fallacy`. Otherwise the reason is scanned for a known fallacy name.
/// With no match, an explicit negative judgment falls back to
/// `unknown_fallacy` (the appealer saw a fallacy the classifier missed);
/// with no judgment at all there is nothing to contradict and the label is
/// `no_fallacy`.
pub fn infer_corrected_label(snapshot: &JudgmentSnapshot, appeal_reason: &str) -> String {
    if snapshot.flagged_fallacy() {
        return LABEL_NO_FALLACY.to_string();
    }

    if let Some(label) = label_from_reason(appeal_reason) {
        return label.to_string();
    }

    if snapshot.checked && snapshot.has_fallacy == Some(false) {
        LABEL_UNKNOWN_FALLACY.to_string()
    } else {
        LABEL_NO_FALLACY.to_string()
    }
}

fn label_from_reason(reason: &str) -> Option<&'static str> {
    let reason = reason.to_lowercase();
    REASON_KEYWORDS
        .iter()
        .find(|(cues, _)| cues.iter().any(|cue| reason.contains(cue)))
        .map(|(_, label)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Annotation;

    fn flagged() -> JudgmentSnapshot {
        JudgmentSnapshot::of(Some(&Annotation::fallacy("ad_hominem", 0.9, "")))
    }

    fn cleared() -> JudgmentSnapshot {
        JudgmentSnapshot::of(Some(&Annotation::clean(0.8, "")))
    }

    #[test]
    fn test_overturned_positive_is_no_fallacy() {
        // The reason is irrelevant once the classifier had flagged a fallacy
        assert_eq!(infer_corrected_label(&flagged(), "this is a straw man"), "no_fallacy");
    }

    #[test]
    fn test_missed_fallacy_read_from_reason() {
        assert_eq!(
            infer_corrected_label(&cleared(), "Clearly a STRAW MAN of my position"),
            "straw_man"
        );
        assert_eq!(infer_corrected_label(&cleared(), "인신공격입니다"), "ad_hominem");
        assert_eq!(infer_corrected_label(&cleared(), "pure red herring"), "red_herring");
    }

    #[test]
    fn test_keyword_order_decides_ties() {
        // "emotion" is listed before "authority"
        assert_eq!(
            infer_corrected_label(&cleared(), "appeals to emotion and authority"),
            "appeal_to_emotion"
        );
    }

    #[test]
    fn test_no_match_is_unknown() {
        assert_eq!(infer_corrected_label(&cleared(), "I just disagree"), "unknown_fallacy");
    }

    #[test]
    fn test_unchecked_snapshot_without_cue_is_no_fallacy() {
        let unchecked = JudgmentSnapshot::of(None);
        assert_eq!(infer_corrected_label(&unchecked, "I disagree with this"), "no_fallacy");
    }

    #[test]
    fn test_unchecked_snapshot_uses_reason() {
        let unchecked = JudgmentSnapshot::of(None);
        assert_eq!(infer_corrected_label(&unchecked, "circular logic"), "circular_reasoning");
    }
}
