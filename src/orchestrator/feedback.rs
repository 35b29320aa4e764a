//! Retry feedback threaded from one attempt into the next

use crate::error::FactoryError;
use crate::quality::{QualityScore, QualityThresholds};

/// Lines kept in one feedback string
pub const MAX_FEEDBACK_LINES: usize = 12;
/// Upper bound on the feedback string length in bytes
pub const MAX_FEEDBACK_LEN: usize = 2_000;

/// Fold an attempt's failures into a bounded feedback string.
///
/// Generator errors come first since they mean nothing was validated,
/// then gate failures, then validator findings. Returns `None` when there
/// is nothing to say.
pub fn build_feedback(
    score: &QualityScore,
    thresholds: &QualityThresholds,
    error: Option<&FactoryError>,
) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    match error {
        Some(FactoryError::Structural { violations, .. }) => {
            lines.extend(violations.iter().map(|v| format!("structural check: {}", v)));
        }
        Some(e) => lines.push(e.user_message()),
        None => {
            lines.extend(score.gate_failures(thresholds));
            lines.extend(score.findings.iter().cloned());
        }
    }

    lines.dedup();
    lines.truncate(MAX_FEEDBACK_LINES);
    if lines.is_empty() {
        return None;
    }

    let mut feedback = lines
        .iter()
        .map(|l| format!("- {}", l))
        .collect::<Vec<_>>()
        .join("\n");
    if feedback.len() > MAX_FEEDBACK_LEN {
        let mut cut = MAX_FEEDBACK_LEN;
        while !feedback.is_char_boundary(cut) {
            cut -= 1;
        }
        feedback.truncate(cut);
    }
    Some(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentStage;

    #[test]
    fn test_low_score_lists_gate_failures_then_findings() {
        let thresholds = QualityThresholds::default();
        let score = QualityScore::from_dimensions(100.0, 95.0, 60.0, &thresholds)
            .with_findings(vec!["visual: contrast on_accent 2.10:1 below 4.5:1".into()]);
        let feedback = build_feedback(&score, &thresholds, None).unwrap();
        assert_eq!(
            feedback,
            "- visual score 60.0 below 85.0\n- visual: contrast on_accent 2.10:1 below 4.5:1"
        );
    }

    #[test]
    fn test_structural_error_lists_violations() {
        let thresholds = QualityThresholds::default();
        let err = FactoryError::structural(vec!["no update function".into()]);
        let feedback =
            build_feedback(&QualityScore::zero("x", &thresholds), &thresholds, Some(&err)).unwrap();
        assert_eq!(feedback, "- structural check: no update function");

        let err = FactoryError::generation(ContentStage::Logic, "llm unavailable");
        let feedback =
            build_feedback(&QualityScore::zero("x", &thresholds), &thresholds, Some(&err)).unwrap();
        assert!(feedback.contains("logic generator failed"));
    }

    #[test]
    fn test_feedback_is_bounded() {
        let thresholds = QualityThresholds::default();
        let findings = (0..50).map(|i| format!("finding {} {}", i, "é".repeat(200))).collect();
        let score = QualityScore::uniform(10.0, &thresholds).with_findings(findings);
        let feedback = build_feedback(&score, &thresholds, None).unwrap();
        assert!(feedback.len() <= MAX_FEEDBACK_LEN);
        assert!(feedback.lines().count() <= MAX_FEEDBACK_LINES);
    }

    #[test]
    fn test_passing_score_has_no_feedback() {
        let thresholds = QualityThresholds::default();
        assert!(build_feedback(&QualityScore::uniform(100.0, &thresholds), &thresholds, None).is_none());
    }
}
