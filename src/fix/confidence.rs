//! Confidence scoring for proposed fixes
//!
//! A fix candidate earns a score in [0, 1] through successive adjustments
//! over a 0.3 base: what the response claims about itself, how much the
//! content actually changed, and how hard the batch's findings are. The
//! score is advisory; the validator has the final say.

use crate::issue::Issue;
use crate::llm::{Difficulty, FixPayload};

const BASE_SCORE: f64 = 0.3;

/// Weight kept for our own estimate when blending in self-reported
/// confidence (the remainder goes to the model's claim).
const SELF_CONFIDENCE_BLEND: f64 = 0.7;

/// An explanation this long is treated as substantive
const LONG_EXPLANATION_CHARS: usize = 200;

pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// Score a fix candidate against the original content and the batch
    /// it is meant to resolve. Always lands in [0, 1].
    pub fn score(payload: &FixPayload, original: &str, issues: &[Issue]) -> f64 {
        let mut score = BASE_SCORE;

        if payload.self_reported_success {
            score += 0.2;
        }

        if let Some(reported) = payload.self_reported_confidence {
            score = SELF_CONFIDENCE_BLEND * score + (1.0 - SELF_CONFIDENCE_BLEND) * reported;
        }

        let fixed = &payload.fixed_code;
        if fixed != original {
            score += 0.15;

            let ratio = if original.is_empty() {
                f64::INFINITY
            } else {
                fixed.len() as f64 / original.len() as f64
            };
            if (0.8..=1.2).contains(&ratio) {
                score += 0.1;
            } else if ratio < 0.5 || ratio > 2.0 {
                score -= 0.1;
            }
        }

        if let Some(explanation) = &payload.explanation {
            score += 0.1;
            if explanation.chars().count() >= LONG_EXPLANATION_CHARS {
                score += 0.05;
            }
        }

        if let Some(changes) = &payload.changes {
            score += 0.1;
            if !changes.is_empty() {
                score += 0.05;
            }
        }

        score += match issues.len() {
            1 => 0.1,
            2..=3 => 0.05,
            n if n > 10 => -0.1,
            _ => 0.0,
        };

        for issue in issues {
            score += match Difficulty::classify(&issue.error_code) {
                Difficulty::Easy => 0.05,
                Difficulty::Medium => 0.02,
                Difficulty::Hard => -0.02,
            };
        }

        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payload(fixed: &str) -> FixPayload {
        FixPayload {
            fixed_code: fixed.to_string(),
            self_reported_success: false,
            self_reported_confidence: None,
            explanation: None,
            changes: None,
        }
    }

    #[test]
    fn test_unchanged_content_scores_low() {
        let original = "x = 1\n";
        let score = ConfidenceScorer::score(&payload(original), original, &[]);
        assert!((score - BASE_SCORE).abs() < 1e-9);
    }

    #[test]
    fn test_confident_selfreport_with_modest_growth_scores_high() {
        // {"success": true, "confidence": 0.9} with a 10%-larger fix
        let original = "a".repeat(100);
        let mut p = payload(&"a".repeat(110));
        p.self_reported_success = true;
        p.self_reported_confidence = Some(0.9);

        let score = ConfidenceScorer::score(&p, &original, &[]);
        // 0.3 +0.2 -> blend with 0.9 -> +0.15 change +0.1 ratio = 0.87
        assert!((0.8..=0.95).contains(&score), "score was {}", score);
    }

    #[test]
    fn test_oversized_rewrite_is_penalized() {
        let original = "a".repeat(100);
        let bloated = ConfidenceScorer::score(&payload(&"a".repeat(300)), &original, &[]);
        let proportionate = ConfidenceScorer::score(&payload(&"a".repeat(105)), &original, &[]);
        assert!(bloated < proportionate);
    }

    #[test]
    fn test_explanation_and_changes_add_credit() {
        let original = "x = 1\n";
        let mut p = payload("x = 2\n");
        let bare = ConfidenceScorer::score(&p, original, &[]);

        p.explanation = Some("Replaced the constant.".to_string());
        p.changes = Some(vec!["updated x".to_string()]);
        let documented = ConfidenceScorer::score(&p, original, &[]);

        assert!((documented - bare - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_issue_count_adjustments() {
        let original = "x = 1\n";
        let p = payload("x = 2\n");
        let single = ConfidenceScorer::score(&p, original, &[Issue::new("a.py", 1, 1, "C901", "m")]);
        let many: Vec<Issue> = (0..12)
            .map(|i| Issue::new("a.py", i, 1, "C901", "m"))
            .collect();
        let crowded = ConfidenceScorer::score(&p, original, &many);
        assert!(single > crowded);
    }

    #[test]
    fn test_easy_codes_nudge_up_hard_codes_down() {
        let original = "x = 1\n";
        let p = payload("x = 2\n");
        let easy = ConfidenceScorer::score(&p, original, &[Issue::new("a.py", 1, 1, "E501", "m")]);
        let hard = ConfidenceScorer::score(&p, original, &[Issue::new("a.py", 1, 1, "F821", "m")]);
        assert!(easy > hard);
    }

    proptest! {
        #[test]
        fn prop_score_always_in_unit_interval(
            fixed in ".{0,400}",
            original in ".{0,400}",
            success in any::<bool>(),
            reported in proptest::option::of(-10.0f64..10.0),
            explanation in proptest::option::of(".{0,300}"),
            has_changes in any::<bool>(),
            n_issues in 0usize..20,
        ) {
            let p = FixPayload {
                fixed_code: fixed,
                self_reported_success: success,
                self_reported_confidence: reported,
                explanation,
                changes: if has_changes { Some(vec!["c".to_string()]) } else { None },
            };
            let issues: Vec<Issue> = (0..n_issues)
                .map(|i| Issue::new("a.py", i as u32, 1, "F821", "m"))
                .collect();
            let score = ConfidenceScorer::score(&p, &original, &issues);
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
