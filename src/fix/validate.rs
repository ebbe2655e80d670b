//! Fix validation
//!
//! The gate between a scored fix candidate and the filesystem: a fix is
//! rejected when it changes nothing or no longer parses. This validator
//! deliberately does not re-run the linter to confirm the reported finding
//! is gone; a fix that parses and differs is accepted as-is.

use crate::analysis;
use crate::issue::Issue;

/// Outcome of validating one fix candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_valid: bool,
    pub reason: String,
}

impl Verdict {
    fn valid() -> Self {
        Self {
            is_valid: true,
            reason: "content differs and parses".to_string(),
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: reason.into(),
        }
    }
}

pub struct FixValidator;

impl FixValidator {
    /// Validate a proposed fix against the original content of the file
    /// the batch's issues point at.
    pub fn validate(original: &str, fixed: &str, issues: &[Issue]) -> Verdict {
        let Some(first) = issues.first() else {
            return Verdict::invalid("no issues to validate against");
        };

        if fixed == original {
            return Verdict::invalid("fix is identical to the original");
        }

        if fixed.trim().is_empty() {
            return Verdict::invalid("fix is empty");
        }

        if !analysis::parses_cleanly(&first.file_path, fixed) {
            return Verdict::invalid("fix does not parse");
        }

        Verdict::valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues() -> Vec<Issue> {
        vec![Issue::new("sample.py", 1, 1, "E501", "line too long")]
    }

    #[test]
    fn test_unchanged_fix_is_invalid() {
        let verdict = FixValidator::validate("x = 1\n", "x = 1\n", &issues());
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("identical"));
    }

    #[test]
    fn test_unparseable_fix_is_invalid() {
        let verdict = FixValidator::validate("x = 1\n", "def broken(:\n", &issues());
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("parse"));
    }

    #[test]
    fn test_differing_parsing_fix_is_valid() {
        let verdict = FixValidator::validate("x = 1\n", "x = 2\n", &issues());
        assert!(verdict.is_valid);
    }

    #[test]
    fn test_empty_fix_is_invalid() {
        let verdict = FixValidator::validate("x = 1\n", "  \n", &issues());
        assert!(!verdict.is_valid);
    }

    #[test]
    fn test_no_issues_is_invalid() {
        let verdict = FixValidator::validate("x = 1\n", "x = 2\n", &[]);
        assert!(!verdict.is_valid);
    }
}
