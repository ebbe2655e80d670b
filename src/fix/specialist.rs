//! Specialist selection
//!
//! Each batch is handled by the specialist whose expertise matches the
//! batch's majority error code, ties broken by first-seen order. A
//! specialist is just a name and a system prompt tuned to its category.

use crate::issue::Issue;

#[derive(Debug, PartialEq, Eq)]
pub struct Specialist {
    pub name: &'static str,
    pub system_prompt: &'static str,
}

const STYLE_SPECIALIST: Specialist = Specialist {
    name: "style",
    system_prompt: "\
You fix mechanical style findings: line length, whitespace, blank lines, \
indentation. Rewrap and reformat without changing behavior or names. \
Respond with JSON: {\"success\": bool, \"confidence\": 0..1, \
\"fixed_code\": \"<entire corrected file>\", \"explanation\": \"...\", \
\"changes\": [\"...\"]}.",
};

const IMPORT_SPECIALIST: Specialist = Specialist {
    name: "imports",
    system_prompt: "\
You fix import findings: remove unused imports, reorder or deduplicate \
import blocks. Never remove an import that is used anywhere in the file, \
including inside strings used by frameworks. Respond with JSON: \
{\"success\": bool, \"confidence\": 0..1, \"fixed_code\": \
\"<entire corrected file>\", \"explanation\": \"...\", \"changes\": [\"...\"]}.",
};

const LOGIC_SPECIALIST: Specialist = Specialist {
    name: "logic",
    system_prompt: "\
You fix findings that require reasoning about behavior: undefined names, \
unreachable code, syntax errors. Make the smallest change that resolves \
the finding while preserving intent. Respond with JSON: {\"success\": bool, \
\"confidence\": 0..1, \"fixed_code\": \"<entire corrected file>\", \
\"explanation\": \"...\", \"changes\": [\"...\"]}.",
};

const GENERAL_SPECIALIST: Specialist = Specialist {
    name: "general",
    system_prompt: "\
You fix code-quality findings reported by a linter. Make the smallest \
change that resolves each finding. Respond with JSON: {\"success\": bool, \
\"confidence\": 0..1, \"fixed_code\": \"<entire corrected file>\", \
\"explanation\": \"...\", \"changes\": [\"...\"]}.",
};

fn specialist_for_code(error_code: &str) -> &'static Specialist {
    let code = error_code.trim().to_ascii_uppercase();
    if code == "F401" || code.starts_with("F4") || code.starts_with("I0") {
        &IMPORT_SPECIALIST
    } else if code.starts_with("F8") || code.starts_with("E9") || code.starts_with("F7") {
        &LOGIC_SPECIALIST
    } else if code.starts_with('E') || code.starts_with('W') {
        &STYLE_SPECIALIST
    } else {
        &GENERAL_SPECIALIST
    }
}

/// Majority error code of a batch, ties broken by first-seen order.
pub fn majority_error_code(issues: &[Issue]) -> Option<String> {
    let mut order: Vec<&str> = Vec::new();
    for issue in issues {
        if !order.contains(&issue.error_code.as_str()) {
            order.push(&issue.error_code);
        }
    }
    // Strictly-greater comparison keeps the first-seen code on ties
    let mut best: Option<(&str, usize)> = None;
    for code in order {
        let count = issues.iter().filter(|i| i.error_code == code).count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((code, count));
        }
    }
    best.map(|(code, _)| code.to_string())
}

/// Pick the specialist for a batch by its majority error code.
pub fn select_specialist(issues: &[Issue]) -> &'static Specialist {
    match majority_error_code(issues) {
        Some(code) => specialist_for_code(&code),
        None => &GENERAL_SPECIALIST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(code: &str) -> Issue {
        Issue::new("a.py", 1, 1, code, "finding")
    }

    #[test]
    fn test_majority_code_wins() {
        let issues = vec![issue("E501"), issue("E501"), issue("F401")];
        assert_eq!(majority_error_code(&issues).as_deref(), Some("E501"));
        assert_eq!(select_specialist(&issues).name, "style");
    }

    #[test]
    fn test_tie_breaks_to_first_seen() {
        let issues = vec![issue("F401"), issue("E501")];
        assert_eq!(majority_error_code(&issues).as_deref(), Some("F401"));
        assert_eq!(select_specialist(&issues).name, "imports");
    }

    #[test]
    fn test_logic_codes_get_logic_specialist() {
        assert_eq!(select_specialist(&[issue("F821")]).name, "logic");
        assert_eq!(select_specialist(&[issue("E999")]).name, "logic");
    }

    #[test]
    fn test_unknown_codes_fall_back_to_general() {
        assert_eq!(select_specialist(&[issue("X123")]).name, "general");
        assert_eq!(select_specialist(&[]).name, "general");
    }
}
