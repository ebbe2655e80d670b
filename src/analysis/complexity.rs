//! Structural complexity metrics
//!
//! Parses a file and derives the metrics the split engine bases its
//! decisions on: line/function/class/import counts and per-function
//! cyclomatic complexity, computed as
//! `1 + branching constructs + (comparison chain length - 1)`.

use super::{parse_with_pooled_parser, Language};
use crate::cache::{content_digest, DecisionCache};
use chrono::Duration;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

/// Complexity metrics for a single file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplexityReport {
    pub total_lines: usize,
    pub total_functions: usize,
    pub total_classes: usize,
    pub total_imports: usize,
    /// Sum of per-function cyclomatic complexity
    pub cyclomatic_complexity: u32,
    /// Highest single-function cyclomatic complexity
    pub max_function_complexity: u32,
    pub file_size_bytes: usize,
    /// True when the source could not be parsed; all counts are zero
    pub parse_failed: bool,
}

impl ComplexityReport {
    fn degraded() -> Self {
        Self {
            parse_failed: true,
            ..Self::default()
        }
    }
}

/// The closed set of node classes that contribute to cyclomatic complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeClass {
    Conditional,
    Loop,
    ExceptionHandler,
    ContextManager,
    Comparison,
}

/// Classify an AST node kind for the given language, if it contributes
/// to complexity.
fn classify(language: Language, kind: &str) -> Option<NodeClass> {
    match language {
        Language::Python => match kind {
            "if_statement" | "elif_clause" | "conditional_expression" | "case_clause" => {
                Some(NodeClass::Conditional)
            }
            "for_statement" | "while_statement" => Some(NodeClass::Loop),
            "except_clause" => Some(NodeClass::ExceptionHandler),
            "with_statement" => Some(NodeClass::ContextManager),
            "comparison_operator" => Some(NodeClass::Comparison),
            _ => None,
        },
        Language::Rust => match kind {
            "if_expression" | "match_arm" => Some(NodeClass::Conditional),
            "for_expression" | "while_expression" | "loop_expression" => Some(NodeClass::Loop),
            _ => None,
        },
        Language::JavaScript | Language::TypeScript => match kind {
            "if_statement" | "ternary_expression" | "switch_case" => Some(NodeClass::Conditional),
            "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
                Some(NodeClass::Loop)
            }
            "catch_clause" => Some(NodeClass::ExceptionHandler),
            _ => None,
        },
        Language::Go => match kind {
            "if_statement" | "expression_case" | "type_case" => Some(NodeClass::Conditional),
            "for_statement" => Some(NodeClass::Loop),
            _ => None,
        },
        Language::Unknown => None,
    }
}

pub(crate) fn is_function_node(language: Language, kind: &str) -> bool {
    match language {
        Language::Python => kind == "function_definition",
        Language::Rust => kind == "function_item",
        Language::JavaScript | Language::TypeScript => matches!(
            kind,
            "function_declaration" | "method_definition" | "generator_function_declaration"
        ),
        Language::Go => matches!(kind, "function_declaration" | "method_declaration"),
        Language::Unknown => false,
    }
}

pub(crate) fn is_class_node(language: Language, kind: &str) -> bool {
    match language {
        Language::Python => kind == "class_definition",
        Language::JavaScript | Language::TypeScript => kind == "class_declaration",
        Language::Rust => kind == "struct_item",
        _ => false,
    }
}

pub(crate) fn is_import_node(language: Language, kind: &str) -> bool {
    match language {
        Language::Python => matches!(kind, "import_statement" | "import_from_statement"),
        Language::Rust => kind == "use_declaration",
        Language::JavaScript | Language::TypeScript => kind == "import_statement",
        Language::Go => kind == "import_declaration",
        Language::Unknown => false,
    }
}

/// Complexity contribution of one classified node.
///
/// Chained comparisons (`a < b < c`) add one decision point per extra
/// operator; a single comparison adds nothing, matching the
/// `chain length - 1` term of the formula.
fn node_weight(class: NodeClass, node: &Node) -> u32 {
    match class {
        NodeClass::Comparison => {
            // Operands are the named children; operators = operands - 1,
            // contribution = operators - 1.
            node.named_child_count().saturating_sub(2) as u32
        }
        _ => 1,
    }
}

/// Cyclomatic complexity of one function body: 1 + accumulated weights.
fn function_complexity(language: Language, func: &Node) -> u32 {
    let mut score = 1u32;
    let mut stack = vec![*func];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            // Nested functions are scored on their own
            if !is_function_node(language, child.kind()) {
                if let Some(class) = classify(language, child.kind()) {
                    score += node_weight(class, &child);
                }
                stack.push(child);
            }
        }
    }
    score
}

/// Analyzes structural complexity, memoizing reports by (path, digest).
pub struct ComplexityAnalyzer {
    cache: DecisionCache<(PathBuf, String), ComplexityReport>,
}

impl ComplexityAnalyzer {
    pub fn new() -> Self {
        Self {
            cache: DecisionCache::new(Duration::hours(24)),
        }
    }

    /// Analyze a file's content. Parse failures degrade to an all-zero
    /// report with `parse_failed` set so the pipeline keeps moving.
    pub fn analyze(&self, path: &Path, content: &str) -> ComplexityReport {
        let key = (path.to_path_buf(), content_digest(content));
        if let Some(report) = self.cache.get(&key) {
            return report;
        }

        let report = self.analyze_uncached(path, content);
        self.cache.set(key, report.clone());
        report
    }

    fn analyze_uncached(&self, path: &Path, content: &str) -> ComplexityReport {
        let language = Language::from_path(path);
        if language == Language::Unknown {
            return ComplexityReport::degraded();
        }

        let tree = match parse_with_pooled_parser(content, language, Some(path)) {
            Ok(t) => t,
            Err(_) => return ComplexityReport::degraded(),
        };
        let root = tree.root_node();
        if root.has_error() {
            return ComplexityReport::degraded();
        }

        let mut report = ComplexityReport {
            total_lines: content.lines().count(),
            file_size_bytes: content.len(),
            ..ComplexityReport::default()
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                let kind = child.kind();
                if is_function_node(language, kind) {
                    report.total_functions += 1;
                    let score = function_complexity(language, &child);
                    report.cyclomatic_complexity += score;
                    report.max_function_complexity = report.max_function_complexity.max(score);
                } else if is_class_node(language, kind) {
                    report.total_classes += 1;
                }
                if is_import_node(language, kind) {
                    report.total_imports += 1;
                }
                stack.push(child);
            }
        }

        report
    }
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
