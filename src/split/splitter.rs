//! File splitting
//!
//! Executes a splitting strategy against an oversized file, producing
//! components that each carry the original imports and must re-parse on
//! their own. The splitter never writes anything to disk; committing the
//! components is the caller's business.

use super::SplitStrategy;
use crate::analysis::complexity::{
    is_class_node, is_function_node, is_import_node, ComplexityAnalyzer,
};
use crate::analysis::{self, parse_with_pooled_parser, Language};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Module functions beyond this push a file to a function-based split
const FUNCTION_SPLIT_THRESHOLD: usize = 10;

/// Line count beyond which an unstructured file is cut into sections
const SECTION_SPLIT_LINES: usize = 500;

/// One extracted piece of a split file. Transient: callers decide whether
/// any of it reaches disk.
#[derive(Debug, Clone)]
pub struct SplitComponent {
    pub name: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub component_type: String,
    /// Import lines carried over from the original file
    pub dependencies: Vec<String>,
    pub complexity_score: f64,
}

#[derive(Debug, Clone)]
pub struct SplitResult {
    pub strategy: SplitStrategy,
    pub components: Vec<SplitComponent>,
    /// True only when every component re-parses
    pub validation_passed: bool,
}

/// Top-level regions of a file, in source order.
struct Outline {
    imports: Vec<String>,
    classes: Vec<Region>,
    functions: Vec<Region>,
}

struct Region {
    name: String,
    text: String,
    start_line: usize,
    end_line: usize,
}

fn outline(path: &Path, content: &str, language: Language) -> Result<Outline> {
    let tree = parse_with_pooled_parser(content, language, Some(path))?;
    let root = tree.root_node();

    let mut imports = Vec::new();
    let mut classes = Vec::new();
    let mut functions = Vec::new();

    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        let kind = node.kind();
        let text = content[node.byte_range()].to_string();
        if is_import_node(language, kind) {
            imports.push(text);
            continue;
        }

        let region = |name: String| Region {
            name,
            text: text.clone(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        };
        let name = node
            .child_by_field_name("name")
            .map(|n| content[n.byte_range()].to_string());

        if is_class_node(language, kind) {
            classes.push(region(name.unwrap_or_else(|| format!("class_{}", classes.len() + 1))));
        } else if is_function_node(language, kind) {
            functions.push(region(
                name.unwrap_or_else(|| format!("function_{}", functions.len() + 1)),
            ));
        }
    }

    Ok(Outline {
        imports,
        classes,
        functions,
    })
}

pub struct FileSplitter {
    analyzer: Arc<ComplexityAnalyzer>,
    validate_splits: bool,
}

impl FileSplitter {
    pub fn new(analyzer: Arc<ComplexityAnalyzer>, validate_splits: bool) -> Self {
        Self {
            analyzer,
            validate_splits,
        }
    }

    /// Pick the strategy for a file from its top-level shape.
    pub fn choose_strategy(path: &Path, content: &str) -> SplitStrategy {
        let language = Language::from_path(path);
        let Ok(outline) = outline(path, content, language) else {
            return SplitStrategy::ModuleBased;
        };

        if !outline.classes.is_empty() && outline.classes.len() >= outline.functions.len() {
            SplitStrategy::ClassBased
        } else if outline.functions.len() > FUNCTION_SPLIT_THRESHOLD {
            SplitStrategy::FunctionBased
        } else if content.lines().count() > SECTION_SPLIT_LINES {
            SplitStrategy::SectionBased
        } else {
            SplitStrategy::ModuleBased
        }
    }

    /// Split a file with the strategy its shape calls for.
    pub fn split(&self, path: &Path, content: &str) -> Result<SplitResult> {
        let strategy = Self::choose_strategy(path, content);
        self.split_with_strategy(path, content, strategy)
    }

    pub fn split_with_strategy(
        &self,
        path: &Path,
        content: &str,
        strategy: SplitStrategy,
    ) -> Result<SplitResult> {
        let language = Language::from_path(path);
        let outline = outline(path, content, language)?;

        let components = match strategy {
            SplitStrategy::ClassBased => {
                self.region_components(path, &outline.classes, &outline.imports, "class")
            }
            SplitStrategy::FunctionBased => {
                self.region_components(path, &outline.functions, &outline.imports, "function")
            }
            SplitStrategy::SectionBased => {
                self.section_components(path, content, &outline.imports)
            }
            SplitStrategy::ModuleBased => vec![self.whole_module_component(path, content)],
        };

        let validation_passed = if self.validate_splits {
            components
                .iter()
                .all(|c| analysis::parses_cleanly(path, &c.content))
        } else {
            true
        };

        Ok(SplitResult {
            strategy,
            components,
            validation_passed,
        })
    }

    fn region_components(
        &self,
        path: &Path,
        regions: &[Region],
        imports: &[String],
        component_type: &str,
    ) -> Vec<SplitComponent> {
        regions
            .iter()
            .map(|region| {
                let content = with_imports(imports, &region.text);
                SplitComponent {
                    name: region.name.clone(),
                    complexity_score: self.component_complexity(path, &content),
                    content,
                    start_line: region.start_line,
                    end_line: region.end_line,
                    component_type: component_type.to_string(),
                    dependencies: imports.to_vec(),
                }
            })
            .collect()
    }

    fn section_components(
        &self,
        path: &Path,
        content: &str,
        imports: &[String],
    ) -> Vec<SplitComponent> {
        let lines: Vec<&str> = content.lines().collect();
        let chunk_len = lines.len().div_ceil(3).max(1);

        lines
            .chunks(chunk_len)
            .enumerate()
            .map(|(i, chunk)| {
                let body = chunk.join("\n");
                let section = with_imports(imports, &body);
                let start_line = i * chunk_len + 1;
                SplitComponent {
                    name: format!("section_{}", i + 1),
                    complexity_score: self.component_complexity(path, &section),
                    content: section,
                    start_line,
                    end_line: (start_line + chunk.len()).saturating_sub(1),
                    component_type: "section".to_string(),
                    dependencies: imports.to_vec(),
                }
            })
            .collect()
    }

    fn whole_module_component(&self, path: &Path, content: &str) -> SplitComponent {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();
        SplitComponent {
            name,
            complexity_score: self.component_complexity(path, content),
            content: content.to_string(),
            start_line: 1,
            end_line: content.lines().count(),
            component_type: "module".to_string(),
            dependencies: Vec::new(),
        }
    }

    fn component_complexity(&self, path: &Path, content: &str) -> f64 {
        let report = self.analyzer.analyze(path, content);
        report.cyclomatic_complexity as f64
    }
}

/// Prefix a component body with the original file's imports.
fn with_imports(imports: &[String], body: &str) -> String {
    if imports.is_empty() {
        return format!("{}\n", body.trim_end());
    }
    format!("{}\n\n\n{}\n", imports.join("\n"), body.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn splitter() -> FileSplitter {
        FileSplitter::new(Arc::new(ComplexityAnalyzer::new()), true)
    }

    fn py_path() -> PathBuf {
        PathBuf::from("sample.py")
    }

    const FOUR_CLASSES: &str = "\
import os
from collections import OrderedDict

class Alpha:
    def run(self):
        return 1

class Beta:
    def run(self):
        return 2

class Gamma:
    def run(self):
        return 3

class Delta:
    def run(self):
        return 4

def helper_one():
    return 5

def helper_two():
    return 6
";

    #[test]
    fn test_class_based_split_carries_imports() {
        // 4 top-level classes, 2 functions: class-based, 4 components,
        // each carrying the original imports.
        let result = splitter().split(&py_path(), FOUR_CLASSES).unwrap();
        assert_eq!(result.strategy, SplitStrategy::ClassBased);
        assert_eq!(result.components.len(), 4);
        assert!(result.validation_passed);
        for component in &result.components {
            assert!(component.content.contains("import os"));
            assert!(component.content.contains("from collections import OrderedDict"));
            assert_eq!(component.component_type, "class");
        }
        let names: Vec<&str> = result.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma", "Delta"]);
    }

    #[test]
    fn test_function_based_split_for_many_functions() {
        let mut src = String::from("import sys\n\n");
        for i in 0..12 {
            src.push_str(&format!("def fn_{}(x):\n    return x + {}\n\n", i, i));
        }
        let result = splitter().split(&py_path(), &src).unwrap();
        assert_eq!(result.strategy, SplitStrategy::FunctionBased);
        assert_eq!(result.components.len(), 12);
        assert!(result.validation_passed);
        assert!(result.components.iter().all(|c| c.content.contains("import sys")));
    }

    #[test]
    fn test_small_file_is_module_based_noop() {
        let src = "def one():\n    return 1\n";
        let result = splitter().split(&py_path(), src).unwrap();
        assert_eq!(result.strategy, SplitStrategy::ModuleBased);
        assert_eq!(result.components.len(), 1);
        assert_eq!(result.components[0].content, src);
        assert!(result.validation_passed);
    }

    #[test]
    fn test_section_based_split_for_long_flat_file() {
        let src = (0..600)
            .map(|i| format!("x_{} = {}", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let result = splitter().split(&py_path(), &src).unwrap();
        assert_eq!(result.strategy, SplitStrategy::SectionBased);
        assert_eq!(result.components.len(), 3);
        // Flat assignments re-parse fine per section
        assert!(result.validation_passed);
    }

    #[test]
    fn test_component_line_spans_point_into_original() {
        let result = splitter().split(&py_path(), FOUR_CLASSES).unwrap();
        let alpha = &result.components[0];
        assert_eq!(alpha.start_line, 4);
        assert_eq!(alpha.end_line, 6);
    }

    #[test]
    fn test_components_carry_complexity_scores() {
        let result = splitter().split(&py_path(), FOUR_CLASSES).unwrap();
        assert!(result.components.iter().all(|c| c.complexity_score >= 1.0));
    }

    #[test]
    fn test_invalid_component_fails_validation() {
        // A section cut mid-block will not re-parse: 3-line blocks against
        // a chunk length that is not a multiple of 3.
        let mut src = String::new();
        for i in 0..334 {
            src.push_str(&format!("if x_{}:\n    y_{} = 1\n    z_{} = 2\n", i, i, i));
        }
        let result = splitter()
            .split_with_strategy(&py_path(), &src, SplitStrategy::SectionBased)
            .unwrap();
        assert!(!result.validation_passed);
    }
}
