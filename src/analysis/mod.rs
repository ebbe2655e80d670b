//! Source analysis for Mend
//!
//! Uses tree-sitter for multi-language AST parsing. Parsing backs both the
//! fix validator (does the proposed fix still parse?) and the complexity
//! analyzer / file splitter.

pub mod complexity;

use std::cell::RefCell;
use std::path::Path;
use tree_sitter::Parser;

/// Supported programming languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    JavaScript,
    TypeScript,
    Python,
    Go,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "py" | "pyi" => Language::Python,
            "go" => Language::Go,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  THREAD-LOCAL PARSER POOL
// ═══════════════════════════════════════════════════════════════════════════
//
// Tree-sitter parsers are expensive to create but can be reused for multiple
// files of the same language. Each worker thread gets its own set of
// pre-configured parsers.

thread_local! {
    static RUST_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Ignore error here - will be caught at parse time if language fails
        let _ = p.set_language(&tree_sitter_rust::LANGUAGE.into());
        p
    });

    static JS_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_javascript::LANGUAGE.into());
        p
    });

    static TS_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into());
        p
    });

    static TSX_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into());
        p
    });

    static PYTHON_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_python::LANGUAGE.into());
        p
    });

    static GO_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_go::LANGUAGE.into());
        p
    });
}

/// Parse content using a thread-local parser for the given language
pub(crate) fn parse_with_pooled_parser(
    content: &str,
    language: Language,
    path: Option<&Path>,
) -> anyhow::Result<tree_sitter::Tree> {
    let parse_result = match language {
        Language::Rust => RUST_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::JavaScript => JS_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::TypeScript => {
            let use_tsx = path
                .and_then(|p| p.extension())
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("tsx"))
                .unwrap_or(false);
            if use_tsx {
                TSX_PARSER.with(|p| p.borrow_mut().parse(content, None))
            } else {
                TS_PARSER.with(|p| p.borrow_mut().parse(content, None))
            }
        }
        Language::Python => PYTHON_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::Go => GO_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::Unknown => return Err(anyhow::anyhow!("Unknown language")),
    };

    parse_result.ok_or_else(|| anyhow::anyhow!("Failed to parse content"))
}

/// Returns true if the content parses without syntax error nodes.
///
/// Unknown languages are treated as parseable: we have no grammar to judge
/// them with, and refusing every fix to a `.cfg` or `.txt` file would be
/// worse than trusting the model.
pub fn parses_cleanly(path: &Path, content: &str) -> bool {
    let language = Language::from_path(path);
    if language == Language::Unknown {
        return true;
    }
    match parse_with_pooled_parser(content, language, Some(path)) {
        Ok(tree) => !tree.root_node().has_error(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("RS"), Language::Rust);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("lol"), Language::Unknown);
    }

    #[test]
    fn test_parses_cleanly_valid_python() {
        let path = PathBuf::from("sample.py");
        assert!(parses_cleanly(&path, "def foo():\n    return 1\n"));
    }

    #[test]
    fn test_parses_cleanly_rejects_broken_python() {
        let path = PathBuf::from("sample.py");
        assert!(!parses_cleanly(&path, "def foo(:\n    return\n"));
    }

    #[test]
    fn test_unknown_language_is_trusted() {
        let path = PathBuf::from("notes.txt");
        assert!(parses_cleanly(&path, "anything goes here"));
    }
}
