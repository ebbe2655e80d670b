//! Split decisions for oversized files
//!
//! Decides if and how a file should be split: cheap rule thresholds
//! first, then an optional AI judgment that only overrides the rules when
//! it is confident, memoized in the TTL decision cache so identical
//! inputs get identical answers.

pub mod splitter;

pub use splitter::{FileSplitter, SplitComponent, SplitResult};

use crate::analysis::complexity::ComplexityAnalyzer;
use crate::cache::{content_digest, DecisionCache};
use crate::config::Config;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient, Model, Provider};
use chrono::Duration;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How long a split decision stays valid
const DECISION_TTL_HOURS: i64 = 1;

/// Confidence attached to rule-based verdicts
const RULE_CONFIDENCE: f64 = 0.7;

/// Confidence when the file is comfortably under every threshold
const UNDER_THRESHOLD_CONFIDENCE: f64 = 0.95;

/// Rule-based fallback: split when a file is longer than this
const FALLBACK_MAX_LINES: usize = 150;

/// Rule-based fallback: split when file complexity exceeds this
const FALLBACK_MAX_COMPLEXITY: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    ClassBased,
    FunctionBased,
    SectionBased,
    ModuleBased,
}

impl SplitStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            SplitStrategy::ClassBased => "class_based",
            SplitStrategy::FunctionBased => "function_based",
            SplitStrategy::SectionBased => "section_based",
            SplitStrategy::ModuleBased => "module_based",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "class_based" => Some(SplitStrategy::ClassBased),
            "function_based" => Some(SplitStrategy::FunctionBased),
            "section_based" => Some(SplitStrategy::SectionBased),
            "module_based" => Some(SplitStrategy::ModuleBased),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitDecision {
    pub should_split: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub strategy: SplitStrategy,
}

pub struct SplitDecisionEngine {
    analyzer: Arc<ComplexityAnalyzer>,
    cache: DecisionCache<(PathBuf, String, usize), SplitDecision>,
    llm: Option<Arc<dyn LlmClient>>,
    config: Arc<Config>,
}

impl SplitDecisionEngine {
    pub fn new(
        analyzer: Arc<ComplexityAnalyzer>,
        llm: Option<Arc<dyn LlmClient>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            analyzer,
            cache: DecisionCache::new(Duration::hours(DECISION_TTL_HOURS)),
            llm,
            config,
        }
    }

    /// Decide whether a file should be split.
    ///
    /// Under every static threshold the answer is a confident no. Over a
    /// threshold, the AI is consulted when enabled and its verdict wins
    /// only at or above the configured confidence; otherwise (and on any
    /// transport failure) the rule-based verdict stands.
    pub async fn should_split(&self, path: &Path, content: &str) -> SplitDecision {
        let report = self.analyzer.analyze(path, content);
        let strategy = FileSplitter::choose_strategy(path, content);

        let over = report.total_lines > self.config.max_lines_per_file
            || report.total_functions > self.config.max_functions_per_file
            || report.total_classes > self.config.max_classes_per_file
            || report.file_size_bytes > self.config.max_file_size_bytes
            || report.cyclomatic_complexity > self.config.max_cyclomatic_complexity;

        if !over {
            return SplitDecision {
                should_split: false,
                confidence: UNDER_THRESHOLD_CONFIDENCE,
                reasoning: "within every size and complexity threshold".to_string(),
                strategy,
            };
        }

        let key = (path.to_path_buf(), content_digest(content), content.len());
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let rule_based = SplitDecision {
            should_split: report.total_lines > FALLBACK_MAX_LINES
                || report.cyclomatic_complexity > FALLBACK_MAX_COMPLEXITY,
            confidence: RULE_CONFIDENCE,
            reasoning: format!(
                "{} lines, complexity {}",
                report.total_lines, report.cyclomatic_complexity
            ),
            strategy,
        };

        let decision = if self.config.use_ai_analysis {
            match self.ai_judgment(path, &report, strategy).await {
                Ok(ai) if ai.confidence >= self.config.confidence_threshold => ai,
                Ok(_) | Err(_) => rule_based,
            }
        } else {
            rule_based
        };

        self.cache.set(key, decision.clone());
        decision
    }

    async fn ai_judgment(
        &self,
        path: &Path,
        report: &crate::analysis::complexity::ComplexityReport,
        default_strategy: SplitStrategy,
    ) -> anyhow::Result<SplitDecision> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no LLM client configured"))?;

        let user = format!(
            "File: {}\nLines: {}\nFunctions: {}\nClasses: {}\nImports: {}\nCyclomatic complexity: {}\nSize: {} bytes\n\nShould this file be split into smaller modules?",
            path.display(),
            report.total_lines,
            report.total_functions,
            report.total_classes,
            report.total_imports,
            report.cyclomatic_complexity,
            report.file_size_bytes,
        );

        let request = CompletionRequest {
            provider: Provider::Anthropic,
            model: Model::Sonnet,
            messages: vec![
                ChatMessage::system(
                    "You judge whether a source file has grown past the point of \
                     maintainability. Respond with JSON: {\"should_split\": bool, \
                     \"confidence\": 0..1, \"reasoning\": \"...\", \"strategy\": \
                     \"class_based\"|\"function_based\"|\"section_based\"|\"module_based\"}.",
                ),
                ChatMessage::user(user),
            ],
            temperature: 0.0,
            max_tokens: 1024,
        };

        let completion = llm.complete(&request).await?;
        if let Some(error) = completion.error {
            return Err(anyhow::anyhow!("provider error: {}", error));
        }

        let parsed: Value = serde_json::from_str(completion.content.trim())
            .map_err(|e| anyhow::anyhow!("unparseable split judgment: {}", e))?;

        let should_split = parsed
            .get("should_split")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| anyhow::anyhow!("split judgment missing should_split"))?;
        let confidence = parsed
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let reasoning = parsed
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or("model judgment")
            .to_string();
        let strategy = parsed
            .get("strategy")
            .and_then(|v| v.as_str())
            .and_then(SplitStrategy::from_label)
            .unwrap_or(default_strategy);

        Ok(SplitDecision {
            should_split,
            confidence,
            reasoning,
            strategy,
        })
    }
}
