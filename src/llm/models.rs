//! Model and provider catalog
//!
//! Fix generation runs against a small set of known (model, provider)
//! pairs, tiered by how hard a class of lint finding is. The fallback
//! sequencer walks these candidates in order.

use serde::{Deserialize, Serialize};

/// Upstream providers reachable through the OpenRouter-compatible endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
}

impl Provider {
    pub fn id(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }
}

/// Models available for fix generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    /// Fast, cheap model for mechanical style fixes
    Mini,
    /// Fast Anthropic tier for simple edits
    Haiku,
    /// Balanced reasoning for typical findings
    Sonnet,
    /// General-purpose mid tier
    Gpt4o,
    /// Google mid tier
    Flash,
    /// Best reasoning for gnarly findings
    Opus,
}

/// Maximum tokens for all model tiers
const MODEL_MAX_TOKENS: u32 = 16384;

impl Model {
    pub fn id(&self) -> &'static str {
        match self {
            Model::Mini => "openai/gpt-4o-mini",
            Model::Haiku => "anthropic/claude-3-5-haiku",
            Model::Sonnet => "anthropic/claude-sonnet-4.5",
            Model::Gpt4o => "openai/gpt-4o",
            Model::Flash => "google/gemini-2.5-flash",
            Model::Opus => "anthropic/claude-opus-4.5",
        }
    }

    pub fn max_tokens(&self) -> u32 {
        MODEL_MAX_TOKENS
    }
}

/// One (model, provider) fallback candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub model: Model,
    pub provider: Provider,
}

impl Candidate {
    pub const fn new(model: Model, provider: Provider) -> Self {
        Self { model, provider }
    }
}

/// How hard a class of error code typically is to fix correctly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Classify a lint error code.
    ///
    /// Whitespace/layout codes and unused imports are mechanical; logic
    /// and name-resolution codes need real reasoning. Unknown codes land
    /// in the middle.
    pub fn classify(error_code: &str) -> Self {
        let code = error_code.trim().to_ascii_uppercase();
        if code.starts_with("E1")
            || code.starts_with("E2")
            || code.starts_with("E3")
            || code.starts_with("E5")
            || code.starts_with('W')
            || code == "F401"
        {
            Difficulty::Easy
        } else if code.starts_with("E9") || code.starts_with("F8") || code.starts_with("F7") {
            Difficulty::Hard
        } else {
            Difficulty::Medium
        }
    }
}

/// Static competency table: ordered candidates per difficulty class.
pub fn competency_table(difficulty: Difficulty) -> &'static [Candidate] {
    const EASY: &[Candidate] = &[
        Candidate::new(Model::Mini, Provider::OpenAi),
        Candidate::new(Model::Haiku, Provider::Anthropic),
        Candidate::new(Model::Flash, Provider::Google),
    ];
    const MEDIUM: &[Candidate] = &[
        Candidate::new(Model::Sonnet, Provider::Anthropic),
        Candidate::new(Model::Gpt4o, Provider::OpenAi),
        Candidate::new(Model::Flash, Provider::Google),
    ];
    const HARD: &[Candidate] = &[
        Candidate::new(Model::Opus, Provider::Anthropic),
        Candidate::new(Model::Sonnet, Provider::Anthropic),
        Candidate::new(Model::Gpt4o, Provider::OpenAi),
    ];

    match difficulty {
        Difficulty::Easy => EASY,
        Difficulty::Medium => MEDIUM,
        Difficulty::Hard => HARD,
    }
}
