//! LLM collaborator boundary
//!
//! Everything the pipeline knows about models lives here: the transport
//! trait and production client, the model/provider catalog, and the
//! parser that turns raw responses into tagged outcomes.

pub mod client;
pub mod models;
pub mod parse;

pub use client::{ChatMessage, Completion, CompletionRequest, LlmClient, OpenRouterClient};
pub use models::{competency_table, Candidate, Difficulty, Model, Provider};
pub use parse::{parse_fix_response, FixOutcome, FixPayload};
