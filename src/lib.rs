//! Mend library crate
//!
//! Exposes the pipeline's building blocks so integration tests and
//! external tooling can drive fixes without going through CLI startup.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod fix;
pub mod issue;
pub mod llm;
pub mod persist;
pub mod pipeline;
pub mod queue;
pub mod split;
