//! Model fallback sequencing
//!
//! For each error code, candidates start in the static competency order
//! and are re-ranked by exponentially-weighted historical success for that
//! (model, error_code) pair, so a model that keeps botching E501 fixes
//! sinks down the list within a run.

use crate::llm::{competency_table, Candidate, Difficulty, Model};
use std::collections::HashMap;
use std::sync::Mutex;

/// Weight of the newest observation in the running success score
const EWMA_ALPHA: f64 = 0.3;

/// Score assumed for a pair with no history yet
const NEUTRAL_SCORE: f64 = 0.5;

pub struct ModelFallbackSequencer {
    history: Mutex<HashMap<(Model, String), f64>>,
}

impl ModelFallbackSequencer {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Ordered (model, provider) candidates for an error code.
    ///
    /// The sort is stable: pairs with equal history keep their competency
    /// order, so a fresh sequencer returns the static table unchanged.
    pub fn get_fallback_sequence(&self, error_code: &str) -> Vec<Candidate> {
        let difficulty = Difficulty::classify(error_code);
        let mut candidates: Vec<Candidate> = competency_table(difficulty).to_vec();

        let history = match self.history.lock() {
            Ok(h) => h,
            Err(e) => e.into_inner(),
        };
        candidates.sort_by(|a, b| {
            let sa = history
                .get(&(a.model, error_code.to_string()))
                .copied()
                .unwrap_or(NEUTRAL_SCORE);
            let sb = history
                .get(&(b.model, error_code.to_string()))
                .copied()
                .unwrap_or(NEUTRAL_SCORE);
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    /// Fold one observed outcome into the running score for the pair.
    pub fn record_outcome(&self, model: Model, error_code: &str, success: bool) {
        let mut history = match self.history.lock() {
            Ok(h) => h,
            Err(e) => e.into_inner(),
        };
        let key = (model, error_code.to_string());
        let observed = if success { 1.0 } else { 0.0 };
        let score = history.entry(key).or_insert(NEUTRAL_SCORE);
        *score = EWMA_ALPHA * observed + (1.0 - EWMA_ALPHA) * *score;
    }
}

impl Default for ModelFallbackSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;

    #[test]
    fn test_fresh_sequencer_returns_static_order() {
        let seq = ModelFallbackSequencer::new();
        let sequence = seq.get_fallback_sequence("E501");
        assert_eq!(sequence, competency_table(Difficulty::Easy).to_vec());
    }

    #[test]
    fn test_repeated_failures_demote_a_model() {
        let seq = ModelFallbackSequencer::new();
        let first = seq.get_fallback_sequence("E501")[0];

        for _ in 0..5 {
            seq.record_outcome(first.model, "E501", false);
        }

        let reranked = seq.get_fallback_sequence("E501");
        assert_ne!(reranked[0].model, first.model);
        assert_eq!(reranked.last().map(|c| c.model), Some(first.model));
    }

    #[test]
    fn test_successes_promote_a_model() {
        let seq = ModelFallbackSequencer::new();
        let sequence = seq.get_fallback_sequence("E711");
        let underdog = sequence.last().copied().unwrap();

        for _ in 0..5 {
            seq.record_outcome(underdog.model, "E711", true);
        }

        assert_eq!(seq.get_fallback_sequence("E711")[0].model, underdog.model);
    }

    #[test]
    fn test_history_is_scoped_per_error_code() {
        let seq = ModelFallbackSequencer::new();
        seq.record_outcome(Model::Mini, "E501", false);
        // A different code is unaffected
        assert_eq!(
            seq.get_fallback_sequence("W291"),
            competency_table(Difficulty::Easy).to_vec()
        );
    }

    #[test]
    fn test_candidates_carry_providers() {
        let seq = ModelFallbackSequencer::new();
        let sequence = seq.get_fallback_sequence("F821");
        assert!(sequence
            .iter()
            .any(|c| c.provider == Provider::Anthropic));
    }
}
