//! Fix orchestration
//!
//! Drives one claimed batch through the per-batch state machine:
//! select a specialist, walk the model fallback sequence, score and
//! validate the winning candidate, then persist it atomically. Every
//! failure mode collapses into a `BatchOutcome`; nothing in here panics
//! a worker.

pub mod confidence;
pub mod fallback;
pub mod specialist;
pub mod validate;

pub use confidence::ConfidenceScorer;
pub use fallback::ModelFallbackSequencer;
pub use specialist::{majority_error_code, select_specialist};
pub use validate::{FixValidator, Verdict};

use crate::issue::{FixAttempt, Issue};
use crate::llm::{
    parse_fix_response, ChatMessage, CompletionRequest, FixOutcome, LlmClient,
};
use crate::persist::AtomicFilePersistence;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Sampling temperature for fix generation; low on purpose, we want the
/// smallest faithful edit, not creativity.
const FIX_TEMPERATURE: f32 = 0.2;

/// Terminal state of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Completed,
    ValidationFailed,
    AllModelsExhausted,
    RolledBack,
    TimedOut,
    Skipped,
    Failed,
}

impl BatchState {
    pub fn is_fixed(&self) -> bool {
        matches!(self, BatchState::Completed)
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchState::Completed => "completed",
            BatchState::ValidationFailed => "validation_failed",
            BatchState::AllModelsExhausted => "all_models_exhausted",
            BatchState::RolledBack => "rolled_back",
            BatchState::TimedOut => "timed_out",
            BatchState::Skipped => "skipped",
            BatchState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What happened to one batch, with the full attempt log.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub file_path: PathBuf,
    pub issue_ids: Vec<String>,
    pub state: BatchState,
    pub confidence: Option<f64>,
    pub attempts: Vec<FixAttempt>,
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn terminal(batch: &[Issue], state: BatchState, error: Option<String>) -> Self {
        Self {
            file_path: batch
                .first()
                .map(|i| i.file_path.clone())
                .unwrap_or_default(),
            issue_ids: batch.iter().map(|i| i.id.clone()).collect(),
            state,
            confidence: None,
            attempts: Vec::new(),
            error,
        }
    }
}

pub struct FixOrchestrator {
    llm: Arc<dyn LlmClient>,
    sequencer: Arc<ModelFallbackSequencer>,
    persistence: Arc<AtomicFilePersistence>,
    session_id: String,
    create_backups: bool,
    /// Files beyond this many chars are skipped rather than risk a
    /// mangled rewrite
    max_fix_file_chars: usize,
}

impl FixOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        sequencer: Arc<ModelFallbackSequencer>,
        persistence: Arc<AtomicFilePersistence>,
        session_id: String,
        create_backups: bool,
        max_fix_file_chars: usize,
    ) -> Self {
        Self {
            llm,
            sequencer,
            persistence,
            session_id,
            create_backups,
            max_fix_file_chars,
        }
    }

    /// Run one batch end to end. Unexpected failures are converted into a
    /// failed outcome here, at the boundary; callers only see states.
    pub async fn fix_batch(&self, batch: &[Issue]) -> BatchOutcome {
        if batch.is_empty() {
            return BatchOutcome::terminal(batch, BatchState::Failed, Some("empty batch".into()));
        }

        let path = &batch[0].file_path;
        let original = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                return BatchOutcome::terminal(
                    batch,
                    BatchState::Failed,
                    Some(format!("could not read {}: {}", path.display(), e)),
                );
            }
        };

        if original.chars().count() > self.max_fix_file_chars {
            return BatchOutcome::terminal(
                batch,
                BatchState::Skipped,
                Some("file too large to fix safely".into()),
            );
        }

        let specialist = select_specialist(batch);
        let code = majority_error_code(batch).unwrap_or_default();
        let sequence = self.sequencer.get_fallback_sequence(&code);

        let mut attempts: Vec<FixAttempt> = Vec::new();
        let issue_ids: Vec<String> = batch.iter().map(|i| i.id.clone()).collect();

        for candidate in sequence {
            let request = CompletionRequest {
                provider: candidate.provider,
                model: candidate.model,
                messages: vec![
                    ChatMessage::system(specialist.system_prompt),
                    ChatMessage::user(build_fix_prompt(batch, &original)),
                ],
                temperature: FIX_TEMPERATURE,
                max_tokens: candidate.model.max_tokens(),
            };

            let started = Instant::now();
            let mut attempt = FixAttempt {
                issue_ids: issue_ids.clone(),
                model: candidate.model.id().to_string(),
                provider: candidate.provider.id().to_string(),
                success: false,
                confidence: 0.0,
                fixed_content: None,
                error: None,
                duration: started.elapsed(),
            };

            // Transport errors and unparseable responses advance the
            // sequence; they are recovered here and never surfaced.
            let raw = match self.llm.complete(&request).await {
                Ok(completion) => match completion.error {
                    None if !completion.content.is_empty() => completion.content,
                    None => {
                        attempt.error = Some("empty completion".into());
                        attempt.duration = started.elapsed();
                        attempts.push(attempt);
                        self.sequencer.record_outcome(candidate.model, &code, false);
                        continue;
                    }
                    Some(error) => {
                        attempt.error = Some(error);
                        attempt.duration = started.elapsed();
                        attempts.push(attempt);
                        self.sequencer.record_outcome(candidate.model, &code, false);
                        continue;
                    }
                },
                Err(e) => {
                    attempt.error = Some(format!("{:#}", e));
                    attempt.duration = started.elapsed();
                    attempts.push(attempt);
                    self.sequencer.record_outcome(candidate.model, &code, false);
                    continue;
                }
            };

            let payload = match parse_fix_response(&raw) {
                FixOutcome::Success(payload) => payload,
                FixOutcome::Failure { error, .. } => {
                    attempt.error = Some(error);
                    attempt.duration = started.elapsed();
                    attempts.push(attempt);
                    self.sequencer.record_outcome(candidate.model, &code, false);
                    continue;
                }
            };

            let score = ConfidenceScorer::score(&payload, &original, batch);
            attempt.confidence = score;
            attempt.duration = started.elapsed();

            let verdict = FixValidator::validate(&original, &payload.fixed_code, batch);
            if !verdict.is_valid {
                // Terminal for the batch: a model produced output that
                // failed validation, and a retry this run would see the
                // same inputs.
                attempt.error = Some(verdict.reason.clone());
                attempts.push(attempt);
                self.sequencer.record_outcome(candidate.model, &code, false);
                return BatchOutcome {
                    file_path: path.clone(),
                    issue_ids,
                    state: BatchState::ValidationFailed,
                    confidence: Some(score),
                    attempts,
                    error: Some(verdict.reason),
                };
            }

            let persisted = self.persistence.persist_fix(
                path,
                &payload.fixed_code,
                &self.session_id,
                self.create_backups,
            );
            if !persisted.write_success {
                attempt.error = persisted.error.clone();
                attempts.push(attempt);
                self.sequencer.record_outcome(candidate.model, &code, false);
                let state = if persisted.rollback_performed {
                    BatchState::RolledBack
                } else {
                    BatchState::Failed
                };
                return BatchOutcome {
                    file_path: path.clone(),
                    issue_ids,
                    state,
                    confidence: Some(score),
                    attempts,
                    error: persisted.error,
                };
            }

            attempt.success = true;
            attempt.fixed_content = Some(payload.fixed_code);
            attempts.push(attempt);
            self.sequencer.record_outcome(candidate.model, &code, true);

            return BatchOutcome {
                file_path: path.clone(),
                issue_ids,
                state: BatchState::Completed,
                confidence: Some(score),
                attempts,
                error: None,
            };
        }

        BatchOutcome {
            file_path: path.clone(),
            issue_ids,
            state: BatchState::AllModelsExhausted,
            confidence: None,
            attempts,
            error: Some("every fallback candidate failed".into()),
        }
    }
}

/// User prompt: the findings to resolve plus the full current file.
fn build_fix_prompt(batch: &[Issue], content: &str) -> String {
    let findings: String = batch
        .iter()
        .map(|i| {
            format!(
                "- line {}, col {}: {} {}",
                i.line, i.column, i.error_code, i.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let path = batch
        .first()
        .map(|i| i.file_path.display().to_string())
        .unwrap_or_default();

    format!(
        "File: {}\n\nFindings to resolve:\n{}\n\nCurrent Code:\n```\n{}\n```\n\nReturn the entire corrected file.",
        path, findings, content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use crate::persist::BackupStore;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Test double: yields canned responses in order, repeating the last.
    struct ScriptedLlm {
        responses: Vec<anyhow::Result<Completion>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<anyhow::Result<Completion>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: &CompletionRequest) -> anyhow::Result<Completion> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = n.min(self.responses.len() - 1);
            match &self.responses[idx] {
                Ok(c) => Ok(c.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    fn completion(content: &str) -> anyhow::Result<Completion> {
        Ok(Completion {
            content: content.to_string(),
            error: None,
        })
    }

    fn orchestrator_with_limit(llm: Arc<dyn LlmClient>, max_chars: usize) -> FixOrchestrator {
        let store = Arc::new(BackupStore::new());
        FixOrchestrator::new(
            llm,
            Arc::new(ModelFallbackSequencer::new()),
            Arc::new(AtomicFilePersistence::new(store)),
            "test-session".to_string(),
            true,
            max_chars,
        )
    }

    fn orchestrator(llm: Arc<dyn LlmClient>) -> FixOrchestrator {
        orchestrator_with_limit(llm, 20_000)
    }

    fn batch_for(dir: &TempDir, content: &str) -> Vec<Issue> {
        let path = dir.path().join("sample.py");
        fs::write(&path, content).unwrap();
        vec![Issue::new(path, 1, 1, "E501", "line too long")]
    }

    #[tokio::test]
    async fn test_successful_fix_is_persisted() {
        let dir = TempDir::new().unwrap();
        let batch = batch_for(&dir, "x = 1\n");
        let llm = Arc::new(ScriptedLlm::new(vec![completion(
            r#"{"success": true, "confidence": 0.9, "fixed_code": "x = 2\n"}"#,
        )]));

        let outcome = orchestrator(llm.clone()).fix_batch(&batch).await;
        assert_eq!(outcome.state, BatchState::Completed);
        assert_eq!(llm.call_count(), 1);
        assert_eq!(
            fs::read_to_string(&batch[0].file_path).unwrap(),
            "x = 2\n"
        );
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.attempts[0].success);
    }

    #[tokio::test]
    async fn test_transport_error_advances_to_next_candidate() {
        let dir = TempDir::new().unwrap();
        let batch = batch_for(&dir, "x = 1\n");
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(anyhow::anyhow!("connection reset")),
            completion(r#"{"success": true, "fixed_code": "x = 2\n"}"#),
        ]));

        let outcome = orchestrator(llm.clone()).fix_batch(&batch).await;
        assert_eq!(outcome.state, BatchState::Completed);
        assert_eq!(llm.call_count(), 2);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].success);
        assert!(outcome.attempts[1].success);
    }

    #[tokio::test]
    async fn test_exhaustion_fails_the_batch() {
        let dir = TempDir::new().unwrap();
        let batch = batch_for(&dir, "x = 1\n");
        let llm = Arc::new(ScriptedLlm::new(vec![Err(anyhow::anyhow!("down"))]));

        let outcome = orchestrator(llm.clone()).fix_batch(&batch).await;
        assert_eq!(outcome.state, BatchState::AllModelsExhausted);
        // One call per candidate in the easy tier
        assert_eq!(llm.call_count(), 3);
        assert_eq!(fs::read_to_string(&batch[0].file_path).unwrap(), "x = 1\n");
    }

    #[tokio::test]
    async fn test_unparseable_fix_fails_validation_terminally() {
        let dir = TempDir::new().unwrap();
        let batch = batch_for(&dir, "x = 1\n");
        let llm = Arc::new(ScriptedLlm::new(vec![completion(
            r#"{"success": true, "fixed_code": "def broken(:\n"}"#,
        )]));

        let outcome = orchestrator(llm.clone()).fix_batch(&batch).await;
        assert_eq!(outcome.state, BatchState::ValidationFailed);
        // Terminal: no further candidates tried
        assert_eq!(llm.call_count(), 1);
        assert_eq!(fs::read_to_string(&batch[0].file_path).unwrap(), "x = 1\n");
    }

    #[tokio::test]
    async fn test_missing_file_fails_cleanly() {
        let batch = vec![Issue::new("/nonexistent/sample.py", 1, 1, "E501", "m")];
        let llm = Arc::new(ScriptedLlm::new(vec![completion("unused")]));

        let outcome = orchestrator(llm.clone()).fix_batch(&batch).await;
        assert_eq!(outcome.state, BatchState::Failed);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let big = format!("x = 1\n{}", "# pad\n".repeat(5000));
        let batch = batch_for(&dir, &big);
        let llm = Arc::new(ScriptedLlm::new(vec![completion("unused")]));

        let outcome = orchestrator(llm.clone()).fix_batch(&batch).await;
        assert_eq!(outcome.state, BatchState::Skipped);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_skip_threshold_is_tunable() {
        let dir = TempDir::new().unwrap();
        let batch = batch_for(&dir, "x = 1\n");
        let llm = Arc::new(ScriptedLlm::new(vec![completion(
            r#"{"success": true, "fixed_code": "x = 2\n"}"#,
        )]));

        // 6 chars of content against a 4-char limit
        let outcome = orchestrator_with_limit(llm.clone(), 4).fix_batch(&batch).await;
        assert_eq!(outcome.state, BatchState::Skipped);
        assert_eq!(llm.call_count(), 0);

        let outcome = orchestrator_with_limit(llm.clone(), 100).fix_batch(&batch).await;
        assert_eq!(outcome.state, BatchState::Completed);
    }
}
