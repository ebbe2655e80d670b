//! Fix pipeline
//!
//! Spawns a bounded pool of workers over the issue queue. Each worker
//! claims one file's batch at a time, runs it through the orchestrator
//! under a wall-clock budget, records the terminal status, and releases
//! the file. An optional report-only pre-pass flags files worth splitting
//! before any fix touches them. The run always ends with a session
//! summary, even when every batch fails.

use crate::config::Config;
use crate::fix::{BatchOutcome, BatchState, FixOrchestrator};
use crate::issue::Issue;
use crate::queue::IssueQueueManager;
use crate::split::SplitDecisionEngine;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Upper bound on issues claimed per batch
const MAX_BATCH_ISSUES: usize = 10;

/// Idle wait when queued work exists but every file is claimed
const CLAIM_RETRY_MS: u64 = 25;

/// What one pipeline run accomplished.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub issues_queued: usize,
    pub issues_processed: usize,
    pub issues_fixed: usize,
    pub issues_failed: usize,
    pub issues_skipped: usize,
    /// Files whose content actually changed this run, sorted
    pub files_modified: Vec<PathBuf>,
    /// Files the pre-pass judged worth splitting, in issue order
    pub split_candidates: Vec<PathBuf>,
    /// Fixed over processed, in [0, 1]; zero when nothing was processed
    pub success_rate: f64,
    pub duration: Duration,
}

struct PipelineContext {
    queue: Arc<IssueQueueManager>,
    orchestrator: Arc<FixOrchestrator>,
    config: Arc<Config>,
    fixes_applied: AtomicUsize,
    outcomes: Mutex<Vec<BatchOutcome>>,
}

pub struct FixPipeline {
    ctx: Arc<PipelineContext>,
    session_id: String,
    splits: Option<Arc<SplitDecisionEngine>>,
}

impl FixPipeline {
    pub fn new(
        queue: Arc<IssueQueueManager>,
        orchestrator: Arc<FixOrchestrator>,
        config: Arc<Config>,
        session_id: String,
    ) -> Self {
        Self {
            ctx: Arc::new(PipelineContext {
                queue,
                orchestrator,
                config,
                fixes_applied: AtomicUsize::new(0),
                outcomes: Mutex::new(Vec::new()),
            }),
            session_id,
            splits: None,
        }
    }

    /// Attach a split engine; the run will then flag oversized files in
    /// a report-only pre-pass before fixing starts.
    pub fn with_split_engine(mut self, engine: Arc<SplitDecisionEngine>) -> Self {
        self.splits = Some(engine);
        self
    }

    /// Queue the given issues, drain them with the worker pool, and
    /// report what happened.
    pub async fn run(&self, issues: Vec<Issue>) -> SessionSummary {
        let started = Instant::now();
        let split_candidates = self.split_pre_pass(&issues).await;
        let queued = self.ctx.queue.queue_issues(issues);
        eprintln!("  Queued {} issues", queued);

        let workers = self.ctx.config.max_workers.max(1);
        let mut handles = Vec::with_capacity(workers);
        for n in 0..workers {
            let ctx = self.ctx.clone();
            let worker_id = format!("worker-{}", n + 1);
            handles.push(tokio::spawn(worker_loop(ctx, worker_id)));
        }
        for handle in handles {
            // Worker tasks never panic; a join error would mean the
            // runtime tore them down, which we treat as a drained worker.
            let _ = handle.await;
        }

        // A cap hit mid-run leaves queued issues behind; close them out.
        if self.cap_reached() {
            self.ctx.queue.close();
        }

        self.summarize(queued, split_candidates, started.elapsed())
    }

    /// Report-only split advisory over the distinct files the issues
    /// point at. Unreadable files are the orchestrator's problem later.
    async fn split_pre_pass(&self, issues: &[Issue]) -> Vec<PathBuf> {
        let Some(engine) = &self.splits else {
            return Vec::new();
        };

        let mut files: Vec<&Path> = Vec::new();
        for issue in issues {
            if !files.contains(&issue.file_path.as_path()) {
                files.push(&issue.file_path);
            }
        }

        let mut candidates = Vec::new();
        for path in files {
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            let decision = engine.should_split(path, &content).await;
            if decision.should_split {
                eprintln!(
                    "  {} would benefit from a {} split ({})",
                    path.display(),
                    decision.strategy.label(),
                    decision.reasoning
                );
                candidates.push(path.to_path_buf());
            }
        }
        candidates
    }

    fn cap_reached(&self) -> bool {
        match self.ctx.config.max_fixes_per_run {
            Some(max) => self.ctx.fixes_applied.load(Ordering::SeqCst) >= max,
            None => false,
        }
    }

    fn summarize(
        &self,
        issues_queued: usize,
        split_candidates: Vec<PathBuf>,
        duration: Duration,
    ) -> SessionSummary {
        let stats = self.ctx.queue.stats();
        let outcomes = self
            .ctx
            .outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let distinct: HashSet<PathBuf> = outcomes
            .iter()
            .filter(|o| o.state.is_fixed())
            .map(|o| o.file_path.clone())
            .collect();
        let mut files_modified: Vec<PathBuf> = distinct.into_iter().collect();
        files_modified.sort();

        let processed = stats.completed + stats.failed + stats.skipped;
        let success_rate = if processed == 0 {
            0.0
        } else {
            stats.completed as f64 / processed as f64
        };

        SessionSummary {
            session_id: self.session_id.clone(),
            issues_queued,
            issues_processed: processed,
            issues_fixed: stats.completed,
            issues_failed: stats.failed,
            issues_skipped: stats.skipped,
            files_modified,
            split_candidates,
            success_rate,
            duration,
        }
    }
}

async fn worker_loop(ctx: Arc<PipelineContext>, worker_id: String) {
    loop {
        if let Some(max) = ctx.config.max_fixes_per_run {
            if ctx.fixes_applied.load(Ordering::SeqCst) >= max {
                return;
            }
        }

        let batch = ctx.queue.get_next_issues(MAX_BATCH_ISSUES, &worker_id, None);
        if batch.is_empty() {
            // Queued work held under another worker's file claim may come
            // back around; a fully drained queue will not.
            if ctx.queue.stats().queued == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(CLAIM_RETRY_MS)).await;
            continue;
        }

        let budget = Duration::from_secs(ctx.config.timeout_seconds);
        let outcome = match timeout(budget, ctx.orchestrator.fix_batch(&batch)).await {
            Ok(outcome) => outcome,
            Err(_) => BatchOutcome::terminal(
                &batch,
                BatchState::TimedOut,
                Some(format!("batch exceeded {}s budget", budget.as_secs())),
            ),
        };

        eprintln!(
            "  [{}] {} -> {}",
            worker_id,
            outcome.file_path.display(),
            outcome.state
        );

        match outcome.state {
            BatchState::Completed => {
                ctx.queue.mark_completed(&outcome.issue_ids);
                ctx.fixes_applied
                    .fetch_add(outcome.issue_ids.len(), Ordering::SeqCst);
            }
            BatchState::Skipped => ctx.queue.mark_skipped(&outcome.issue_ids),
            _ => ctx.queue.mark_failed(&outcome.issue_ids),
        }
        ctx.queue.release_file(&outcome.file_path, &worker_id);
        ctx.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outcome);
    }
}
