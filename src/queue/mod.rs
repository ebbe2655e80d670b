//! Issue queue for Mend
//!
//! A single-process, concurrency-safe queue with per-file batch claiming.
//! All shared state lives behind one mutex so claim-then-update is atomic:
//! no issue id is ever handed to two workers, and no two workers ever hold
//! in-progress issues for the same file.

use crate::issue::{Issue, IssueStatus};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Counts per status, for progress reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queued: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.queued + self.in_progress + self.completed + self.failed + self.skipped
    }
}

#[derive(Default)]
struct QueueState {
    /// Insertion-ordered ledger of every issue this run
    issues: Vec<Issue>,
    /// Dedup index over (file, line, code)
    seen: HashSet<(PathBuf, u32, String)>,
    /// Files currently claimed, and by which worker
    file_claims: HashMap<PathBuf, String>,
    closed: bool,
}

/// Concurrency-safe issue queue with per-file batch claiming.
pub struct IssueQueueManager {
    state: Mutex<QueueState>,
}

impl IssueQueueManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        // A panic while holding this lock means the run is already lost;
        // recover the guard so remaining workers can drain.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert issues with status `Queued`, deduplicated by
    /// (file_path, line, error_code). Returns how many were accepted.
    pub fn queue_issues(&self, issues: Vec<Issue>) -> usize {
        let mut state = self.lock();
        if state.closed {
            return 0;
        }
        let mut accepted = 0;
        for mut issue in issues {
            let key = issue.dedup_key();
            if state.seen.contains(&key) {
                continue;
            }
            issue.status = IssueStatus::Queued;
            issue.worker_id = None;
            state.seen.insert(key);
            state.issues.push(issue);
            accepted += 1;
        }
        accepted
    }

    /// Atomically claim up to `limit` queued issues for one file.
    ///
    /// The claimed issues all belong to the first file (in insertion order)
    /// that has queued work and is not claimed by another worker. Claiming
    /// sets `InProgress` and records the worker; the file stays claimed
    /// until `release_file` so writes to it are strictly serialized.
    pub fn get_next_issues(
        &self,
        limit: usize,
        worker_id: &str,
        filter_types: Option<&[String]>,
    ) -> Vec<Issue> {
        let mut state = self.lock();
        if state.closed || limit == 0 {
            return Vec::new();
        }

        let matches_filter = |issue: &Issue| match filter_types {
            Some(types) => types.iter().any(|t| *t == issue.error_code),
            None => true,
        };

        // First file in insertion order with claimable work
        let target: Option<PathBuf> = state
            .issues
            .iter()
            .find(|i| {
                i.status == IssueStatus::Queued
                    && matches_filter(i)
                    && !state.file_claims.contains_key(&i.file_path)
            })
            .map(|i| i.file_path.clone());

        let Some(file) = target else {
            return Vec::new();
        };

        state.file_claims.insert(file.clone(), worker_id.to_string());

        let now = Utc::now();
        let mut claimed = Vec::new();
        for issue in state.issues.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if issue.status == IssueStatus::Queued
                && issue.file_path == file
                && matches_filter(issue)
            {
                issue.status = IssueStatus::InProgress;
                issue.worker_id = Some(worker_id.to_string());
                issue.updated_at = now;
                claimed.push(issue.clone());
            }
        }
        claimed
    }

    /// Release a worker's claim on a file so another batch can be cut.
    pub fn release_file(&self, path: &Path, worker_id: &str) {
        let mut state = self.lock();
        if state.file_claims.get(path).map(String::as_str) == Some(worker_id) {
            state.file_claims.remove(path);
        }
    }

    pub fn mark_completed(&self, ids: &[String]) {
        self.transition(ids, IssueStatus::Completed);
    }

    pub fn mark_failed(&self, ids: &[String]) {
        self.transition(ids, IssueStatus::Failed);
    }

    pub fn mark_skipped(&self, ids: &[String]) {
        self.transition(ids, IssueStatus::Skipped);
    }

    /// Terminal transitions only apply to in-progress issues; a completed
    /// or failed issue never changes again within a run.
    fn transition(&self, ids: &[String], status: IssueStatus) {
        let mut state = self.lock();
        let now = Utc::now();
        for issue in state.issues.iter_mut() {
            if issue.status == IssueStatus::InProgress && ids.iter().any(|id| *id == issue.id) {
                issue.status = status;
                issue.updated_at = now;
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock()
            .issues
            .iter()
            .filter(|i| i.status == IssueStatus::Queued)
            .count()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        let mut stats = QueueStats::default();
        for issue in &state.issues {
            match issue.status {
                IssueStatus::Queued => stats.queued += 1,
                IssueStatus::InProgress => stats.in_progress += 1,
                IssueStatus::Completed => stats.completed += 1,
                IssueStatus::Failed => stats.failed += 1,
                IssueStatus::Skipped => stats.skipped += 1,
            }
        }
        stats
    }

    /// Drain the queue: remaining queued issues are skipped, claims are
    /// dropped, and no further inserts or claims are accepted.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.file_claims.clear();
        let now = Utc::now();
        for issue in state.issues.iter_mut() {
            if issue.status == IssueStatus::Queued {
                issue.status = IssueStatus::Skipped;
                issue.updated_at = now;
            }
        }
    }
}

impl Default for IssueQueueManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(file: &str, line: u32, code: &str) -> Issue {
        Issue::new(file, line, 1, code, "finding")
    }

    #[test]
    fn test_queue_issues_dedups() {
        let queue = IssueQueueManager::new();
        let accepted = queue.queue_issues(vec![
            issue("a.py", 1, "E501"),
            issue("a.py", 1, "E501"),
            issue("a.py", 2, "E501"),
        ]);
        assert_eq!(accepted, 2);
        assert_eq!(queue.pending_count(), 2);
    }

    #[test]
    fn test_claim_returns_single_file_batch() {
        let queue = IssueQueueManager::new();
        queue.queue_issues(vec![
            issue("a.py", 1, "E501"),
            issue("b.py", 1, "F401"),
            issue("a.py", 2, "E501"),
        ]);

        let batch = queue.get_next_issues(10, "w1", None);
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|i| i.file_path == PathBuf::from("a.py")));
        assert!(batch.iter().all(|i| i.status == IssueStatus::InProgress));
        assert!(batch
            .iter()
            .all(|i| i.worker_id.as_deref() == Some("w1")));
    }

    #[test]
    fn test_second_worker_gets_different_file() {
        let queue = IssueQueueManager::new();
        queue.queue_issues(vec![
            issue("a.py", 1, "E501"),
            issue("a.py", 2, "E501"),
            issue("b.py", 1, "F401"),
        ]);

        let first = queue.get_next_issues(10, "w1", None);
        let second = queue.get_next_issues(10, "w2", None);
        assert_eq!(first[0].file_path, PathBuf::from("a.py"));
        assert_eq!(second[0].file_path, PathBuf::from("b.py"));

        // a.py is exhausted and b.py is claimed: nothing left
        assert!(queue.get_next_issues(10, "w3", None).is_empty());
    }

    #[test]
    fn test_release_file_allows_reclaim() {
        let queue = IssueQueueManager::new();
        queue.queue_issues(vec![issue("a.py", 1, "E501"), issue("a.py", 2, "E501")]);

        let batch = queue.get_next_issues(1, "w1", None);
        assert_eq!(batch.len(), 1);
        // Still claimed by w1, so w2 sees nothing
        assert!(queue.get_next_issues(10, "w2", None).is_empty());

        queue.release_file(Path::new("a.py"), "w1");
        let batch = queue.get_next_issues(10, "w2", None);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_filter_types_limits_claims() {
        let queue = IssueQueueManager::new();
        queue.queue_issues(vec![issue("a.py", 1, "E501"), issue("a.py", 2, "F401")]);

        let batch = queue.get_next_issues(10, "w1", Some(&["F401".to_string()]));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].error_code, "F401");
    }

    #[test]
    fn test_terminal_transitions_stick() {
        let queue = IssueQueueManager::new();
        queue.queue_issues(vec![issue("a.py", 1, "E501")]);
        let batch = queue.get_next_issues(10, "w1", None);
        let ids: Vec<String> = batch.iter().map(|i| i.id.clone()).collect();

        queue.mark_completed(&ids);
        // A second transition must not move it out of Completed
        queue.mark_failed(&ids);

        let stats = queue.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn test_close_skips_remaining() {
        let queue = IssueQueueManager::new();
        queue.queue_issues(vec![issue("a.py", 1, "E501"), issue("b.py", 1, "E501")]);
        queue.close();
        let stats = queue.stats();
        assert_eq!(stats.skipped, 2);
        assert!(queue.get_next_issues(10, "w1", None).is_empty());
        assert_eq!(queue.queue_issues(vec![issue("c.py", 1, "E1")]), 0);
    }

    #[test]
    fn test_mixed_codes_on_one_file_claim_together() {
        // 3 issues for one file with codes {E501, E501, F401}; claiming
        // with limit=10 returns all 3, all in progress, one worker.
        let queue = IssueQueueManager::new();
        queue.queue_issues(vec![
            issue("a.py", 1, "E501"),
            issue("a.py", 2, "E501"),
            issue("a.py", 3, "F401"),
        ]);

        let batch = queue.get_next_issues(10, "w1", None);
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|i| i.status == IssueStatus::InProgress));
        assert!(batch
            .iter()
            .all(|i| i.worker_id.as_deref() == Some("w1")));
    }
}
