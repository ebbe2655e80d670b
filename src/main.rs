//! Mend CLI
//!
//! Reads a JSON report of lint findings, runs the fix pipeline over the
//! affected files, and prints a session summary.

use anyhow::{Context, Result};
use clap::Parser;
use mend::analysis::complexity::ComplexityAnalyzer;
use mend::config::Config;
use mend::fix::{FixOrchestrator, ModelFallbackSequencer};
use mend::issue::Issue;
use mend::llm::{client, LlmClient, OpenRouterClient};
use mend::persist::{AtomicFilePersistence, BackupStore, Session};
use mend::pipeline::{FixPipeline, SessionSummary};
use mend::queue::IssueQueueManager;
use mend::split::SplitDecisionEngine;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "mend",
    about = "AI-assisted lint fixing with validation and rollback",
    version
)]
struct Args {
    /// JSON file of findings: [{file_path, line, column, error_code, message}, ...]
    issues: PathBuf,

    /// Config file (defaults to ~/.config/mend/config.json, then defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop after this many issues have been fixed
    #[arg(long)]
    max_fixes: Option<usize>,

    /// Skip pre-mutation backups (fixes become unrecoverable)
    #[arg(long)]
    no_backups: bool,
}

/// One finding as emitted by the external detector.
#[derive(Debug, Deserialize)]
struct Finding {
    file_path: PathBuf,
    line: u32,
    #[serde(default = "default_column")]
    column: u32,
    error_code: String,
    message: String,
}

fn default_column() -> u32 {
    1
}

fn load_findings(path: &PathBuf) -> Result<Vec<Issue>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let findings: Vec<Finding> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse findings in {}", path.display()))?;
    Ok(findings
        .into_iter()
        .map(|f| Issue::new(f.file_path, f.line, f.column, f.error_code, f.message))
        .collect())
}

fn print_summary(summary: &SessionSummary) {
    eprintln!();
    eprintln!("  Session {}", summary.session_id);
    eprintln!(
        "  {} queued, {} processed in {:.1}s",
        summary.issues_queued,
        summary.issues_processed,
        summary.duration.as_secs_f64()
    );
    eprintln!(
        "  {} fixed, {} failed, {} skipped ({} files modified)",
        summary.issues_fixed,
        summary.issues_failed,
        summary.issues_skipped,
        summary.files_modified.len()
    );
    for path in &summary.files_modified {
        eprintln!("    modified {}", path.display());
    }
    if !summary.split_candidates.is_empty() {
        eprintln!(
            "  {} file(s) flagged as worth splitting:",
            summary.split_candidates.len()
        );
        for path in &summary.split_candidates {
            eprintln!("    {}", path.display());
        }
    }
    eprintln!("  Success rate: {:.0}%", summary.success_rate * 100.0);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(workers) = args.workers {
        config.max_workers = workers.max(1);
    }
    if args.max_fixes.is_some() {
        config.max_fixes_per_run = args.max_fixes;
    }
    if args.no_backups {
        config.create_backups = false;
    }

    if !client::is_available() {
        anyhow::bail!("No API key configured. Set OPENROUTER_API_KEY to enable fixes.");
    }

    let issues = load_findings(&args.issues)?;
    if issues.is_empty() {
        eprintln!("  Nothing to fix.");
        return Ok(());
    }

    let session = Session::new();
    let config = Arc::new(config);
    let store = Arc::new(BackupStore::new());
    let llm: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::new());
    let orchestrator = Arc::new(FixOrchestrator::new(
        llm.clone(),
        Arc::new(ModelFallbackSequencer::new()),
        Arc::new(AtomicFilePersistence::new(store)),
        session.session_id.clone(),
        config.create_backups,
        config.max_fix_file_chars,
    ));
    let splits = Arc::new(SplitDecisionEngine::new(
        Arc::new(ComplexityAnalyzer::new()),
        Some(llm),
        config.clone(),
    ));
    let pipeline = FixPipeline::new(
        Arc::new(IssueQueueManager::new()),
        orchestrator,
        config,
        session.session_id.clone(),
    )
    .with_split_engine(splits);

    let summary = pipeline.run(issues).await;
    print_summary(&summary);

    if summary.issues_processed > 0 && summary.issues_fixed == 0 {
        std::process::exit(1);
    }
    Ok(())
}
