//! Project backfill
//!
//! Ties discovery, the ledger store and the reconciler together for one project root:
//! transcripts are read from `<claude_home>/projects/<slug>` and the ledger lives at
//! `<project_root>/<tracking_dir>/<file_name>`.

use crate::config::Config;
use crate::durations::{DurationPatcher, PatchReport};
use crate::file_discovery::FileDiscovery;
use crate::ledger::LedgerStore;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::session_utils::SessionUtils;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Result of a run; a missing transcript directory is a normal state, not an error
#[derive(Debug)]
pub enum BackfillOutcome<R> {
    NoTranscripts { dir: PathBuf },
    Completed(R),
}

pub struct Backfill<'a> {
    config: &'a Config,
}

impl<'a> Backfill<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Reconcile every transcript of the project into its ledger
    pub fn run(&self, project_root: &Path) -> Result<BackfillOutcome<ReconcileReport>> {
        let project_root = absolute_root(project_root)?;
        let discovery = FileDiscovery::new(&self.config.paths.claude_home);
        let transcripts_dir = discovery.transcripts_dir(&project_root);

        if !transcripts_dir.is_dir() {
            info!(dir = %transcripts_dir.display(), "No transcript directory, nothing to backfill");
            return Ok(BackfillOutcome::NoTranscripts {
                dir: transcripts_dir,
            });
        }

        let sessions = discovery.find_session_files(&transcripts_dir)?;
        let store = LedgerStore::new(self.config.ledger_path(&project_root));
        let reconciler = Reconciler::new(SessionUtils::project_name(&project_root));

        let report = reconciler.reconcile_store(&store, &sessions)?;
        Ok(BackfillOutcome::Completed(report))
    }

    /// Fill in zero durations from the project's transcripts
    pub fn patch_durations(&self, project_root: &Path) -> Result<BackfillOutcome<PatchReport>> {
        let project_root = absolute_root(project_root)?;
        let discovery = FileDiscovery::new(&self.config.paths.claude_home);
        let transcripts_dir = discovery.transcripts_dir(&project_root);

        if !transcripts_dir.is_dir() {
            return Ok(BackfillOutcome::NoTranscripts {
                dir: transcripts_dir,
            });
        }

        let sessions = discovery.find_session_files(&transcripts_dir)?;
        let store = LedgerStore::new(self.config.ledger_path(&project_root));

        let patcher = DurationPatcher::new(SessionUtils::project_name(&project_root));
        let report = patcher.patch_store(&store, &sessions)?;
        Ok(BackfillOutcome::Completed(report))
    }
}

/// Canonical path when the root exists, otherwise made absolute against the cwd
fn absolute_root(project_root: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = project_root.canonicalize() {
        return Ok(canonical);
    }
    if project_root.is_absolute() {
        return Ok(project_root.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    Ok(cwd.join(project_root))
}
