//! Ledger Reconciler
//!
//! Merges freshly segmented turns into the ledger, one session at a time.
//!
//! Legacy whole-session rows are deleted up front and their sessions reprocessed regardless
//! of row counts. For each session the transcript is parsed and segmented. A session is left alone when
//! the ledger already holds at least as many rows for it as the transcript yields and it
//! was not migrated from a legacy row. Otherwise all of its rows are replaced wholesale.
//! Sessions whose transcripts cannot be read, or yield no turns, keep their existing rows.
//!
//! Degradations never surface as errors; they are tallied in [`ReconcileReport`].

use crate::ledger::{Ledger, LedgerStore};
use crate::models::TurnRecord;
use crate::parser::FileParser;
use crate::segmenter::TurnSegmenter;
use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// One session transcript to reconcile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSource {
    pub session_id: String,
    pub path: PathBuf,
}

impl SessionSource {
    pub fn new(session_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            path: path.into(),
        }
    }
}

/// Outcome and diagnostics of one reconcile run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub sessions_seen: usize,
    /// Sessions whose rows were replaced
    pub sessions_processed: usize,
    pub sessions_up_to_date: usize,
    pub sessions_without_turns: usize,
    pub unreadable_sessions: Vec<String>,
    pub skipped_lines: usize,
    pub malformed_timestamps: usize,
    pub legacy_rows_removed: usize,
    pub undecodable_ledger_rows: usize,
    /// The ledger file existed but was not a JSON array
    pub invalid_ledger: bool,
    pub ledger_written: bool,
    pub written_turns: Vec<TurnRecord>,
}

impl ReconcileReport {
    pub fn has_changes(&self) -> bool {
        !self.written_turns.is_empty()
    }

    pub fn turns_written(&self) -> usize {
        self.written_turns.len()
    }
}

pub struct Reconciler {
    project: String,
    parser: FileParser,
}

impl Reconciler {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            parser: FileParser::new(),
        }
    }

    /// Load, reconcile and, only if something changed, persist the ledger
    pub fn reconcile_store(
        &self,
        store: &LedgerStore,
        sessions: &[SessionSource],
    ) -> Result<ReconcileReport> {
        let mut ledger = store.load()?;
        let mut report = self.reconcile(&mut ledger, sessions);

        if report.has_changes() {
            store.save(&mut ledger)?;
            report.ledger_written = true;
        } else {
            debug!(path = %store.path().display(), "Ledger unchanged, not writing");
        }

        Ok(report)
    }

    /// Reconcile in memory. The ledger is re-sorted when any session was replaced.
    pub fn reconcile(&self, ledger: &mut Ledger, sessions: &[SessionSource]) -> ReconcileReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("reconcile", %run_id, project = %self.project);
        let _enter = span.enter();

        let diagnostics = ledger.diagnostics();
        let mut report = ReconcileReport {
            undecodable_ledger_rows: diagnostics.undecodable_rows,
            invalid_ledger: diagnostics.invalid_document,
            ..Default::default()
        };
        report.legacy_rows_removed = ledger.remove_legacy_rows();

        for source in sessions {
            report.sessions_seen += 1;
            self.reconcile_session(ledger, source, &mut report);
        }

        if report.has_changes() {
            ledger.sort();
        }

        info!(
            sessions = report.sessions_seen,
            processed = report.sessions_processed,
            turns = report.turns_written(),
            unreadable = report.unreadable_sessions.len(),
            skipped_lines = report.skipped_lines,
            "Reconcile finished"
        );

        report
    }

    fn reconcile_session(
        &self,
        ledger: &mut Ledger,
        source: &SessionSource,
        report: &mut ReconcileReport,
    ) {
        let session_id = source.session_id.as_str();
        let transcript = self.parser.parse_transcript(&source.path);
        report.skipped_lines += transcript.skipped_lines;

        if !transcript.readable {
            warn!(session_id, path = %source.path.display(), "Leaving unreadable session untouched");
            report.unreadable_sessions.push(source.session_id.clone());
            return;
        }

        let segmented = TurnSegmenter::new(session_id, &self.project).segment(&transcript);
        report.malformed_timestamps += segmented.malformed_timestamps;

        if segmented.turns.is_empty() {
            debug!(session_id, pairings = segmented.pairings, "No turns with token data");
            report.sessions_without_turns += 1;
            return;
        }

        let candidate = segmented.turns.len();
        let persisted = ledger.session_turn_count(session_id);
        let forced = ledger.is_migrated(session_id);

        if persisted >= candidate && !forced {
            debug!(session_id, persisted, candidate, "Session already complete");
            report.sessions_up_to_date += 1;
            return;
        }

        debug!(session_id, persisted, candidate, forced, "Replacing session turns");
        report.written_turns.extend(segmented.turns.iter().cloned());
        ledger.replace_session(session_id, segmented.turns);
        report.sessions_processed += 1;
    }
}
