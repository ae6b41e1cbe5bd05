//! Duration patching
//!
//! Rows written before durations were tracked carry `duration_seconds == 0`. This pass
//! re-reads each affected session's transcript, finds the pairing with the same
//! `turn_index` and stores the recomputed duration when it is positive.
//!
//! The same pass migrates legacy whole-session rows whose transcript is still around into
//! per-turn rows. A legacy row that cannot be rebuilt is written back unchanged.

use crate::ledger::{Ledger, LedgerStore};
use crate::parser::{FileParser, ParsedTranscript};
use crate::reconciler::SessionSource;
use crate::segmenter::{pair_messages, Pairing, TurnSegmenter};
use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub turns_patched: usize,
    /// Legacy sessions rebuilt as per-turn rows
    pub sessions_migrated: usize,
    pub sessions_without_transcript: usize,
    pub ledger_written: bool,
}

impl PatchReport {
    pub fn has_changes(&self) -> bool {
        self.turns_patched > 0 || self.sessions_migrated > 0
    }
}

struct LoadedSession {
    transcript: ParsedTranscript,
    pairings: Vec<Pairing>,
}

type SessionCache = HashMap<String, Option<LoadedSession>>;

pub struct DurationPatcher {
    project: String,
    parser: FileParser,
}

impl DurationPatcher {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            parser: FileParser::new(),
        }
    }

    /// Patch in memory; rows of sessions missing from `sessions` are left alone
    pub fn patch(&self, ledger: &mut Ledger, sessions: &[SessionSource]) -> PatchReport {
        let sources: HashMap<&str, &SessionSource> = sessions
            .iter()
            .map(|s| (s.session_id.as_str(), s))
            .collect();
        let mut cache = SessionCache::new();
        let mut report = PatchReport::default();

        for row in ledger.rows_mut() {
            if !row.lacks_duration() {
                continue;
            }

            let duration = match (row.session_id(), row.turn_index()) {
                (Some(session_id), Some(turn_index)) => self
                    .load(&mut cache, &sources, session_id)
                    .and_then(|session| session.pairings.get(turn_index as usize))
                    .and_then(Pairing::duration_seconds)
                    .unwrap_or(0),
                _ => 0,
            };

            if duration > 0 {
                debug!(
                    session_id = row.session_id().unwrap_or_default(),
                    turn_index = row.turn_index(),
                    duration,
                    "Patched turn duration"
                );
                row.set_duration_seconds(duration);
                report.turns_patched += 1;
            }
        }

        let legacy_sessions: Vec<String> = ledger.migrated_sessions().iter().cloned().collect();
        for session_id in legacy_sessions {
            let Some(session) = self.load(&mut cache, &sources, &session_id) else {
                debug!(session_id = %session_id, "Keeping legacy row, no transcript to rebuild from");
                continue;
            };

            let segmented =
                TurnSegmenter::new(&session_id, &self.project).segment(&session.transcript);
            if segmented.pairings == 0 {
                debug!(session_id = %session_id, "Keeping legacy row, transcript has no turns");
                continue;
            }

            debug!(session_id = %session_id, turns = segmented.pairings, "Migrated legacy session");
            ledger.replace_session(&session_id, segmented.turns);
            report.sessions_migrated += 1;
        }

        report.sessions_without_transcript = cache.values().filter(|s| s.is_none()).count();
        report
    }

    /// Load, patch and persist only when a turn was patched or a session migrated
    pub fn patch_store(
        &self,
        store: &LedgerStore,
        sessions: &[SessionSource],
    ) -> Result<PatchReport> {
        let mut ledger = store.load()?;
        let mut report = self.patch(&mut ledger, sessions);

        if report.has_changes() {
            store.save(&mut ledger)?;
            report.ledger_written = true;
        }

        info!(
            patched = report.turns_patched,
            migrated = report.sessions_migrated,
            "Duration patch finished"
        );
        Ok(report)
    }

    fn load<'c>(
        &self,
        cache: &'c mut SessionCache,
        sources: &HashMap<&str, &SessionSource>,
        session_id: &str,
    ) -> Option<&'c LoadedSession> {
        cache
            .entry(session_id.to_string())
            .or_insert_with(|| {
                let source = sources.get(session_id)?;
                let transcript = self.parser.parse_transcript(&source.path);
                if !transcript.readable {
                    return None;
                }
                let pairings = pair_messages(&transcript.events);
                Some(LoadedSession {
                    transcript,
                    pairings,
                })
            })
            .as_ref()
    }
}
