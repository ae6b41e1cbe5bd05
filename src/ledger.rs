//! Persistent Turn Ledger
//!
//! The ledger is a single JSON array of per-turn rows, kept sorted by
//! `(date, session_id, turn_index)` and holding at most one row per
//! `(session_id, turn_index)`.
//!
//! ## Loading
//!
//! Every element is decoded into a [`LedgerRow`] in one pass. Rows already on disk are kept
//! verbatim; only sessions that get rebuilt are rewritten. Legacy whole-session rows mark
//! their session as needing a full reprocess. A document that is not a JSON array loads as
//! an empty ledger, so the next run rebuilds it from transcripts.
//!
//! ## Saving
//!
//! [`LedgerStore::save`] writes a sibling temporary file and renames it over the target,
//! so a reader never sees a half-written ledger.

use crate::models::*;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened while decoding a ledger document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadDiagnostics {
    /// The document was present but not a JSON array
    pub invalid_document: bool,
    pub undecodable_rows: usize,
    pub legacy_rows: usize,
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
    migrated_sessions: BTreeSet<String>,
    diagnostics: LoadDiagnostics,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from decoded rows, dropping repeated turn keys
    pub fn from_rows(rows: impl IntoIterator<Item = LedgerRow>) -> Self {
        let mut ledger = Self::new();
        let mut seen: HashSet<(String, u64)> = HashSet::new();

        for row in rows {
            match (row.session_id(), row.turn_index()) {
                (session_id, None) => {
                    ledger.diagnostics.legacy_rows += 1;
                    if let Some(session_id) = session_id {
                        ledger.migrated_sessions.insert(session_id.to_string());
                    }
                }
                (session_id, Some(turn_index)) => {
                    let key = (session_id.unwrap_or_default().to_string(), turn_index);
                    if !seen.insert(key) {
                        ledger.diagnostics.duplicate_rows += 1;
                        continue;
                    }
                }
            }
            ledger.rows.push(row);
        }

        ledger
    }

    /// Decode a ledger document. Never fails; see [`LoadDiagnostics`].
    pub fn from_json(text: &str) -> Self {
        let elements = match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(elements)) => elements,
            _ => {
                return Self {
                    diagnostics: LoadDiagnostics {
                        invalid_document: true,
                        ..Default::default()
                    },
                    ..Self::default()
                };
            }
        };

        let total = elements.len();
        let rows: Vec<LedgerRow> = elements.into_iter().filter_map(LedgerRow::decode).collect();
        let undecodable_rows = total - rows.len();

        let mut ledger = Self::from_rows(rows);
        ledger.diagnostics.undecodable_rows = undecodable_rows;
        ledger
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [LedgerRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn diagnostics(&self) -> &LoadDiagnostics {
        &self.diagnostics
    }

    /// Sessions that had legacy rows at load and have not been rebuilt since
    pub fn migrated_sessions(&self) -> &BTreeSet<String> {
        &self.migrated_sessions
    }

    pub fn is_migrated(&self, session_id: &str) -> bool {
        self.migrated_sessions.contains(session_id)
    }

    /// Per-turn rows held for the session; legacy rows do not count
    pub fn session_turn_count(&self, session_id: &str) -> usize {
        self.rows
            .iter()
            .filter(|row| !row.is_legacy() && row.session_id() == Some(session_id))
            .count()
    }

    /// Delete every legacy row, returning how many there were.
    /// Their sessions stay flagged for a forced reprocess.
    pub fn remove_legacy_rows(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !row.is_legacy());
        before - self.rows.len()
    }

    /// Drop every row of the session, legacy included, and insert `turns` in their place.
    /// A migrated session counts as migrated only until its first replacement.
    pub fn replace_session(&mut self, session_id: &str, turns: Vec<TurnRecord>) {
        self.rows.retain(|row| row.session_id() != Some(session_id));
        self.rows.extend(turns.into_iter().map(LedgerRow::Turn));
        self.migrated_sessions.remove(session_id);
    }

    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    /// Pretty JSON array with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut text =
            serde_json::to_string_pretty(&self.rows).context("Failed to serialize ledger")?;
        text.push('\n');
        Ok(text)
    }
}

/// Reads and writes the ledger file
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger; a missing file is an empty ledger
    pub fn load(&self) -> Result<Ledger> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No ledger yet, starting empty");
                return Ok(Ledger::new());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read ledger: {}", self.path.display())
                });
            }
        };

        let ledger = Ledger::from_json(&text);
        let diagnostics = ledger.diagnostics();
        if diagnostics.invalid_document {
            warn!(path = %self.path.display(), "Ledger is not a JSON array, rebuilding from transcripts");
        }
        if diagnostics.undecodable_rows > 0 || diagnostics.duplicate_rows > 0 {
            warn!(
                undecodable_rows = diagnostics.undecodable_rows,
                duplicate_rows = diagnostics.duplicate_rows,
                "Dropped unusable ledger rows"
            );
        }
        if diagnostics.legacy_rows > 0 {
            info!(
                legacy_rows = diagnostics.legacy_rows,
                sessions = ledger.migrated_sessions().len(),
                "Ledger holds legacy session rows"
            );
        }

        Ok(ledger)
    }

    /// Sort the ledger and atomically replace the file
    pub fn save(&self, ledger: &mut Ledger) -> Result<()> {
        ledger.sort();
        let text = ledger.to_json()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create tracking directory: {}", parent.display())
            })?;
        }

        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(text.as_bytes())
                .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
            file.sync_all()
                .with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
        }
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace ledger: {}", self.path.display()))?;

        info!(path = %self.path.display(), rows = ledger.len(), "Ledger written");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
