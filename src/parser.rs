//! Transcript Parser
//!
//! Reads one append-only session transcript and keeps, in file order, the primary-branch
//! message events, the usage records declared by assistant messages, the last model seen
//! and the first timestamp in the file.
//!
//! Transcripts can be truncated mid-line by a concurrent writer, so a line that does not
//! decode is skipped and counted rather than treated as an error.

use crate::models::*;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Visitor over the decoded lines of a JSONL file
pub trait JsonlProcessor {
    type Output;

    fn process_entry(&mut self, entry: TranscriptLine, line_number: usize) -> Result<()>;

    /// Called for a non-blank line that is not a JSON object
    fn skip_line(&mut self, _line_number: usize) {}

    fn finalize(self) -> Result<Self::Output>;
}

/// Everything the segmenter needs from one transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTranscript {
    pub events: Vec<MessageEvent>,
    pub usages: Vec<UsageData>,
    pub model: String,
    pub first_timestamp: Option<String>,
    pub skipped_lines: usize,
    /// False when the file could not be opened or read
    pub readable: bool,
}

impl ParsedTranscript {
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            usages: Vec::new(),
            model: UNKNOWN_MODEL.to_string(),
            first_timestamp: None,
            skipped_lines: 0,
            readable: true,
        }
    }

    fn unreadable() -> Self {
        Self {
            readable: false,
            ..Self::empty()
        }
    }
}

/// Collects a [`ParsedTranscript`] line by line
pub struct TranscriptCollector {
    transcript: ParsedTranscript,
}

impl Default for TranscriptCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptCollector {
    pub fn new() -> Self {
        Self {
            transcript: ParsedTranscript::empty(),
        }
    }
}

impl JsonlProcessor for TranscriptCollector {
    type Output = ParsedTranscript;

    fn process_entry(&mut self, entry: TranscriptLine, _line_number: usize) -> Result<()> {
        let transcript = &mut self.transcript;
        let timestamp = entry.timestamp();

        if transcript.first_timestamp.is_none() {
            transcript.first_timestamp = timestamp.map(str::to_string);
        }

        if let Some(ts) = timestamp.filter(|_| !entry.is_sidechain()) {
            match entry.entry_type() {
                Some("user") => transcript.events.push(MessageEvent::human(ts)),
                Some("assistant") => transcript.events.push(MessageEvent::assistant(ts)),
                _ => {}
            }
        }

        if let Some(message) = entry.assistant_message() {
            if let Some(usage) = message.declared_usage() {
                transcript.usages.push(usage);
            }
            if let Some(model) = message.model.filter(|m| !m.is_empty()) {
                transcript.model = model;
            }
        }

        Ok(())
    }

    fn skip_line(&mut self, line_number: usize) {
        trace!(line_number, "Skipping malformed transcript line");
        self.transcript.skipped_lines += 1;
    }

    fn finalize(self) -> Result<Self::Output> {
        Ok(self.transcript)
    }
}

pub struct FileParser {}

impl Default for FileParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FileParser {
    pub fn new() -> Self {
        Self {}
    }

    /// Parse a transcript, degrading to an empty result when the file cannot be read
    pub fn parse_transcript(&self, file_path: &Path) -> ParsedTranscript {
        match self.try_parse_transcript(file_path) {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "Unreadable transcript");
                ParsedTranscript::unreadable()
            }
        }
    }

    pub fn try_parse_transcript(&self, file_path: &Path) -> Result<ParsedTranscript> {
        let transcript = self.process_jsonl_file(file_path, TranscriptCollector::new())?;
        debug!(
            path = %file_path.display(),
            events = transcript.events.len(),
            usages = transcript.usages.len(),
            skipped_lines = transcript.skipped_lines,
            "Parsed transcript"
        );
        Ok(transcript)
    }

    // Generic method that accepts any processor
    pub fn process_jsonl_file<P: JsonlProcessor>(
        &self,
        file_path: &Path,
        mut processor: P,
    ) -> Result<P::Output> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open transcript: {}", file_path.display()))?;
        let reader = BufReader::new(file);

        for (index, raw) in reader.split(b'\n').enumerate() {
            let line_number = index + 1;
            let raw = raw
                .with_context(|| format!("Failed to read transcript: {}", file_path.display()))?;

            let Ok(line) = std::str::from_utf8(&raw) else {
                processor.skip_line(line_number);
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<TranscriptLine>(line) {
                Ok(entry) => processor.process_entry(entry, line_number)?,
                Err(_) => processor.skip_line(line_number),
            }
        }

        processor.finalize()
    }
}
