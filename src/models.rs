//! Core Data Models
//!
//! This module defines the data structures that flow through the ledger pipeline, from raw
//! transcript lines to the rows persisted in `tokens.json`.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`TranscriptLine`] - One JSON object per line of a session transcript
//! 2. **Events**: [`MessageEvent`] and [`UsageData`] - What the parser keeps from each line
//! 3. **Turns**: [`TurnRecord`] - One human/assistant exchange with tokens, cost and duration
//! 4. **Ledger rows**: [`LedgerRow`] - A decoded ledger element, either per-turn or legacy
//!
//! ## Schema Evolution
//!
//! Older ledgers stored one aggregate row per session. Such rows have no `turn_index` and
//! decode to [`LedgerRow::Legacy`] in the single load pass, so nothing downstream ever
//! branches on field presence. Per-turn rows already on disk decode to
//! [`LedgerRow::Stored`] and are written back untouched unless their session is rebuilt.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single line of a Claude Code session transcript.
///
/// Only the fields the ledger needs are modelled; everything else is ignored. The scalar
/// fields are read loosely so one odd value never costs the line its usage record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptLine {
    #[serde(rename = "type", default)]
    pub entry_type: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(rename = "isSidechain", default)]
    pub is_sidechain: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl TranscriptLine {
    pub fn entry_type(&self) -> Option<&str> {
        self.entry_type.as_ref().and_then(Value::as_str)
    }

    /// Timestamp when it is a non-empty string.
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp
            .as_ref()
            .and_then(Value::as_str)
            .filter(|ts| !ts.is_empty())
    }

    pub fn is_sidechain(&self) -> bool {
        self.is_sidechain
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The embedded message when it is an object with `role == "assistant"`.
    pub fn assistant_message(&self) -> Option<AssistantMessage> {
        let message = self.message.as_ref()?.as_object()?;
        if message.get("role").and_then(Value::as_str) != Some("assistant") {
            return None;
        }
        serde_json::from_value(Value::Object(message.clone())).ok()
    }
}

/// The parts of an assistant `message` object the ledger cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Map<String, Value>>,
}

impl AssistantMessage {
    /// Usage declared by this message. An empty usage object declares nothing.
    pub fn declared_usage(&self) -> Option<UsageData> {
        let usage = self.usage.as_ref().filter(|u| !u.is_empty())?;
        Some(UsageData::from_map(usage))
    }
}

/// Token counts reported for a single assistant reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageData {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl UsageData {
    /// Build from a raw usage object; missing, null or non-integer counts read as 0.
    pub fn from_map(usage: &Map<String, Value>) -> Self {
        let count = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
        Self {
            input_tokens: count("input_tokens"),
            output_tokens: count("output_tokens"),
            cache_creation_input_tokens: count("cache_creation_input_tokens"),
            cache_read_input_tokens: count("cache_read_input_tokens"),
        }
    }

    /// Sum of all four counts, saturating at `u64::MAX`.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_creation_input_tokens)
            .saturating_add(self.cache_read_input_tokens)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    HumanTurnStart,
    AssistantReply,
}

/// A primary-branch message with a timestamp, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub kind: EventKind,
    pub timestamp: String,
}

impl MessageEvent {
    pub fn human(timestamp: impl Into<String>) -> Self {
        Self {
            kind: EventKind::HumanTurnStart,
            timestamp: timestamp.into(),
        }
    }

    pub fn assistant(timestamp: impl Into<String>) -> Self {
        Self {
            kind: EventKind::AssistantReply,
            timestamp: timestamp.into(),
        }
    }
}

/// One persisted ledger row. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub session_id: String,
    pub turn_index: u64,
    #[serde(default)]
    pub turn_timestamp: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub estimated_cost_usd: f64,
    #[serde(default = "unknown_model")]
    pub model: String,
    #[serde(default)]
    pub duration_seconds: u64,
}

fn unknown_model() -> String {
    UNKNOWN_MODEL.to_string()
}

/// Model reported when a transcript never names one.
pub const UNKNOWN_MODEL: &str = "unknown";

impl TurnRecord {
    /// Canonical ledger ordering key: (date, session_id, turn_index).
    pub fn sort_key(&self) -> (&str, &str, u64) {
        (
            self.date.as_deref().unwrap_or(""),
            self.session_id.as_str(),
            self.turn_index,
        )
    }
}

/// A per-turn row read back from disk, kept verbatim.
///
/// Only the keys the ledger orders and counts by are decoded. Everything else, including
/// fields this crate does not know about, is written back exactly as it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTurn {
    pub session_id: String,
    pub turn_index: u64,
    pub fields: Map<String, Value>,
}

impl StoredTurn {
    pub fn date(&self) -> Option<&str> {
        self.fields.get("date").and_then(Value::as_str)
    }

    /// Missing, null or numeric zero all mean no duration was recorded.
    pub fn lacks_duration(&self) -> bool {
        match self.fields.get("duration_seconds") {
            None | Some(Value::Null) => true,
            Some(value) => value.as_f64() == Some(0.0),
        }
    }
}

impl Serialize for StoredTurn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// A pre-migration whole-session row.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRecord {
    pub session_id: Option<String>,
    pub fields: Map<String, Value>,
}

impl Serialize for LegacyRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// A ledger element.
///
/// [`LedgerRow::decode`] only ever yields `Stored` or `Legacy`; `Turn` rows are built from
/// transcripts during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LedgerRow {
    Turn(TurnRecord),
    Stored(StoredTurn),
    Legacy(LegacyRecord),
}

impl LedgerRow {
    /// Decode a raw ledger element. `None` means the element is not usable at all.
    pub fn decode(value: Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };

        let session_id = match fields.get("session_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => return None,
        };

        match fields.get("turn_index").map(Value::as_u64) {
            None => Some(LedgerRow::Legacy(LegacyRecord { session_id, fields })),
            Some(None) => None,
            Some(Some(turn_index)) => Some(LedgerRow::Stored(StoredTurn {
                session_id: session_id.unwrap_or_default(),
                turn_index,
                fields,
            })),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            LedgerRow::Turn(turn) => Some(&turn.session_id),
            LedgerRow::Stored(stored) => Some(&stored.session_id),
            LedgerRow::Legacy(legacy) => legacy.session_id.as_deref(),
        }
    }

    /// `None` for legacy rows
    pub fn turn_index(&self) -> Option<u64> {
        match self {
            LedgerRow::Turn(turn) => Some(turn.turn_index),
            LedgerRow::Stored(stored) => Some(stored.turn_index),
            LedgerRow::Legacy(_) => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, LedgerRow::Legacy(_))
    }

    /// Canonical ledger ordering key: (date, session_id, turn_index).
    pub fn sort_key(&self) -> (&str, &str, u64) {
        match self {
            LedgerRow::Turn(turn) => turn.sort_key(),
            LedgerRow::Stored(stored) => (
                stored.date().unwrap_or(""),
                stored.session_id.as_str(),
                stored.turn_index,
            ),
            LedgerRow::Legacy(legacy) => (
                legacy.fields.get("date").and_then(Value::as_str).unwrap_or(""),
                legacy.session_id.as_deref().unwrap_or(""),
                0,
            ),
        }
    }

    /// Recorded duration, when it is a whole number of seconds
    pub fn duration_seconds(&self) -> Option<u64> {
        match self {
            LedgerRow::Turn(turn) => Some(turn.duration_seconds),
            LedgerRow::Stored(stored) => stored.fields.get("duration_seconds")?.as_u64(),
            LedgerRow::Legacy(_) => None,
        }
    }

    /// Per-turn row with no duration recorded yet
    pub fn lacks_duration(&self) -> bool {
        match self {
            LedgerRow::Turn(turn) => turn.duration_seconds == 0,
            LedgerRow::Stored(stored) => stored.lacks_duration(),
            LedgerRow::Legacy(_) => false,
        }
    }

    pub fn set_duration_seconds(&mut self, seconds: u64) {
        match self {
            LedgerRow::Turn(turn) => turn.duration_seconds = seconds,
            LedgerRow::Stored(stored) => {
                stored
                    .fields
                    .insert("duration_seconds".to_string(), Value::from(seconds));
            }
            LedgerRow::Legacy(_) => {}
        }
    }
}
