//! Turn Segmenter
//!
//! Pairs each human message with the nearest following assistant reply and turns every
//! pairing into a ledger row.
//!
//! Usage records are matched to pairings strictly by position: the n-th pairing takes the
//! n-th usage record. Every pairing reserves a `turn_index`, including pairings whose usage
//! is empty; those produce no row, so indices stay stable as a transcript grows.

use crate::models::*;
use crate::parser::ParsedTranscript;
use crate::pricing::PricingManager;
use crate::timestamp_parser::TimestampParser;

/// A human message and the assistant reply that closes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub turn_index: u64,
    pub human_timestamp: String,
    pub assistant_timestamp: String,
}

impl Pairing {
    /// Reply time minus human time, floored at 0. `None` if either timestamp is unparseable.
    pub fn duration_seconds(&self) -> Option<u64> {
        TimestampParser::clamped_seconds_between(&self.human_timestamp, &self.assistant_timestamp)
    }
}

/// Pair message events in order.
///
/// A human event is closed by the next assistant event; intervening human events are
/// absorbed. A trailing human event with no reply produces no pairing.
pub fn pair_messages(events: &[MessageEvent]) -> Vec<Pairing> {
    let mut pairings = Vec::new();
    let mut i = 0;

    while i < events.len() {
        if events[i].kind != EventKind::HumanTurnStart {
            i += 1;
            continue;
        }

        let reply = events[i + 1..]
            .iter()
            .position(|e| e.kind == EventKind::AssistantReply)
            .map(|offset| i + 1 + offset);

        let Some(j) = reply else {
            break;
        };

        pairings.push(Pairing {
            turn_index: pairings.len() as u64,
            human_timestamp: events[i].timestamp.clone(),
            assistant_timestamp: events[j].timestamp.clone(),
        });
        i = j + 1;
    }

    pairings
}

/// Turns produced from one transcript
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentedSession {
    /// Rows with non-zero token totals, in turn order
    pub turns: Vec<TurnRecord>,
    /// Number of pairings, i.e. turn indices reserved
    pub pairings: usize,
    /// Timestamps that failed to parse while building rows
    pub malformed_timestamps: usize,
}

/// Builds [`TurnRecord`]s for one session
pub struct TurnSegmenter<'a> {
    session_id: &'a str,
    project: &'a str,
}

impl<'a> TurnSegmenter<'a> {
    pub fn new(session_id: &'a str, project: &'a str) -> Self {
        Self {
            session_id,
            project,
        }
    }

    pub fn segment(&self, transcript: &ParsedTranscript) -> SegmentedSession {
        let session_date = transcript
            .first_timestamp
            .as_deref()
            .and_then(TimestampParser::date_of);

        let pairings = pair_messages(&transcript.events);
        let mut usages = transcript.usages.iter();
        let mut session = SegmentedSession {
            pairings: pairings.len(),
            ..Default::default()
        };

        for pairing in &pairings {
            let usage = usages.next().copied().unwrap_or_default();
            let total_tokens = usage.total_tokens();
            if total_tokens == 0 {
                continue;
            }

            let duration = pairing.duration_seconds();
            let normalized = TimestampParser::normalize(&pairing.human_timestamp);
            if normalized.is_none() {
                session.malformed_timestamps += 1;
            }
            if TimestampParser::parse(&pairing.assistant_timestamp).is_err() {
                session.malformed_timestamps += 1;
            }

            let date = TimestampParser::date_of(&pairing.human_timestamp)
                .or_else(|| session_date.clone());

            session.turns.push(TurnRecord {
                date,
                project: self.project.to_string(),
                session_id: self.session_id.to_string(),
                turn_index: pairing.turn_index,
                turn_timestamp: normalized.unwrap_or_else(|| pairing.human_timestamp.clone()),
                input_tokens: usage.input_tokens,
                cache_creation_tokens: usage.cache_creation_input_tokens,
                cache_read_tokens: usage.cache_read_input_tokens,
                output_tokens: usage.output_tokens,
                total_tokens,
                estimated_cost_usd: PricingManager::calculate_cost_from_tokens(
                    &usage,
                    &transcript.model,
                ),
                model: transcript.model.clone(),
                duration_seconds: duration.unwrap_or(0),
            });
        }

        session
    }
}
