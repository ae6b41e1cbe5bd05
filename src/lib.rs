//! Token Ledger Library
//!
//! Turns Claude Code session transcripts (append-only JSONL logs) into a durable per-turn
//! ledger of token usage, estimated cost and response time.
//!
//! ## Pipeline
//!
//! 1. [`parser`] - reads one transcript into message events and usage records, skipping
//!    malformed lines
//! 2. [`segmenter`] - pairs each human message with the next assistant reply and builds a
//!    [`TurnRecord`] per pairing with token data
//! 3. [`reconciler`] - merges each session's turns into the [`ledger::Ledger`], replacing a
//!    session wholesale whenever it needs reprocessing
//! 4. [`ledger`] - decodes, sorts and atomically persists the ledger file, writing rows it
//!    did not rebuild back verbatim
//!
//! [`backfill`] runs the whole pipeline for a project root; [`durations`] fills in
//! response times for rows recorded without them and migrates legacy session rows.
//!
//! ## Example
//!
//! ```no_run
//! use token_ledger::backfill::{Backfill, BackfillOutcome};
//! use token_ledger::config::Config;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! match Backfill::new(&config).run(Path::new("/work/my-app"))? {
//!     BackfillOutcome::NoTranscripts { .. } => println!("nothing to do"),
//!     BackfillOutcome::Completed(report) => println!("{} turns written", report.turns_written()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod backfill;
pub mod config;
pub mod durations;
pub mod file_discovery;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod parser;
pub mod pricing;
pub mod reconciler;
pub mod segmenter;
pub mod session_utils;
pub mod timestamp_parser;

pub use ledger::{Ledger, LedgerStore};
pub use models::*;
pub use reconciler::{ReconcileReport, Reconciler, SessionSource};
