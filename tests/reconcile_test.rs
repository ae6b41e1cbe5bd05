//! End-to-end reconcile behaviour over a fake Claude home and project root

use std::collections::HashSet;
use token_ledger::backfill::{Backfill, BackfillOutcome};
use token_ledger::reconciler::ReconcileReport;

mod common;
use common::{ProjectFixture, TranscriptBuilder};

fn run(fixture: &ProjectFixture) -> anyhow::Result<ReconcileReport> {
    match Backfill::new(&fixture.config).run(&fixture.project_root())? {
        BackfillOutcome::Completed(report) => Ok(report),
        BackfillOutcome::NoTranscripts { dir } => {
            anyhow::bail!("expected transcripts under {}", dir.display())
        }
    }
}

fn keys(rows: &[serde_json::Value]) -> Vec<(String, u64)> {
    rows.iter()
        .map(|r| {
            (
                r["session_id"].as_str().unwrap_or_default().to_string(),
                r["turn_index"].as_u64().unwrap_or(u64::MAX),
            )
        })
        .collect()
}

#[test]
fn test_second_run_is_a_no_op() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("aaa", &TranscriptBuilder::new().turns("2025-03-01", 3).build())?;
    fixture.write_session("bbb", &TranscriptBuilder::new().turns("2025-03-02", 2).build())?;

    let first = run(&fixture)?;
    assert!(first.ledger_written);
    assert_eq!(first.sessions_processed, 2);
    assert_eq!(first.turns_written(), 5);
    let before = fixture.read_ledger()?;

    let second = run(&fixture)?;
    assert!(!second.ledger_written);
    assert_eq!(second.turns_written(), 0);
    assert_eq!(second.sessions_up_to_date, 2);
    assert_eq!(fixture.read_ledger()?, before);
    Ok(())
}

#[test]
fn test_turn_indices_contiguous_and_unique() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("s1", &TranscriptBuilder::new().turns("2025-03-01", 4).build())?;
    run(&fixture)?;

    let rows = fixture.ledger_rows()?;
    let keys = keys(&rows);
    let indices: Vec<u64> = keys.iter().map(|(_, i)| *i).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);

    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len());
    Ok(())
}

#[test]
fn test_grown_transcript_appends_turns() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("s1", &TranscriptBuilder::new().turns("2025-03-01", 2).build())?;
    run(&fixture)?;
    let before = fixture.ledger_rows()?;

    fixture.write_session("s1", &TranscriptBuilder::new().turns("2025-03-01", 4).build())?;
    let report = run(&fixture)?;
    assert_eq!(report.sessions_processed, 1);
    assert_eq!(report.turns_written(), 4);

    let after = fixture.ledger_rows()?;
    assert_eq!(after.len(), 4);
    assert_eq!(&after[..2], &before[..]);
    Ok(())
}

#[test]
fn test_legacy_row_replaced_by_per_turn_rows() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("legacy", &TranscriptBuilder::new().turns("2025-03-01", 3).build())?;
    fixture.write_ledger(
        r#"[
  {
    "date": "2025-03-01",
    "project": "demo",
    "session_id": "legacy",
    "input_tokens": 303,
    "output_tokens": 30,
    "total_tokens": 333,
    "estimated_cost_usd": 0.0014,
    "model": "claude-sonnet-4-20250514"
  }
]
"#,
    )?;

    let report = run(&fixture)?;
    assert_eq!(report.legacy_rows_removed, 1);

    let rows = fixture.ledger_rows()?;
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.get("turn_index").is_some()));
    assert_eq!(
        keys(&rows),
        vec![
            ("legacy".to_string(), 0),
            ("legacy".to_string(), 1),
            ("legacy".to_string(), 2)
        ]
    );
    Ok(())
}

#[test]
fn test_zero_token_turn_keeps_its_index() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    let transcript = TranscriptBuilder::new()
        .human("2025-03-01T09:00:00Z")
        .assistant_zero_usage("2025-03-01T09:00:03Z")
        .human("2025-03-01T09:01:00Z")
        .assistant("2025-03-01T09:01:03Z", "claude-sonnet-4-20250514", 50, 5)
        .build();
    fixture.write_session("s1", &transcript)?;

    run(&fixture)?;
    let rows = fixture.ledger_rows()?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["turn_index"], 1);
    assert_eq!(rows[0]["total_tokens"], 55);
    Ok(())
}

#[test]
fn test_premium_and_standard_costs() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session(
        "opus",
        &TranscriptBuilder::new()
            .human("2025-03-01T09:00:00Z")
            .assistant("2025-03-01T09:00:03Z", "claude-opus-4-20250514", 1_000_000, 0)
            .build(),
    )?;
    fixture.write_session(
        "sonnet",
        &TranscriptBuilder::new()
            .human("2025-03-01T09:00:00Z")
            .assistant("2025-03-01T09:00:03Z", "claude-sonnet-4-20250514", 1_000_000, 0)
            .build(),
    )?;

    run(&fixture)?;
    let rows = fixture.ledger_rows()?;
    let cost_of = |session: &str| {
        rows.iter()
            .find(|r| r["session_id"] == session)
            .and_then(|r| r["estimated_cost_usd"].as_f64())
    };
    assert_eq!(cost_of("opus"), Some(15.0));
    assert_eq!(cost_of("sonnet"), Some(3.0));
    Ok(())
}

#[test]
fn test_reply_before_prompt_has_zero_duration() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session(
        "skewed",
        &TranscriptBuilder::new()
            .human("2025-03-01T09:00:30Z")
            .assistant("2025-03-01T09:00:00Z", "claude-sonnet-4-20250514", 10, 1)
            .build(),
    )?;

    run(&fixture)?;
    let rows = fixture.ledger_rows()?;
    assert_eq!(rows[0]["duration_seconds"], 0);
    Ok(())
}

#[test]
fn test_ledger_sorted_by_date_session_turn() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("zzz", &TranscriptBuilder::new().turns("2025-03-01", 2).build())?;
    fixture.write_session("aaa", &TranscriptBuilder::new().turns("2025-03-02", 1).build())?;
    fixture.write_session("mmm", &TranscriptBuilder::new().turns("2025-03-01", 1).build())?;

    run(&fixture)?;
    let rows = fixture.ledger_rows()?;
    assert_eq!(
        keys(&rows),
        vec![
            ("mmm".to_string(), 0),
            ("zzz".to_string(), 0),
            ("zzz".to_string(), 1),
            ("aaa".to_string(), 0),
        ]
    );
    Ok(())
}

#[test]
fn test_invalid_ledger_rebuilt_from_transcripts() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("s1", &TranscriptBuilder::new().turns("2025-03-01", 2).build())?;
    fixture.write_ledger("{ this is not a ledger")?;

    let report = run(&fixture)?;
    assert!(report.invalid_ledger);
    assert_eq!(fixture.ledger_rows()?.len(), 2);
    Ok(())
}

#[test]
fn test_malformed_lines_counted_not_fatal() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    let transcript = TranscriptBuilder::new()
        .human("2025-03-01T09:00:00Z")
        .raw("{\"type\":\"assistant\",\"timest")
        .assistant("2025-03-01T09:00:03Z", "claude-sonnet-4-20250514", 10, 1)
        .build();
    fixture.write_session("s1", &transcript)?;

    let report = run(&fixture)?;
    assert_eq!(report.skipped_lines, 1);
    assert_eq!(report.turns_written(), 1);
    Ok(())
}

#[test]
fn test_sessions_without_turns_leave_ledger_unwritten() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session(
        "empty",
        &TranscriptBuilder::new().human("2025-03-01T09:00:00Z").build(),
    )?;

    let report = run(&fixture)?;
    assert_eq!(report.sessions_without_turns, 1);
    assert!(!report.ledger_written);
    assert!(!fixture.ledger_path().exists());
    Ok(())
}

#[test]
fn test_rows_for_vanished_sessions_survive() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("kept", &TranscriptBuilder::new().turns("2025-03-01", 1).build())?;
    fixture.write_ledger(
        r#"[{"date":"2025-02-01","project":"demo","session_id":"archived","turn_index":0,"total_tokens":9}]"#,
    )?;

    run(&fixture)?;
    let rows = fixture.ledger_rows()?;
    assert_eq!(
        keys(&rows),
        vec![("archived".to_string(), 0), ("kept".to_string(), 0)]
    );
    Ok(())
}

#[test]
fn test_patch_durations_fills_zero_durations() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("s1", &TranscriptBuilder::new().turns("2025-03-01", 2).build())?;
    fixture.write_ledger(
        r#"[
  {"date":"2025-03-01","session_id":"s1","turn_index":0,"total_tokens":110,"duration_seconds":0},
  {"date":"2025-03-01","session_id":"s1","turn_index":1,"total_tokens":111,"duration_seconds":0}
]"#,
    )?;

    let outcome = Backfill::new(&fixture.config).patch_durations(&fixture.project_root())?;
    let BackfillOutcome::Completed(report) = outcome else {
        anyhow::bail!("expected a patch report");
    };
    assert_eq!(report.turns_patched, 2);
    assert!(report.ledger_written);

    let rows = fixture.ledger_rows()?;
    assert!(rows.iter().all(|r| r["duration_seconds"] == 5));
    Ok(())
}

#[test]
fn test_untouched_sessions_keep_rows_verbatim() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("new", &TranscriptBuilder::new().turns("2025-03-05", 1).build())?;
    fixture.write_ledger(
        r#"[
  {"session_id":"old","turn_index":0,"date":"2025-03-01","total_tokens":9,"notes":"keep me"},
  {"date":"2025-03-02","session_id":"old2","turn_index":0,"total_tokens":4,"duration_seconds":3.0}
]"#,
    )?;

    let report = run(&fixture)?;
    assert!(report.ledger_written);

    let rows = fixture.ledger_rows()?;
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        serde_json::json!({"session_id":"old","turn_index":0,"date":"2025-03-01","total_tokens":9,"notes":"keep me"})
    );
    assert_eq!(
        rows[1],
        serde_json::json!({"date":"2025-03-02","session_id":"old2","turn_index":0,"total_tokens":4,"duration_seconds":3.0})
    );
    assert!(rows[0].get("project").is_none());
    assert_eq!(rows[2]["session_id"], "new");
    Ok(())
}

#[test]
fn test_oversized_usage_counts_saturate() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    let transcript = TranscriptBuilder::new()
        .human("2025-03-01T09:00:00Z")
        .raw(r#"{"type":"assistant","timestamp":"2025-03-01T09:00:02Z","message":{"role":"assistant","model":"claude-sonnet-4-20250514","usage":{"input_tokens":18446744073709551615,"output_tokens":1}}}"#)
        .build();
    fixture.write_session("huge", &transcript)?;

    let report = run(&fixture)?;
    assert_eq!(report.turns_written(), 1);
    let rows = fixture.ledger_rows()?;
    assert_eq!(rows[0]["total_tokens"].as_u64(), Some(u64::MAX));
    Ok(())
}

#[test]
fn test_patch_durations_migrates_legacy_and_keeps_the_rest() -> anyhow::Result<()> {
    let fixture = ProjectFixture::new()?;
    fixture.write_session("s1", &TranscriptBuilder::new().turns("2025-03-01", 1).build())?;
    fixture.write_session("legacy", &TranscriptBuilder::new().turns("2025-03-02", 2).build())?;
    fixture.write_ledger(
        r#"[
  {"date":"2025-02-01","session_id":"legacy-gone","total_tokens":40},
  {"date":"2025-03-01","session_id":"s1","turn_index":0,"total_tokens":110,"duration_seconds":0},
  {"date":"2025-03-02","session_id":"legacy","total_tokens":221}
]"#,
    )?;

    let outcome = Backfill::new(&fixture.config).patch_durations(&fixture.project_root())?;
    let BackfillOutcome::Completed(report) = outcome else {
        anyhow::bail!("expected a patch report");
    };
    assert_eq!(report.turns_patched, 1);
    assert_eq!(report.sessions_migrated, 1);

    let rows = fixture.ledger_rows()?;
    assert_eq!(
        rows[0],
        serde_json::json!({"date":"2025-02-01","session_id":"legacy-gone","total_tokens":40})
    );
    assert_eq!(rows[1]["duration_seconds"], 5);
    assert_eq!(
        keys(&rows[2..]),
        vec![("legacy".to_string(), 0), ("legacy".to_string(), 1)]
    );
    Ok(())
}
