//! Parse and segment benchmarks over synthetic transcripts
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::io::Write;
use tempfile::NamedTempFile;
use token_ledger::parser::FileParser;
use token_ledger::segmenter::TurnSegmenter;

/// Generate a transcript with `num_turns` human/assistant pairs
fn generate_test_jsonl(num_turns: usize, include_errors: bool) -> String {
    let mut lines = Vec::new();

    for i in 0..num_turns {
        let minute = (i / 60) % 60;
        let second = i % 60;
        lines.push(format!(
            r#"{{"type":"user","timestamp":"2024-01-15T10:{:02}:{:02}Z","message":{{"role":"user","content":"prompt {}"}}}}"#,
            minute, second, i
        ));
        if include_errors && i % 10 == 5 {
            lines.push("{broken json}".to_string());
        }
        lines.push(format!(
            r#"{{"type":"assistant","timestamp":"2024-01-15T11:{:02}:{:02}Z","message":{{"role":"assistant","model":"claude-sonnet-4-20250514","usage":{{"input_tokens":{},"output_tokens":{},"cache_creation_input_tokens":{},"cache_read_input_tokens":{}}}}}}}"#,
            minute,
            second,
            100 + i,
            200 + i,
            i % 50,
            i % 100
        ));
    }

    lines.join("\n")
}

fn create_temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn benchmark_parse_and_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_and_segment");

    for size in [10, 100, 1000, 10000].iter() {
        let temp_file = create_temp_file(&generate_test_jsonl(*size, false));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let parser = FileParser::new();
            b.iter(|| {
                let transcript = parser.parse_transcript(black_box(temp_file.path()));
                TurnSegmenter::new("bench", "bench").segment(&transcript)
            });
        });
    }

    group.finish();
}

fn benchmark_error_handling(c: &mut Criterion) {
    let mut group = c.benchmark_group("error_handling");

    let temp_file = create_temp_file(&generate_test_jsonl(1000, true));

    group.bench_function("parse_with_errors", |b| {
        let parser = FileParser::new();
        b.iter(|| parser.parse_transcript(black_box(temp_file.path())));
    });

    group.finish();
}

criterion_group!(benches, benchmark_parse_and_segment, benchmark_error_handling);
criterion_main!(benches);
