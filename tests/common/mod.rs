#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use token_ledger::config::Config;
use token_ledger::session_utils::SessionUtils;

pub fn create_test_jsonl(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Builds transcript content line by line
#[derive(Default)]
pub struct TranscriptBuilder {
    lines: Vec<String>,
}

impl TranscriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn human(mut self, timestamp: &str) -> Self {
        self.lines.push(format!(
            r#"{{"type":"user","userType":"external","timestamp":"{}","message":{{"role":"user","content":"do the thing"}}}}"#,
            timestamp
        ));
        self
    }

    pub fn assistant(mut self, timestamp: &str, model: &str, input: u64, output: u64) -> Self {
        self.lines.push(format!(
            r#"{{"type":"assistant","timestamp":"{}","message":{{"role":"assistant","model":"{}","usage":{{"input_tokens":{},"cache_creation_input_tokens":0,"cache_read_input_tokens":0,"output_tokens":{}}}}}}}"#,
            timestamp, model, input, output
        ));
        self
    }

    /// Assistant reply that declares no usage at all
    pub fn assistant_without_usage(mut self, timestamp: &str) -> Self {
        self.lines.push(format!(
            r#"{{"type":"assistant","timestamp":"{}","message":{{"role":"assistant","model":"claude-sonnet-4-20250514"}}}}"#,
            timestamp
        ));
        self
    }

    /// Assistant reply whose usage is all zeros
    pub fn assistant_zero_usage(self, timestamp: &str) -> Self {
        self.assistant(timestamp, "claude-sonnet-4-20250514", 0, 0)
    }

    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// `count` complete sonnet turns, one minute apart, starting at 10:00 on `date`
    pub fn turns(mut self, date: &str, count: usize) -> Self {
        for i in 0..count {
            self = self
                .human(&format!("{}T10:{:02}:00.000Z", date, i))
                .assistant(
                    &format!("{}T10:{:02}:05.000Z", date, i),
                    "claude-sonnet-4-20250514",
                    100 + i as u64,
                    10,
                );
        }
        self
    }

    pub fn build(&self) -> String {
        let mut content = self.lines.join("\n");
        content.push('\n');
        content
    }
}

/// A fake Claude home plus a project root, wired through [`Config`]
pub struct ProjectFixture {
    pub home: TempDir,
    pub project: TempDir,
    pub config: Config,
}

impl ProjectFixture {
    pub fn new() -> Result<Self> {
        let home = TempDir::new()?;
        let project = TempDir::new()?;
        let mut config = Config::default();
        config.paths.claude_home = home.path().to_path_buf();
        Ok(Self {
            home,
            project,
            config,
        })
    }

    pub fn project_root(&self) -> PathBuf {
        self.project
            .path()
            .canonicalize()
            .unwrap_or_else(|_| self.project.path().to_path_buf())
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.config
            .paths
            .claude_home
            .join("projects")
            .join(SessionUtils::project_slug(&self.project_root()))
    }

    pub fn write_session(&self, session_id: &str, content: &str) -> Result<PathBuf> {
        let dir = self.transcripts_dir();
        fs::create_dir_all(&dir)?;
        create_test_jsonl(&dir, &format!("{}.jsonl", session_id), content)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.config.ledger_path(&self.project_root())
    }

    pub fn write_ledger(&self, content: &str) -> Result<()> {
        let path = self.ledger_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn read_ledger(&self) -> Result<String> {
        Ok(fs::read_to_string(self.ledger_path())?)
    }

    pub fn ledger_rows(&self) -> Result<Vec<serde_json::Value>> {
        Ok(serde_json::from_str(&self.read_ledger()?)?)
    }
}
