use crate::reconciler::SessionSource;
use crate::session_utils::SessionUtils;
use anyhow::Result;
use glob::glob;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locates the transcripts Claude Code keeps for a project
pub struct FileDiscovery {
    claude_home: PathBuf,
}

impl FileDiscovery {
    pub fn new(claude_home: impl Into<PathBuf>) -> Self {
        Self {
            claude_home: claude_home.into(),
        }
    }

    /// `<claude_home>/projects/<slug>` for an absolute project root
    pub fn transcripts_dir(&self, project_root: &Path) -> PathBuf {
        self.claude_home
            .join("projects")
            .join(SessionUtils::project_slug(project_root))
    }

    /// All `*.jsonl` transcripts directly inside `dir`, in sorted path order
    pub fn find_session_files(&self, dir: &Path) -> Result<Vec<SessionSource>> {
        let pattern = dir.join("*.jsonl");
        let mut paths: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
            .flatten()
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let sessions: Vec<SessionSource> = paths
            .into_iter()
            .filter_map(|path| {
                SessionUtils::session_id_from_path(&path)
                    .map(|session_id| SessionSource { session_id, path })
            })
            .collect();

        debug!(dir = %dir.display(), sessions = sessions.len(), "Discovered transcripts");
        Ok(sessions)
    }
}
