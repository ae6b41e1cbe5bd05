use std::path::Path;

/// Helpers mapping between project roots, transcript directories and session ids
pub struct SessionUtils;

impl SessionUtils {
    /// Directory name Claude Code uses for a project: every `/` becomes `-`
    pub fn project_slug(project_root: &Path) -> String {
        project_root.to_string_lossy().replace('/', "-")
    }

    /// Project name recorded on each turn: the last path component
    pub fn project_name(project_root: &Path) -> String {
        project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| project_root.to_string_lossy().into_owned())
    }

    /// Session id of a transcript: the file name without its extension
    pub fn session_id_from_path(transcript: &Path) -> Option<String> {
        transcript
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
    }
}
