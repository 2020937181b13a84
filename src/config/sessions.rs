//! Session file discovery.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// File extension of Telegram session databases.
pub const SESSION_EXTENSION: &str = "session";

/// Error scanning the sessions directory.
#[derive(Debug, Error)]
#[error("Failed to read sessions directory {path}: {source}")]
pub struct SessionScanError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// A session file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    /// File stem, used as the session name.
    pub name: String,
    pub path: PathBuf,
}

/// Returns the path a session called `name` is stored at.
#[must_use]
pub fn session_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{SESSION_EXTENSION}"))
}

/// Lists every `*.session` file in `dir`, sorted by name.
///
/// A missing directory holds no sessions.
pub fn discover_sessions(dir: &Path) -> Result<Vec<SessionFile>, SessionScanError> {
    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(SessionScanError {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut sessions = Vec::new();
    for entry in read {
        let path = entry
            .map_err(|source| SessionScanError {
                path: dir.to_path_buf(),
                source,
            })?
            .path();

        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXTENSION) {
            continue;
        }
        if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
            sessions.push(SessionFile {
                name: name.to_owned(),
                path: path.clone(),
            });
        }
    }

    sessions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sessions)
}
