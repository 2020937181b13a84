//! Per-session browser user agents.
//!
//! Every session keeps the same user agent across runs. The pairs live in a
//! JSON file (`[{"session_name": ..., "user_agent": ...}]`); sessions missing
//! from it get a freshly generated Android Chrome user agent which is written
//! back immediately.

use std::path::PathBuf;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const ANDROID_VERSIONS: &[&str] = &["10", "11", "12", "13", "14"];

const DEVICE_MODELS: &[&str] = &[
    "SM-G991B", "SM-G998B", "SM-S901B", "SM-S911B", "SM-A525F", "SM-A536B", "Pixel 6",
    "Pixel 7", "Pixel 7 Pro", "Pixel 8", "M2101K6G", "2201117TG", "CPH2451", "RMX3563",
];

/// Chrome major versions to pick from.
const CHROME_MAJOR: (u32, u32) = (110, 126);

/// Error writing the user agent file.
#[derive(Debug, Error)]
pub enum UserAgentError {
    #[error("Failed to serialize user agents: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One persisted session/user agent pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentEntry {
    pub session_name: String,
    pub user_agent: String,
}

/// User agents keyed by session name, backed by a JSON file.
#[derive(Debug)]
pub struct UserAgentStore {
    path: PathBuf,
    entries: Vec<UserAgentEntry>,
}

impl UserAgentStore {
    /// Loads the store from `path`. A missing or unreadable file gives an
    /// empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring corrupt user agent file {}: {}", path.display(), e);
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Could not read user agent file {}: {}", path.display(), e);
                Vec::new()
            }
        };
        Self { path, entries }
    }

    /// Returns the stored user agent of `session_name`.
    #[must_use]
    pub fn get(&self, session_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.session_name == session_name)
            .map(|entry| entry.user_agent.as_str())
    }

    /// Returns the user agent of `session_name`, generating and saving one
    /// when there is none yet.
    pub fn get_or_create<R: Rng + ?Sized>(
        &mut self,
        session_name: &str,
        rng: &mut R,
    ) -> Result<String, UserAgentError> {
        if let Some(user_agent) = self.get(session_name) {
            return Ok(user_agent.to_owned());
        }

        let user_agent = generate_android_chrome(rng);
        self.entries.push(UserAgentEntry {
            session_name: session_name.to_owned(),
            user_agent: user_agent.clone(),
        });
        self.save()?;
        info!("Saved new user agent for {}", session_name);
        Ok(user_agent)
    }

    /// Writes every entry back to the file.
    pub fn save(&self) -> Result<(), UserAgentError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json).map_err(|source| UserAgentError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Generates a random Chrome user agent of an Android phone.
pub fn generate_android_chrome<R: Rng + ?Sized>(rng: &mut R) -> String {
    let android = ANDROID_VERSIONS.choose(rng).copied().unwrap_or("13");
    let model = DEVICE_MODELS.choose(rng).copied().unwrap_or("Pixel 7");
    let major = rng.gen_range(CHROME_MAJOR.0..=CHROME_MAJOR.1);
    let build = rng.gen_range(4000..6500);
    let patch = rng.gen_range(50..200);

    format!(
        "Mozilla/5.0 (Linux; Android {android}; {model}) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Mobile Safari/537.36"
    )
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_generated_agent_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let ua = generate_android_chrome(&mut rng);
        assert!(ua.starts_with("Mozilla/5.0 (Linux; Android "));
        assert!(ua.contains("Chrome/"));
        assert!(ua.ends_with("Mobile Safari/537.36"));
    }

    #[test]
    fn test_missing_file_gives_empty_store() {
        let dir = tempdir().unwrap();
        let store = UserAgentStore::load(dir.path().join("user_agents.json"));
        assert!(store.get("alice").is_none());
    }

    #[test]
    fn test_corrupt_file_gives_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user_agents.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = UserAgentStore::load(&path);
        assert!(store.get("alice").is_none());
    }

    #[test]
    fn test_get_or_create_persists_and_reuses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user_agents.json");
        let mut rng = StdRng::seed_from_u64(9);

        let mut store = UserAgentStore::load(&path);
        let first = store.get_or_create("alice", &mut rng).unwrap();
        assert_eq!(store.get_or_create("alice", &mut rng).unwrap(), first);

        let reloaded = UserAgentStore::load(&path);
        assert_eq!(reloaded.get("alice"), Some(first.as_str()));
    }

    #[test]
    fn test_reads_existing_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user_agents.json");
        std::fs::write(
            &path,
            r#"[{"session_name": "bob", "user_agent": "Mozilla/5.0 test"}]"#,
        )
        .unwrap();

        let mut store = UserAgentStore::load(&path);
        let ua = store
            .get_or_create("bob", &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(ua, "Mozilla/5.0 test");
    }
}
