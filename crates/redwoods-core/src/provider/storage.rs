use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::ProviderSession;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Where the provider client keeps the session between runs.
///
/// The session core never touches this: persistence is the provider's job.
#[derive(Debug, Clone)]
pub struct SessionFile {
    cache_dir: PathBuf,
}

impl SessionFile {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load the session from disk, if one was saved.
    pub fn load(&self) -> Result<Option<ProviderSession>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let session = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &ProviderSession) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
