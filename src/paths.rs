//! Where the host build keeps its files
//!
//! - **Portable mode**: a `.portable` marker next to the executable keeps the
//!   config and the store directory beside it.
//! - **Installed mode** (default): everything lives under the platform data
//!   directory (`~/.local/share/picomod`, `%APPDATA%\picomod`, ...).

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_NAME: &str = "picomod";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Default configuration file
    pub config: PathBuf,
    /// Directory holding the sled store
    pub state_dir: PathBuf,
    pub is_portable: bool,
}

impl AppPaths {
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        if exe_dir.join(".portable").exists() {
            return Self::rooted_at(&exe_dir, true);
        }

        let base = dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .unwrap_or_else(|| exe_dir.join(".state"));
        Self::rooted_at(&base, false)
    }

    fn rooted_at(base: &Path, is_portable: bool) -> Self {
        Self {
            config: base.join("config.yaml"),
            state_dir: base.join("state"),
            is_portable,
        }
    }

    /// Default location of the sled store
    pub fn store_path(&self) -> PathBuf {
        self.state_dir.join("eeprom.sled")
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.state_dir.exists() {
            debug!("Creating state directory: {}", self.state_dir.display());
            std::fs::create_dir_all(&self.state_dir).with_context(|| {
                format!("Failed to create {}", self.state_dir.display())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_under_base() {
        let paths = AppPaths::rooted_at(Path::new("base"), true);
        assert_eq!(paths.config, PathBuf::from("base/config.yaml"));
        assert_eq!(paths.store_path(), PathBuf::from("base/state/eeprom.sled"));
        assert!(paths.is_portable);
    }

    #[test]
    fn test_ensure_directories_creates_state_dir() {
        let temp = tempdir().unwrap();
        let paths = AppPaths::rooted_at(temp.path(), false);
        paths.ensure_directories().unwrap();
        assert!(paths.state_dir.is_dir());
    }
}
