//! CLI configuration utilities

use anyhow::Result;
use musblossom_core::ClientConfig;
use std::path::{Path, PathBuf};

/// Load client configuration, letting `--state-file` override the stored
/// session location
pub fn load(path: Option<&Path>, state_file: Option<PathBuf>) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(path)?;
    if let Some(state_file) = state_file {
        config.storage.path = Some(state_file);
    }
    Ok(config)
}

/// Logs live next to the session file
pub fn log_dir(config: &ClientConfig) -> PathBuf {
    config
        .storage
        .resolved_path()
        .parent()
        .map_or_else(
            || dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("musblossom"),
            Path::to_path_buf,
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_overrides_storage_path() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("nested").join("session.json");

        let config = load(None, Some(state.clone())).unwrap();

        assert_eq!(config.storage.resolved_path(), state);
        assert_eq!(log_dir(&config), dir.path().join("nested"));
    }
}
