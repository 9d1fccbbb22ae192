use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::info;

use super::settings::SyncWatchConfig;
use crate::error::{Result, StoreError};

const CONFIG_FILE_NAME: &str = "syncwatch.json";
const ENV_PREFIX: &str = "SYNCWATCH";

/// Default config location: `syncwatch.json` in the working directory
pub fn get_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Optional JSON file overlaid by `SYNCWATCH_*` variables; anything unset keeps its default
pub fn load_config(path: Option<&Path>) -> Result<SyncWatchConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
    let config = Config::builder()
        .add_source(File::from(path.as_path()).format(FileFormat::Json).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let loaded: SyncWatchConfig = config.try_deserialize()?;
    info!("Loaded config (file: {})", path.display());
    Ok(loaded)
}

pub fn save_config(path: &Path, config: &SyncWatchConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).map_err(StoreError::from)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(StoreError::from)?;
    }
    std::fs::write(path, json).map_err(StoreError::from)?;
    info!("Saved config to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config.room.max_participants, 4);
        assert_eq!(config.room.message_limit, 100);
        assert_eq!(config.sync.tolerance_seconds, 2.0);
        assert_eq!(config.sync.master_hold_ms, 1000);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("syncwatch.json");
        std::fs::write(&path, r#"{"sync": {"interval_ms": 2000}, "user": {"username": "alice"}}"#)
            .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.sync.interval_ms, 2000);
        assert_eq!(config.sync.tolerance_seconds, 2.0);
        assert_eq!(config.user.username.as_deref(), Some("alice"));
        assert_eq!(config.room.code_length, 6);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("syncwatch.json");
        let mut config = SyncWatchConfig::default();
        config.room.max_participants = 8;
        config.player.default_volume = 0.5;
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }
}
