use std::fs;
use std::path::PathBuf;

use crate::cache::{ExpiringCache, FileStorage};
use crate::client::DeskClient;

pub const STORAGE_FILE: &str = "storage.json";

/// Client type used by every CLI command
pub type CliClient = DeskClient<FileStorage>;

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("DESK_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("digital-desk")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// The CLI's local storage file backing the expiring cache
pub fn storage_path() -> anyhow::Result<PathBuf> {
    Ok(get_config_dir()?.join(STORAGE_FILE))
}

pub fn open_client(server: &str) -> anyhow::Result<CliClient> {
    let storage = FileStorage::open(storage_path()?)?;
    let cache = ExpiringCache::new(storage);
    Ok(DeskClient::new(server, cache)?)
}
