//! Configuration loading and data root resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the data root
pub const ROOT_ENV_VAR: &str = "CDP_ROOT";

/// Database file name under the data root
pub const DATABASE_FILE: &str = "cdp.db";

/// Data root resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. CDP_ROOT environment variable
/// 3. TOML config file (`data_root` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_root(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(data_root) = config.get("data_root").and_then(|v| v.as_str()) {
                    return PathBuf::from(data_root);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_data_root()
}

/// Ensure the data root directory exists
pub fn ensure_data_root(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

/// Path of the SQLite database under the data root
pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

/// Locate the config file for the platform (`<config dir>/cdp/config.toml`,
/// with `/etc/cdp/config.toml` as the Linux system-wide fallback)
fn find_config_file() -> Result<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("cdp").join("config.toml")) {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/cdp/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default data root
fn default_data_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cdp"))
        .unwrap_or_else(|| PathBuf::from("./cdp_data"))
}

/// Read an integer tunable from the settings table, falling back to a default
pub async fn setting_i64(pool: &sqlx::SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<i64> = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = ? AND value IS NOT NULL",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(value.unwrap_or(default))
}
