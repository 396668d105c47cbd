pub mod profiles;
pub mod repository;
pub mod settings;
pub mod store;

pub use profiles::*;
pub use repository::*;
pub use settings::*;
pub use store::*;

use crate::error::AppResult;
use std::path::PathBuf;

/// Get the remoteconf config directory
pub fn get_config_dir() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .ok_or_else(|| crate::error::AppError::Config("Could not find config directory".into()))?
        .join("remoteconf");

    Ok(config_dir)
}

/// Directory holding one settings file per remote
pub fn get_remotes_dir() -> AppResult<PathBuf> {
    Ok(get_config_dir()?.join("remotes"))
}

/// Directory holding the operation log
pub fn get_logs_dir() -> AppResult<PathBuf> {
    Ok(get_config_dir()?.join("logs"))
}
