pub mod config;
pub mod error;
pub mod interactive;
pub mod logging;
pub mod path_codec;
pub mod rc;
pub mod runtime;
pub mod schema;
pub mod state;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod test_support;

use error::{AppError, AppResult};
use state::AppState;
use std::sync::Arc;

/// Create directories, load settings, start the operation log and build the
/// shared state
pub fn init_app() -> AppResult<Arc<AppState>> {
    let config_dir = config::get_config_dir()?;
    let logs_dir = config::get_logs_dir()?;
    std::fs::create_dir_all(&config_dir)?;
    std::fs::create_dir_all(config::get_remotes_dir()?)?;
    std::fs::create_dir_all(&logs_dir)?;

    tracing::info!("remoteconf config dir: {:?}", config_dir);

    let settings = config::AppSettings::load(&config_dir)?;
    logging::init_log_manager(&logs_dir, settings.wizard.restrict_sensitive)
        .map_err(|e| AppError::Config(format!("Failed to initialize log manager: {}", e)))?;

    let state = Arc::new(AppState::new(settings)?);
    logging::log(
        logging::LogLevel::Info,
        logging::LogSubsystem::App,
        "remoteconf initialized",
    );
    Ok(state)
}
