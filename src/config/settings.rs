use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub rc: RcSettings,
    #[serde(default)]
    pub wizard: WizardSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Connection to the rclone remote-control daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcSettings {
    #[serde(default = "default_rc_url")]
    pub url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_rc_url() -> String {
    "http://127.0.0.1:5572".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for RcSettings {
    fn default() -> Self {
        Self {
            url: default_rc_url(),
            user: None,
            password: None,
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardSettings {
    /// Backend types configured through the question/answer flow by default
    #[serde(default = "default_interactive_backends")]
    pub interactive_backends: Vec<String>,
    #[serde(default = "default_true")]
    pub show_on_tray: bool,
    #[serde(default = "default_true")]
    pub restrict_sensitive: bool,
}

fn default_interactive_backends() -> Vec<String> {
    vec![
        "onedrive".to_string(),
        "iclouddrive".to_string(),
        "drive".to_string(),
        "sharefile".to_string(),
    ]
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            interactive_backends: default_interactive_backends(),
            show_on_tray: true,
            restrict_sensitive: true,
        }
    }
}

impl WizardSettings {
    pub fn is_interactive_backend(&self, remote_type: &str) -> bool {
        self.interactive_backends
            .iter()
            .any(|b| b.eq_ignore_ascii_case(remote_type))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

fn default_max_lines() -> usize {
    1000
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
        }
    }
}

impl AppSettings {
    pub fn load(config_dir: &Path) -> AppResult<Self> {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: AppSettings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            let settings = AppSettings::default();
            settings.save(config_dir)?;
            Ok(settings)
        }
    }

    pub fn save(&self, config_dir: &Path) -> AppResult<()> {
        std::fs::create_dir_all(config_dir)?;
        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load(dir.path()).unwrap();
        assert_eq!(settings.rc.url, "http://127.0.0.1:5572");
        assert_eq!(settings.rc.timeout_secs, 30);
        assert!(dir.path().join("config.toml").exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[rc]\nurl = \"http://10.0.0.2:5572\"\n\n[wizard]\nshow_on_tray = false\n",
        )
        .unwrap();
        let settings = AppSettings::load(dir.path()).unwrap();
        assert_eq!(settings.rc.url, "http://10.0.0.2:5572");
        assert_eq!(settings.rc.timeout_secs, 30);
        assert!(!settings.wizard.show_on_tray);
        assert!(settings.wizard.is_interactive_backend("OneDrive"));
        assert_eq!(settings.logging.max_lines, 1000);
    }
}
