use crate::error::{AppError, AppResult};
use crate::schema::FieldDefinition;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum lines to keep in memory ring buffer
const MAX_RING_BUFFER_LINES: usize = 10_000;

/// Maximum line length before truncation
const MAX_LINE_LENGTH: usize = 2048;

/// Maximum log file size before rotation (5 MB)
const MAX_LOG_FILE_SIZE: u64 = 5 * 1024 * 1024;

const REDACTED: &str = "[REDACTED]";

/// Sensitive patterns to redact
static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // JWTs (base64.base64.base64)
        Regex::new(r"eyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").unwrap(),
        // Authorization headers
        Regex::new(r"(?i)authorization\s*:\s*bearer\s+[^\s]+").unwrap(),
        Regex::new(r"(?i)authorization\s*:\s*basic\s+[^\s]+").unwrap(),
        // OAuth token blobs as stored by rclone
        Regex::new(r#"(?i)"(access_token|refresh_token)"\s*:\s*"[^"]*""#).unwrap(),
        // Generic secrets by key name (key=value patterns)
        Regex::new(r#"(?i)(password|pass|secret|token|api[_-]?key|client[_-]?secret|passphrase|access[_-]?key)\s*[:=]\s*["']?[^\s"',}]+["']?"#).unwrap(),
        // Long base64 blobs
        Regex::new(r"[A-Za-z0-9+/]{64,}={0,2}").unwrap(),
    ]
});

/// Sanitize a string by removing sensitive information
pub fn sanitize(input: &str) -> String {
    let mut result = input.to_string();

    for pattern in SENSITIVE_PATTERNS.iter() {
        result = pattern.replace_all(&result, REDACTED).to_string();
    }

    if result.len() > MAX_LINE_LENGTH {
        let mut cut = MAX_LINE_LENGTH;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result = format!("{}... [truncated]", &result[..cut]);
    }

    result
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    ["password", "pass", "secret", "token", "key", "auth", "credential"]
        .iter()
        .any(|needle| key.contains(needle))
}

/// Sanitize a JSON value recursively
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize(s)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if is_sensitive_key(k) {
                        (k.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (k.clone(), sanitize_json(v))
                    }
                })
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        other => other.clone(),
    }
}

/// Blank out every value whose schema field is marked sensitive
pub fn redact_sensitive_values(fields: &Map<String, Value>, defs: &[FieldDefinition]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| {
            let sensitive = defs.iter().any(|d| d.sensitive && &d.name == name);
            if sensitive {
                (name.clone(), Value::String(REDACTED.to_string()))
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Log subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSubsystem {
    Wizard,
    Schema,
    Interactive,
    Profiles,
    Persistence,
    Rc,
    App,
}

impl std::fmt::Display for LogSubsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSubsystem::Wizard => write!(f, "wizard"),
            LogSubsystem::Schema => write!(f, "schema"),
            LogSubsystem::Interactive => write!(f, "interactive"),
            LogSubsystem::Profiles => write!(f, "profiles"),
            LogSubsystem::Persistence => write!(f, "persistence"),
            LogSubsystem::Rc => write!(f, "rc"),
            LogSubsystem::App => write!(f, "app"),
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: i64,
    pub level: LogLevel,
    pub subsystem: LogSubsystem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl LogLine {
    pub fn new(level: LogLevel, subsystem: LogSubsystem, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            level,
            subsystem,
            remote: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    fn redacted(mut self) -> Self {
        self.message = sanitize(&self.message);
        self.details = self.details.as_ref().map(sanitize_json);
        self
    }
}

/// Log filter for querying logs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub subsystem: Option<LogSubsystem>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub since: Option<i64>,
}

impl LogFilter {
    fn matches(&self, log: &LogLine) -> bool {
        if let Some(ref remote) = self.remote {
            if log.remote.as_ref() != Some(remote) {
                return false;
            }
        }
        if let Some(level) = self.level {
            if log.level != level {
                return false;
            }
        }
        if let Some(subsystem) = self.subsystem {
            if log.subsystem != subsystem {
                return false;
            }
        }
        if let Some(ref search) = self.search {
            if !log.message.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if log.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Log manager with ring buffer and file persistence
pub struct LogManager {
    ring_buffer: RwLock<VecDeque<LogLine>>,
    log_file_path: PathBuf,
    restrict_sensitive: bool,
}

impl LogManager {
    pub fn new(logs_dir: &Path, restrict_sensitive: bool) -> std::io::Result<Arc<Self>> {
        fs::create_dir_all(logs_dir)?;

        let manager = Arc::new(Self {
            ring_buffer: RwLock::new(VecDeque::with_capacity(MAX_RING_BUFFER_LINES)),
            log_file_path: logs_dir.join("remoteconf.log"),
            restrict_sensitive,
        });

        manager.load_existing_logs();

        Ok(manager)
    }

    /// Load existing log lines from file into the ring buffer
    fn load_existing_logs(&self) {
        let file = match File::open(&self.log_file_path) {
            Ok(file) => file,
            Err(_) => return,
        };

        let mut buffer = self.ring_buffer.write();
        for line in BufReader::new(file).lines().map_while(Result::ok) {
            if let Ok(log_line) = serde_json::from_str::<LogLine>(&line) {
                if buffer.len() >= MAX_RING_BUFFER_LINES {
                    buffer.pop_front();
                }
                buffer.push_back(log_line);
            }
        }
    }

    /// Add a log entry
    pub fn log(&self, entry: LogLine) {
        let entry = if self.restrict_sensitive {
            entry.redacted()
        } else {
            entry
        };

        {
            let mut buffer = self.ring_buffer.write();
            if buffer.len() >= MAX_RING_BUFFER_LINES {
                buffer.pop_front();
            }
            buffer.push_back(entry.clone());
        }

        self.write_to_file(&entry);
    }

    /// Write a log entry to the file with rotation
    fn write_to_file(&self, entry: &LogLine) {
        if let Ok(metadata) = fs::metadata(&self.log_file_path) {
            if metadata.len() > MAX_LOG_FILE_SIZE {
                self.rotate_log_file();
            }
        }

        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
        {
            if let Ok(json) = serde_json::to_string(entry) {
                let _ = writeln!(file, "{}", json);
            }
        }
    }

    fn rotate_log_file(&self) {
        let rotated_path = self.log_file_path.with_extension("log.1");
        let _ = fs::remove_file(&rotated_path);
        let _ = fs::rename(&self.log_file_path, &rotated_path);
    }

    /// Most recent `max_lines` entries matching `filter`, oldest first
    pub fn get_recent_logs(&self, max_lines: usize, filter: Option<&LogFilter>) -> Vec<LogLine> {
        let buffer = self.ring_buffer.read();
        let mut logs: Vec<LogLine> = buffer
            .iter()
            .filter(|log| filter.map(|f| f.matches(log)).unwrap_or(true))
            .cloned()
            .collect();

        if logs.len() > max_lines {
            logs = logs.split_off(logs.len() - max_lines);
        }
        logs
    }

    /// Clear the ring buffer (does not delete file logs)
    pub fn clear_view(&self) {
        self.ring_buffer.write().clear();
    }

    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

/// Global log manager instance
static LOG_MANAGER: once_cell::sync::OnceCell<Arc<LogManager>> = once_cell::sync::OnceCell::new();

/// Initialize the global log manager
pub fn init_log_manager(logs_dir: &Path, restrict_sensitive: bool) -> std::io::Result<()> {
    let manager = LogManager::new(logs_dir, restrict_sensitive)?;
    LOG_MANAGER.set(manager).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::AlreadyExists, "LogManager already initialized")
    })?;
    Ok(())
}

pub fn get_log_manager() -> Option<&'static Arc<LogManager>> {
    LOG_MANAGER.get()
}

/// Recent entries from the global manager
pub fn get_recent_logs(max_lines: Option<usize>, filter: Option<LogFilter>) -> AppResult<Vec<LogLine>> {
    let manager = get_log_manager()
        .ok_or_else(|| AppError::Config("Log manager not initialized".to_string()))?;
    let lines = max_lines.unwrap_or(1000).min(MAX_RING_BUFFER_LINES);
    Ok(manager.get_recent_logs(lines, filter.as_ref()))
}

/// Helper to log a message (no-op before initialisation)
pub fn log(level: LogLevel, subsystem: LogSubsystem, message: impl Into<String>) {
    if let Some(manager) = get_log_manager() {
        manager.log(LogLine::new(level, subsystem, message));
    }
}

/// Helper to log a message about one remote
pub fn log_remote(
    level: LogLevel,
    subsystem: LogSubsystem,
    remote: impl Into<String>,
    message: impl Into<String>,
) {
    if let Some(manager) = get_log_manager() {
        manager.log(LogLine::new(level, subsystem, message).with_remote(remote));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_password_field() {
        let result = sanitize("pass=mysecretpassword123");
        assert!(result.contains(REDACTED));
        assert!(!result.contains("mysecretpassword"));
    }

    #[test]
    fn test_sanitize_oauth_token_blob() {
        let input = r#"token = {"access_token":"ya29.a0AfH6","token_type":"Bearer","refresh_token":"1//0g"}"#;
        let result = sanitize(input);
        assert!(!result.contains("ya29"));
        assert!(!result.contains("1//0g"));
    }

    #[test]
    fn test_sanitize_json() {
        let json = json!({
            "name": "gdrive",
            "parameters": {"client_secret": "abc", "scope": "drive"},
            "opt": {"state": "*oauth", "result": "true"}
        });
        let result = sanitize_json(&json);
        assert_eq!(result["parameters"]["client_secret"], REDACTED);
        assert_eq!(result["parameters"]["scope"], "drive");
        assert_eq!(result["opt"]["state"], "*oauth");
    }

    #[test]
    fn test_redact_sensitive_values() {
        let defs = vec![
            FieldDefinition::from_rclone(&json!({"Name": "pass", "Type": "string", "IsPassword": true})).unwrap(),
            FieldDefinition::from_rclone(&json!({"Name": "host", "Type": "string"})).unwrap(),
        ];
        let mut fields = Map::new();
        fields.insert("pass".into(), json!("hunter2"));
        fields.insert("host".into(), json!("example.com"));
        let redacted = redact_sensitive_values(&fields, &defs);
        assert_eq!(redacted["pass"], REDACTED);
        assert_eq!(redacted["host"], "example.com");
    }

    #[test]
    fn test_truncate_long_line() {
        let result = sanitize(&"a b".repeat(2000));
        assert!(result.len() < 3000);
        assert!(result.ends_with("[truncated]"));
    }

    #[test]
    fn test_manager_filters_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LogManager::new(dir.path(), true).unwrap();
        manager.log(LogLine::new(LogLevel::Info, LogSubsystem::Wizard, "opened").with_remote("gdrive"));
        manager.log(LogLine::new(LogLevel::Error, LogSubsystem::Schema, "fetch failed password=x1"));
        manager.log(LogLine::new(LogLevel::Info, LogSubsystem::Profiles, "renamed").with_remote("s3"));

        let filter = LogFilter {
            remote: Some("gdrive".into()),
            ..Default::default()
        };
        let logs = manager.get_recent_logs(10, Some(&filter));
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "opened");

        let errors = manager.get_recent_logs(
            10,
            Some(&LogFilter {
                level: Some(LogLevel::Error),
                ..Default::default()
            }),
        );
        assert!(!errors[0].message.contains("x1"));
        assert_eq!(manager.get_recent_logs(2, None).len(), 2);

        let reloaded = LogManager::new(dir.path(), true).unwrap();
        assert_eq!(reloaded.get_recent_logs(10, None).len(), 3);
        assert!(reloaded.log_file_path().ends_with("remoteconf.log"));
    }
}
