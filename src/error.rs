use crate::validation::FieldViolation;
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Schema load error: {0}")]
    SchemaLoad(String),

    #[error("Interactive configuration error: {0}")]
    InteractiveProtocol(String),

    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Profile '{profile}' is in use by {count} {subsystem} binding(s)")]
    ProfileUsageConflict {
        profile: String,
        count: usize,
        subsystem: String,
    },

    #[error("Profile '{0}' cannot be renamed or deleted")]
    ProfileProtected(String),

    #[error("Profile name already exists: {0}")]
    ProfileNameTaken(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Serializable error for frontend
#[derive(Serialize)]
pub struct SerializableError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for SerializableError {
    fn from(err: &AppError) -> Self {
        let (code, message, details) = match err {
            AppError::SchemaLoad(msg) => ("SCHEMA_LOAD_ERROR", msg.clone(), None),
            AppError::InteractiveProtocol(msg) => ("INTERACTIVE_ERROR", msg.clone(), None),
            AppError::Validation(violations) => (
                "VALIDATION_ERROR",
                err.to_string(),
                serde_json::to_value(violations).ok(),
            ),
            AppError::Persistence(msg) => ("PERSISTENCE_ERROR", msg.clone(), None),
            AppError::ProfileUsageConflict {
                profile,
                count,
                subsystem,
            } => (
                "PROFILE_IN_USE",
                err.to_string(),
                Some(serde_json::json!({
                    "profile": profile,
                    "count": count,
                    "subsystem": subsystem,
                })),
            ),
            AppError::ProfileProtected(_) => ("PROFILE_PROTECTED", err.to_string(), None),
            AppError::ProfileNameTaken(_) => ("PROFILE_NAME_TAKEN", err.to_string(), None),
            AppError::ProfileNotFound(_) => ("PROFILE_NOT_FOUND", err.to_string(), None),
            AppError::InvalidState(msg) => ("INVALID_STATE", msg.clone(), None),
            AppError::Network(msg) => ("NETWORK_ERROR", msg.clone(), None),
            AppError::Config(msg) => ("CONFIG_ERROR", msg.clone(), None),
            AppError::Io(e) => ("IO_ERROR", e.to_string(), None),
            AppError::Serialization(msg) => ("SERIALIZATION_ERROR", msg.clone(), None),
            AppError::Unknown(msg) => ("UNKNOWN_ERROR", msg.clone(), None),
        };

        SerializableError {
            code: code.to_string(),
            message,
            details,
        }
    }
}

// Implement Serialize for AppError so hosts can forward it to a frontend
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        SerializableError::from(self).serialize(serializer)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Unknown(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_conflict_serializes_binding_details() {
        let err = AppError::ProfileUsageConflict {
            profile: "nightly".to_string(),
            count: 2,
            subsystem: "mounts".to_string(),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "PROFILE_IN_USE");
        assert_eq!(value["details"]["count"], 2);
        assert_eq!(value["details"]["subsystem"], "mounts");
        assert!(value["message"].as_str().unwrap().contains("nightly"));
    }

    #[test]
    fn test_plain_errors_skip_details() {
        let value = serde_json::to_value(&AppError::Network("refused".into())).unwrap();
        assert_eq!(value["code"], "NETWORK_ERROR");
        assert!(value.get("details").is_none());
    }
}
