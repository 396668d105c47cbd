use super::{BackendType, FieldDefinition};
use crate::config::OperationKind;
use crate::logging::{self, LogLevel, LogSubsystem};
use crate::rc::RcloneApi;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Memoizes schemas fetched from the backend.
///
/// A failed fetch is logged and reported as an empty schema so the wizard can
/// still render; failures are never cached, the next call retries.
pub struct SchemaCache {
    api: Arc<dyn RcloneApi>,
    remote_types: RwLock<Option<Vec<BackendType>>>,
    remote_fields: DashMap<String, Vec<FieldDefinition>>,
    flag_fields: DashMap<OperationKind, Vec<FieldDefinition>>,
}

impl SchemaCache {
    pub fn new(api: Arc<dyn RcloneApi>) -> Self {
        Self {
            api,
            remote_types: RwLock::new(None),
            remote_fields: DashMap::new(),
            flag_fields: DashMap::new(),
        }
    }

    pub async fn remote_types(&self) -> Vec<BackendType> {
        let cached = self.remote_types.read().clone();
        if let Some(types) = cached {
            return types;
        }

        match self.api.get_remote_types().await {
            Ok(types) => {
                tracing::info!("Loaded {} backend types", types.len());
                *self.remote_types.write() = Some(types.clone());
                types
            }
            Err(e) => {
                logging::log(
                    LogLevel::Error,
                    LogSubsystem::Schema,
                    format!("Failed to load backend types: {}", e),
                );
                Vec::new()
            }
        }
    }

    pub async fn remote_fields(&self, remote_type: &str) -> Vec<FieldDefinition> {
        let cached = self.remote_fields.get(remote_type).map(|f| f.clone());
        if let Some(fields) = cached {
            return fields;
        }

        match self.api.get_remote_config_fields(remote_type).await {
            Ok(fields) => {
                self.remote_fields
                    .insert(remote_type.to_string(), fields.clone());
                fields
            }
            Err(e) => {
                logging::log(
                    LogLevel::Error,
                    LogSubsystem::Schema,
                    format!("Failed to load fields for backend '{}': {}", remote_type, e),
                );
                Vec::new()
            }
        }
    }

    pub async fn flag_fields(&self, kind: OperationKind) -> Vec<FieldDefinition> {
        let cached = self.flag_fields.get(&kind).map(|f| f.clone());
        if let Some(fields) = cached {
            return fields;
        }

        match self.api.get_flag_fields(kind).await {
            Ok(fields) => {
                self.flag_fields.insert(kind, fields.clone());
                fields
            }
            Err(e) => {
                logging::log(
                    LogLevel::Error,
                    LogSubsystem::Schema,
                    format!("Failed to load {} flags: {}", kind, e),
                );
                Vec::new()
            }
        }
    }

    /// Drop everything, e.g. after the backend was restarted
    pub fn invalidate(&self) {
        *self.remote_types.write() = None;
        self.remote_fields.clear();
        self.flag_fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedApi;
    use serde_json::json;

    #[tokio::test]
    async fn test_flag_fields_are_cached() {
        let api = Arc::new(ScriptedApi::default());
        api.set_flags(
            OperationKind::Vfs,
            json!([{"Name": "vfs_cache_mode", "Type": "string"}]),
        );
        let cache = SchemaCache::new(api.clone());

        assert_eq!(cache.flag_fields(OperationKind::Vfs).await.len(), 1);
        assert_eq!(cache.flag_fields(OperationKind::Vfs).await.len(), 1);
        assert_eq!(api.flag_fetches(OperationKind::Vfs), 1);
    }

    #[tokio::test]
    async fn test_failure_is_empty_and_not_cached() {
        let api = Arc::new(ScriptedApi::default());
        api.fail_schema("daemon down");
        let cache = SchemaCache::new(api.clone());

        assert!(cache.remote_types().await.is_empty());
        assert!(cache.flag_fields(OperationKind::Mount).await.is_empty());

        api.clear_schema_failure();
        api.set_remote_types(json!([{"Name": "drive", "Description": "Google Drive", "Options": []}]));
        assert_eq!(cache.remote_types().await.len(), 1);
    }
}
