use super::{BindingTable, ProfileBindings, ProfileRunner};
use crate::config::{OperationKind, RemoteSettings, SettingsRepository};
use crate::error::{AppError, AppResult};
use crate::logging::{self, LogLevel, LogSubsystem};
use crate::rc::endpoints;
use crate::rc::RcloneApi;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Starts saved profiles through the rclone daemon and records the binding
pub struct RcProfileRunner {
    api: Arc<dyn RcloneApi>,
    repository: Arc<dyn SettingsRepository>,
    tables: Vec<Arc<BindingTable>>,
}

impl RcProfileRunner {
    pub fn new(
        api: Arc<dyn RcloneApi>,
        repository: Arc<dyn SettingsRepository>,
        tables: Vec<Arc<BindingTable>>,
    ) -> Self {
        Self {
            api,
            repository,
            tables,
        }
    }

    fn table_for(&self, kind: OperationKind) -> Option<&Arc<BindingTable>> {
        let subsystem = kind.binding_subsystem()?;
        self.tables.iter().find(|t| t.subsystem() == subsystem)
    }
}

fn linked_options(
    settings: &RemoteSettings,
    kind: OperationKind,
    name: Option<&str>,
) -> Option<Map<String, Value>> {
    let profile = settings.section(kind)?.get(name?)?;
    (!profile.options.is_empty()).then(|| profile.options.clone())
}

/// Serve options go top-level; list values travel comma-joined
fn flatten_serve_option(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::String(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => other,
    }
}

/// What a later stop will be keyed by: the mount point for mounts, the id
/// from the reply for jobs and serves
fn operation_handle(kind: OperationKind, body: &Value, reply: &Value) -> Option<String> {
    let raw = match kind {
        OperationKind::Mount => body.get("mountPoint"),
        OperationKind::Serve => reply.get("id"),
        _ => reply.get("jobid"),
    }?;
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Endpoint and body that start `profile` of `kind`
pub fn start_request(
    kind: OperationKind,
    settings: &RemoteSettings,
    profile_name: &str,
) -> AppResult<(&'static str, Value)> {
    if kind.binding_subsystem().is_none() {
        return Err(AppError::InvalidState(format!("{} profiles cannot be started", kind)));
    }
    let profile = settings
        .section(kind)
        .and_then(|s| s.get(profile_name))
        .ok_or_else(|| AppError::ProfileNotFound(profile_name.to_string()))?;
    let source = profile
        .source
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Config(format!("{} profile '{}' has no source", kind, profile_name)))?;
    let dest = || {
        profile
            .dest
            .clone()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppError::Config(format!("{} profile '{}' has no destination", kind, profile_name)))
    };

    let vfs = linked_options(settings, OperationKind::Vfs, profile.vfs_profile.as_deref());
    let filter = linked_options(settings, OperationKind::Filter, profile.filter_profile.as_deref());
    let backend = linked_options(settings, OperationKind::Backend, profile.backend_profile.as_deref());

    let mut body = Map::new();
    let endpoint = match kind {
        OperationKind::Mount => {
            body.insert("fs".into(), Value::String(source));
            body.insert("mountPoint".into(), Value::String(dest()?));
            body.insert("_async".into(), Value::Bool(true));
            if !profile.options.is_empty() {
                body.insert("mountOpt".into(), Value::Object(profile.options.clone()));
            }
            if let Some(vfs) = vfs {
                body.insert("vfsOpt".into(), Value::Object(vfs));
            }
            if let Some(backend) = backend {
                body.insert("_config".into(), Value::Object(backend));
            }
            endpoints::mount::MOUNT
        }
        OperationKind::Serve => {
            for (key, value) in &profile.options {
                body.insert(key.clone(), flatten_serve_option(value.clone()));
            }
            body.insert("fs".into(), Value::String(source));
            if let Some(vfs) = vfs {
                body.insert("vfsOpt".into(), Value::Object(vfs));
            }
            if let Some(backend) = backend {
                body.insert("_config".into(), Value::Object(backend));
            }
            endpoints::serve::START
        }
        _ => {
            if kind == OperationKind::Bisync {
                body.insert("path1".into(), Value::String(source));
                body.insert("path2".into(), Value::String(dest()?));
            } else {
                body.insert("srcFs".into(), Value::String(source));
                body.insert("dstFs".into(), Value::String(dest()?));
            }
            body.insert("_async".into(), Value::Bool(true));

            // job flags win over the linked backend profile
            let mut config = backend.unwrap_or_default();
            config.extend(profile.options.clone());
            if !config.is_empty() {
                body.insert("_config".into(), Value::Object(config));
            }
            match kind {
                OperationKind::Sync => endpoints::sync::SYNC,
                OperationKind::Copy => endpoints::sync::COPY,
                OperationKind::Move => endpoints::sync::MOVE,
                _ => endpoints::sync::BISYNC,
            }
        }
    };

    if let Some(filter) = filter {
        body.insert("_filter".into(), Value::Object(filter));
    }
    Ok((endpoint, Value::Object(body)))
}

#[async_trait]
impl ProfileRunner for RcProfileRunner {
    async fn start_profile(
        &self,
        kind: OperationKind,
        remote: &str,
        profile: &str,
    ) -> AppResult<Option<String>> {
        let settings = self
            .repository
            .load(remote)
            .await?
            .ok_or_else(|| AppError::Config(format!("No saved settings for remote '{}'", remote)))?;
        let (endpoint, body) = start_request(kind, &settings, profile)?;

        let reply = self.api.start_operation(endpoint, &body).await?;
        let handle = operation_handle(kind, &body, &reply);
        if let Some(table) = self.table_for(kind) {
            table
                .bind_with_handle(remote, kind, profile, handle.clone())
                .await;
        }

        logging::log_remote(
            LogLevel::Info,
            LogSubsystem::Rc,
            remote,
            format!("Started {} profile '{}' via {}", kind, profile, endpoint),
        );
        tracing::debug!("{} reply: {}", endpoint, reply);
        Ok(handle)
    }

    async fn release(&self, kind: OperationKind, handle: &str) -> bool {
        match self.table_for(kind) {
            Some(table) => table.release(handle).await,
            None => false,
        }
    }
}
