//! Scripted collaborators shared by unit tests

use crate::config::{OperationKind, RemoteSettings, SettingsRepository};
use crate::error::{AppError, AppResult};
use crate::interactive::InteractiveReply;
use crate::rc::{RawFields, RcloneApi};
use crate::runtime::ProfileRunner;
use crate::schema::{BackendType, FieldDefinition};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct ContinueCall {
    pub name: String,
    pub state: String,
    pub answer: String,
    pub params: RawFields,
}

#[derive(Debug, Clone)]
pub struct EntryCall {
    pub name: String,
    pub fields: RawFields,
}

#[derive(Default)]
pub struct ScriptedApi {
    replies: Mutex<VecDeque<AppResult<Value>>>,
    gate: Mutex<Option<Arc<Notify>>>,
    start_calls: Mutex<Vec<(String, String, RawFields)>>,
    continue_calls: Mutex<Vec<ContinueCall>>,
    cancel_calls: Mutex<Vec<String>>,
    create_calls: Mutex<Vec<EntryCall>>,
    update_calls: Mutex<Vec<EntryCall>>,
    fail_cancel: AtomicBool,
    fail_create: AtomicBool,
    schema_failure: Mutex<Option<String>>,
    remote_types: Mutex<Value>,
    flags: Mutex<HashMap<OperationKind, Value>>,
    flag_fetches: Mutex<HashMap<OperationKind, usize>>,
    remotes: Mutex<Vec<String>>,
    entries: Mutex<HashMap<String, RawFields>>,
    operations: Mutex<Vec<(String, Value)>>,
}

impl ScriptedApi {
    /// Queue the raw reply for the next start or continue call
    pub fn push_reply(&self, reply: AppResult<Value>) {
        self.replies.lock().push_back(reply);
    }

    /// Make the next start or continue call wait until the returned handle is notified
    pub fn hold_next_call(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&notify));
        notify
    }

    pub fn start_calls(&self) -> Vec<(String, String, RawFields)> {
        self.start_calls.lock().clone()
    }

    pub fn continue_calls(&self) -> Vec<ContinueCall> {
        self.continue_calls.lock().clone()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.cancel_calls.lock().clone()
    }

    pub fn create_calls(&self) -> Vec<EntryCall> {
        self.create_calls.lock().clone()
    }

    pub fn update_calls(&self) -> Vec<EntryCall> {
        self.update_calls.lock().clone()
    }

    pub fn fail_cancel(&self) {
        self.fail_cancel.store(true, Ordering::SeqCst);
    }

    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_schema(&self, message: &str) {
        *self.schema_failure.lock() = Some(message.to_string());
    }

    pub fn clear_schema_failure(&self) {
        *self.schema_failure.lock() = None;
    }

    pub fn set_remote_types(&self, types: Value) {
        *self.remote_types.lock() = types;
    }

    pub fn set_flags(&self, kind: OperationKind, flags: Value) {
        self.flags.lock().insert(kind, flags);
    }

    pub fn flag_fetches(&self, kind: OperationKind) -> usize {
        self.flag_fetches.lock().get(&kind).copied().unwrap_or(0)
    }

    pub fn set_remotes(&self, remotes: &[&str]) {
        *self.remotes.lock() = remotes.iter().map(|r| r.to_string()).collect();
    }

    pub fn set_entry(&self, name: &str, fields: Value) {
        if let Value::Object(fields) = fields {
            self.entries.lock().insert(name.to_string(), fields);
        }
    }

    pub fn operations(&self) -> Vec<(String, Value)> {
        self.operations.lock().clone()
    }

    fn schema_check(&self) -> AppResult<()> {
        match self.schema_failure.lock().clone() {
            Some(message) => Err(AppError::SchemaLoad(message)),
            None => Ok(()),
        }
    }

    async fn next_reply(&self) -> AppResult<InteractiveReply> {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::InteractiveProtocol("no scripted reply".into())))?;
        InteractiveReply::from_rclone(&reply)
    }
}

#[async_trait]
impl RcloneApi for ScriptedApi {
    async fn get_remote_types(&self) -> AppResult<Vec<BackendType>> {
        self.schema_check()?;
        let raw = self.remote_types.lock().clone();
        Ok(raw
            .as_array()
            .map(|types| {
                types
                    .iter()
                    .filter_map(|t| BackendType::from_rclone(t).ok())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_flag_fields(&self, kind: OperationKind) -> AppResult<Vec<FieldDefinition>> {
        *self.flag_fetches.lock().entry(kind).or_insert(0) += 1;
        self.schema_check()?;
        let raw = self.flags.lock().get(&kind).cloned().unwrap_or(Value::Null);
        Ok(FieldDefinition::list_from_rclone(&raw))
    }

    async fn list_remotes(&self) -> AppResult<Vec<String>> {
        Ok(self.remotes.lock().clone())
    }

    async fn get_backend_entry(&self, name: &str) -> AppResult<RawFields> {
        self.entries
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("no remote named {}", name)))
    }

    async fn start_interactive_config(
        &self,
        name: &str,
        remote_type: &str,
        params: &RawFields,
    ) -> AppResult<InteractiveReply> {
        self.start_calls
            .lock()
            .push((name.to_string(), remote_type.to_string(), params.clone()));
        self.next_reply().await
    }

    async fn continue_interactive_config(
        &self,
        name: &str,
        state_token: &str,
        answer: &str,
        params: &RawFields,
    ) -> AppResult<InteractiveReply> {
        self.continue_calls.lock().push(ContinueCall {
            name: name.to_string(),
            state: state_token.to_string(),
            answer: answer.to_string(),
            params: params.clone(),
        });
        self.next_reply().await
    }

    async fn cancel_interactive_config(&self, name: &str) -> AppResult<()> {
        self.cancel_calls.lock().push(name.to_string());
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(AppError::Network("cancel refused".into()));
        }
        Ok(())
    }

    async fn create_backend_entry(&self, name: &str, fields: &RawFields) -> AppResult<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppError::Network("create refused".into()));
        }
        self.create_calls.lock().push(EntryCall {
            name: name.to_string(),
            fields: fields.clone(),
        });
        Ok(())
    }

    async fn update_backend_entry(&self, name: &str, fields: &RawFields) -> AppResult<()> {
        self.update_calls.lock().push(EntryCall {
            name: name.to_string(),
            fields: fields.clone(),
        });
        Ok(())
    }

    async fn start_operation(&self, endpoint: &str, body: &Value) -> AppResult<Value> {
        self.operations
            .lock()
            .push((endpoint.to_string(), body.clone()));
        Ok(serde_json::json!({ "jobid": self.operations.lock().len() }))
    }
}

/// Records every start request; fails for one profile name if asked to
#[derive(Default)]
pub struct RecordingRunner {
    started: Mutex<Vec<(OperationKind, String, String)>>,
    fail_for: Mutex<Option<String>>,
}

impl RecordingRunner {
    pub fn fail_for(&self, profile: &str) {
        *self.fail_for.lock() = Some(profile.to_string());
    }

    pub fn started(&self) -> Vec<(OperationKind, String, String)> {
        let mut started = self.started.lock().clone();
        started.sort();
        started
    }
}

#[async_trait]
impl ProfileRunner for RecordingRunner {
    async fn start_profile(
        &self,
        kind: OperationKind,
        remote: &str,
        profile: &str,
    ) -> AppResult<Option<String>> {
        if self.fail_for.lock().as_deref() == Some(profile) {
            return Err(AppError::Unknown(format!("{} failed to start", profile)));
        }
        self.started
            .lock()
            .push((kind, remote.to_string(), profile.to_string()));
        Ok(None)
    }

    async fn release(&self, _kind: OperationKind, _handle: &str) -> bool {
        false
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    data: Mutex<HashMap<String, RemoteSettings>>,
    saves: Mutex<usize>,
    fail_saves: AtomicBool,
}

impl MemoryRepository {
    pub fn insert(&self, remote: &str, settings: RemoteSettings) {
        self.data.lock().insert(remote.to_string(), settings);
    }

    pub fn get(&self, remote: &str) -> Option<RemoteSettings> {
        self.data.lock().get(remote).cloned()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsRepository for MemoryRepository {
    async fn load(&self, remote: &str) -> AppResult<Option<RemoteSettings>> {
        Ok(self.get(remote))
    }

    async fn save(&self, remote: &str, settings: &RemoteSettings) -> AppResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("disk full".into()));
        }
        *self.saves.lock() += 1;
        self.insert(remote, settings.clone());
        Ok(())
    }
}
