//! rclone remote-control collaborator
//!
//! Everything the configuration core needs from the backend goes through
//! [`RcloneApi`]. [`RcClient`] talks to a running rclone daemon over HTTP;
//! tests substitute scripted implementations.

pub mod client;
pub mod endpoints;

pub use client::RcClient;

use crate::config::OperationKind;
use crate::error::AppResult;
use crate::interactive::InteractiveReply;
use crate::schema::{BackendType, FieldDefinition};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Raw backend fields keyed by option name
pub type RawFields = Map<String, Value>;

#[async_trait]
pub trait RcloneApi: Send + Sync {
    /// Storage backend types with their option schemas
    async fn get_remote_types(&self) -> AppResult<Vec<BackendType>>;

    /// Option schema for one backend type
    async fn get_remote_config_fields(&self, remote_type: &str) -> AppResult<Vec<FieldDefinition>> {
        let types = self.get_remote_types().await?;
        Ok(types
            .into_iter()
            .find(|t| t.name == remote_type)
            .map(|t| t.options)
            .unwrap_or_default())
    }

    /// Flag schema for one operation kind
    async fn get_flag_fields(&self, kind: OperationKind) -> AppResult<Vec<FieldDefinition>>;

    /// Names of the remotes currently configured in the backend
    async fn list_remotes(&self) -> AppResult<Vec<String>>;

    /// Stored fields of one backend entry, including `type`
    async fn get_backend_entry(&self, name: &str) -> AppResult<RawFields>;

    async fn start_interactive_config(
        &self,
        name: &str,
        remote_type: &str,
        params: &RawFields,
    ) -> AppResult<InteractiveReply>;

    async fn continue_interactive_config(
        &self,
        name: &str,
        state_token: &str,
        answer: &str,
        params: &RawFields,
    ) -> AppResult<InteractiveReply>;

    async fn cancel_interactive_config(&self, name: &str) -> AppResult<()>;

    /// Create a backend entry; `fields` carries the `type` key
    async fn create_backend_entry(&self, name: &str, fields: &RawFields) -> AppResult<()>;

    async fn update_backend_entry(&self, name: &str, fields: &RawFields) -> AppResult<()>;

    /// Launch an asynchronous operation (mount, sync, serve...); returns the raw reply
    async fn start_operation(&self, endpoint: &str, body: &Value) -> AppResult<Value>;
}
