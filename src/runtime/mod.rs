//! Live operations bound to profiles
//!
//! Jobs, mounts and serves each remember which profile they were started
//! from. They are owned elsewhere; this module only defines how the
//! configuration core asks them about profile usage and tells them about
//! renames, plus how it starts a profile.

pub mod runner;

pub use runner::RcProfileRunner;

use crate::config::OperationKind;
use crate::error::AppResult;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Owner of running operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Jobs,
    Mounts,
    Serves,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::Jobs => write!(f, "jobs"),
            Subsystem::Mounts => write!(f, "mounts"),
            Subsystem::Serves => write!(f, "serves"),
        }
    }
}

/// A running operation started from a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub id: Uuid,
    pub remote: String,
    pub kind: OperationKind,
    pub profile: String,
    /// Job id, mount point or serve id the daemon reported
    pub handle: Option<String>,
}

#[async_trait]
pub trait ProfileBindings: Send + Sync {
    fn subsystem(&self) -> Subsystem;

    async fn bindings_for_profile(
        &self,
        remote: &str,
        kind: OperationKind,
        profile: &str,
    ) -> AppResult<Vec<Binding>>;

    /// Point every binding of `old` at `new`; returns how many changed.
    /// Calling it twice is harmless.
    async fn rename_profile(
        &self,
        remote: &str,
        kind: OperationKind,
        old: &str,
        new: &str,
    ) -> AppResult<usize>;
}

/// Starts an operation from a saved profile
#[async_trait]
pub trait ProfileRunner: Send + Sync {
    /// Returns the handle the daemon knows the new operation by, when it
    /// reported one
    async fn start_profile(&self, kind: OperationKind, remote: &str, profile: &str)
        -> AppResult<Option<String>>;

    /// Forget the binding of a stopped operation so its profile can be deleted
    async fn release(&self, kind: OperationKind, handle: &str) -> bool;
}

/// In-memory binding registry for one subsystem
pub struct BindingTable {
    subsystem: Subsystem,
    rows: RwLock<Vec<Binding>>,
}

impl BindingTable {
    pub fn new(subsystem: Subsystem) -> Self {
        Self {
            subsystem,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub async fn bind(&self, remote: &str, kind: OperationKind, profile: &str) -> Uuid {
        self.bind_with_handle(remote, kind, profile, None).await
    }

    pub async fn bind_with_handle(
        &self,
        remote: &str,
        kind: OperationKind,
        profile: &str,
        handle: Option<String>,
    ) -> Uuid {
        let binding = Binding {
            id: Uuid::new_v4(),
            remote: remote.to_string(),
            kind,
            profile: profile.to_string(),
            handle,
        };
        let id = binding.id;
        self.rows.write().await.push(binding);
        id
    }

    pub async fn unbind(&self, id: Uuid) -> bool {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|b| b.id != id);
        rows.len() != before
    }

    /// Drop the binding carrying `handle`
    pub async fn release(&self, handle: &str) -> bool {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|b| b.handle.as_deref() != Some(handle));
        rows.len() != before
    }

    pub async fn list(&self) -> Vec<Binding> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl ProfileBindings for BindingTable {
    fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    async fn bindings_for_profile(
        &self,
        remote: &str,
        kind: OperationKind,
        profile: &str,
    ) -> AppResult<Vec<Binding>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|b| b.remote == remote && b.kind == kind && b.profile == profile)
            .cloned()
            .collect())
    }

    async fn rename_profile(
        &self,
        remote: &str,
        kind: OperationKind,
        old: &str,
        new: &str,
    ) -> AppResult<usize> {
        let mut rows = self.rows.write().await;
        let mut updated = 0;
        for binding in rows
            .iter_mut()
            .filter(|b| b.remote == remote && b.kind == kind && b.profile == old)
        {
            binding.profile = new.to_string();
            updated += 1;
        }
        Ok(updated)
    }
}

/// Per-subsystem result of a rename broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameReport {
    pub counts: Vec<(Subsystem, usize)>,
}

impl RenameReport {
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

/// Tell every subsystem about a rename. A failing subsystem is logged and
/// counted as zero; the others are still updated.
pub async fn rename_cascade(
    bindings: &[Arc<dyn ProfileBindings>],
    remote: &str,
    kind: OperationKind,
    old: &str,
    new: &str,
) -> RenameReport {
    let results = join_all(
        bindings
            .iter()
            .map(|b| async move { (b.subsystem(), b.rename_profile(remote, kind, old, new).await) }),
    )
    .await;

    let counts = results
        .into_iter()
        .map(|(subsystem, result)| match result {
            Ok(count) => (subsystem, count),
            Err(e) => {
                tracing::warn!("Rename of '{}' in {} failed: {}", old, subsystem, e);
                (subsystem, 0)
            }
        })
        .collect();

    RenameReport { counts }
}

/// First subsystem still using `profile`, with its binding count
pub async fn find_usage(
    bindings: &[Arc<dyn ProfileBindings>],
    remote: &str,
    kind: OperationKind,
    profile: &str,
) -> AppResult<Option<(Subsystem, usize)>> {
    for owner in bindings {
        let rows = owner.bindings_for_profile(remote, kind, profile).await?;
        if !rows.is_empty() {
            return Ok(Some((owner.subsystem(), rows.len())));
        }
    }
    Ok(None)
}
