use super::profiles::{OperationKind, OperationProfile, ProfileCollection, RemoteSettings, DEFAULT_PROFILE};
use crate::error::{AppError, AppResult};
use crate::logging::{self, LogLevel, LogSubsystem};
use crate::path_codec::{self, PathDescriptor, PathType};
use crate::runtime::{self, ProfileBindings};
use crate::schema::FieldDefinition;
use crate::wizard::form::OptionsForm;
use serde_json::Value;
use std::sync::Arc;

/// Editable copy of the selected profile
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub auto_start: bool,
    pub cron_enabled: Option<bool>,
    pub cron_expression: Option<String>,
    pub source: Option<PathDescriptor>,
    pub dest: Option<PathDescriptor>,
    pub options: OptionsForm,
    pub vfs_profile: Option<String>,
    pub filter_profile: Option<String>,
    pub backend_profile: Option<String>,
}

impl ProfileForm {
    fn load(&mut self, profile: &OperationProfile, remote: &str) {
        self.auto_start = profile.auto_start;
        self.cron_enabled = profile.cron_enabled;
        self.cron_expression = profile.cron_expression.clone();
        self.source = profile
            .source
            .as_deref()
            .map(|s| path_codec::parse(s, &PathType::CurrentRemote, remote));
        self.dest = profile
            .dest
            .as_deref()
            .map(|s| path_codec::parse(s, &PathType::Local, remote));
        self.options.load(&profile.options);
        self.vfs_profile = profile.vfs_profile.clone();
        self.filter_profile = profile.filter_profile.clone();
        self.backend_profile = profile.backend_profile.clone();
    }

    /// Plain profile value, independent of the form
    fn to_profile(&self, remote: &str) -> OperationProfile {
        OperationProfile {
            auto_start: self.auto_start,
            cron_enabled: self.cron_enabled,
            cron_expression: self.cron_expression.clone(),
            source: self.source.as_ref().map(|d| path_codec::build(d, remote)),
            dest: self.dest.as_ref().map(|d| path_codec::build(d, remote)),
            options: self.options.changed_payload(),
            vfs_profile: self.vfs_profile.clone(),
            filter_profile: self.filter_profile.clone(),
            backend_profile: self.backend_profile.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileMode {
    Idle,
    Adding { suggested: String },
    Renaming { original: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Unchanged,
    Added(String),
    Renamed { from: String, to: String },
}

/// A rename not yet applied to running bindings; `from` is the saved name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRename {
    pub kind: OperationKind,
    pub from: String,
    pub to: String,
}

struct KindProfiles {
    kind: OperationKind,
    collection: ProfileCollection,
    selected: String,
    mode: ProfileMode,
    form: ProfileForm,
    schema: Vec<FieldDefinition>,
}

/// Profiles of every operation kind for the remote open in one wizard.
///
/// Exactly one profile per kind is selected; its values live in the form
/// until [`save`](Self::save) writes them back. Renames reach running
/// bindings only through [`apply_renames`](Self::apply_renames), once the
/// new names are persisted.
pub struct ProfileStore {
    remote: String,
    kinds: Vec<KindProfiles>,
    bindings: Vec<Arc<dyn ProfileBindings>>,
    pending_renames: Vec<PendingRename>,
}

fn slot_index(kind: OperationKind) -> usize {
    OperationKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default()
}

impl ProfileStore {
    pub fn new(
        remote: &str,
        settings: &RemoteSettings,
        bindings: Vec<Arc<dyn ProfileBindings>>,
    ) -> Self {
        let kinds = OperationKind::ALL
            .iter()
            .map(|kind| {
                let collection = settings.section(*kind).cloned().unwrap_or_default();
                let mut form = ProfileForm::default();
                if let Some(profile) = collection.get(DEFAULT_PROFILE) {
                    form.load(profile, remote);
                }
                KindProfiles {
                    kind: *kind,
                    collection,
                    selected: DEFAULT_PROFILE.to_string(),
                    mode: ProfileMode::Idle,
                    form,
                    schema: Vec::new(),
                }
            })
            .collect();

        Self {
            remote: remote.to_string(),
            kinds,
            bindings,
            pending_renames: Vec::new(),
        }
    }

    fn slot(&self, kind: OperationKind) -> &KindProfiles {
        &self.kinds[slot_index(kind)]
    }

    fn slot_mut(&mut self, kind: OperationKind) -> &mut KindProfiles {
        &mut self.kinds[slot_index(kind)]
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Change the remote that `currentRemote` paths resolve against
    pub fn set_remote(&mut self, remote: &str) {
        self.remote = remote.to_string();
    }

    pub fn selected(&self, kind: OperationKind) -> &str {
        &self.slot(kind).selected
    }

    pub fn mode(&self, kind: OperationKind) -> &ProfileMode {
        &self.slot(kind).mode
    }

    pub fn names(&self, kind: OperationKind) -> Vec<String> {
        self.slot(kind).collection.names()
    }

    pub fn collection(&self, kind: OperationKind) -> &ProfileCollection {
        &self.slot(kind).collection
    }

    pub fn form(&self, kind: OperationKind) -> &ProfileForm {
        &self.slot(kind).form
    }

    pub fn form_mut(&mut self, kind: OperationKind) -> &mut ProfileForm {
        &mut self.slot_mut(kind).form
    }

    pub fn schema(&self, kind: OperationKind) -> &[FieldDefinition] {
        &self.slot(kind).schema
    }

    /// Install the flag schema for `kind`, keeping edits already made
    pub fn set_schema(&mut self, kind: OperationKind, defs: Vec<FieldDefinition>) {
        let slot = self.slot_mut(kind);
        slot.form.options.rebase(&defs);
        slot.schema = defs;
    }

    pub fn set_option(&mut self, kind: OperationKind, name: &str, value: Value) {
        self.slot_mut(kind).form.options.set(name, value);
    }

    pub fn reset_option(&mut self, kind: OperationKind, name: &str) {
        self.slot_mut(kind).form.options.reset(name);
    }

    /// Write the form into the collection under the selected name
    pub fn save(&mut self, kind: OperationKind) {
        let remote = self.remote.clone();
        let slot = self.slot_mut(kind);
        let profile = slot.form.to_profile(&remote);
        slot.collection.put(&slot.selected, profile);
    }

    pub fn save_all(&mut self) {
        for kind in OperationKind::ALL {
            self.save(kind);
        }
    }

    /// Save the current profile, then load `name` into the form
    pub fn select(&mut self, kind: OperationKind, name: &str) -> AppResult<()> {
        if !self.slot(kind).collection.contains(name) {
            return Err(AppError::ProfileNotFound(name.to_string()));
        }
        self.save(kind);
        self.load_selected(kind, name);
        Ok(())
    }

    fn load_selected(&mut self, kind: OperationKind, name: &str) {
        let remote = self.remote.clone();
        let slot = self.slot_mut(kind);
        slot.selected = name.to_string();
        slot.mode = ProfileMode::Idle;
        let profile = slot.collection.get(name).cloned().unwrap_or_default();
        slot.form.load(&profile, &remote);
    }

    /// Enter add mode with the first free `profile-N` as suggestion
    pub fn add(&mut self, kind: OperationKind) -> String {
        let slot = self.slot_mut(kind);
        let suggested = slot.collection.next_free_name();
        slot.mode = ProfileMode::Adding {
            suggested: suggested.clone(),
        };
        suggested
    }

    /// Enter rename mode; refused for the default profile
    pub fn edit(&mut self, kind: OperationKind) -> bool {
        let slot = self.slot_mut(kind);
        if slot.selected == DEFAULT_PROFILE {
            return false;
        }
        slot.mode = ProfileMode::Renaming {
            original: slot.selected.clone(),
        };
        true
    }

    pub fn cancel_edit(&mut self, kind: OperationKind) {
        self.slot_mut(kind).mode = ProfileMode::Idle;
    }

    /// Finish add or rename mode with `new_name`
    pub fn commit(&mut self, kind: OperationKind, new_name: &str) -> AppResult<CommitOutcome> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Ok(CommitOutcome::Unchanged);
        }

        match self.slot(kind).mode.clone() {
            ProfileMode::Idle => Err(AppError::InvalidState(format!(
                "no {} profile is being added or renamed",
                kind
            ))),
            ProfileMode::Adding { .. } => {
                if self.slot(kind).collection.contains(new_name) {
                    return Err(AppError::ProfileNameTaken(new_name.to_string()));
                }
                self.save(kind);
                self.slot_mut(kind)
                    .collection
                    .put(new_name, OperationProfile::default());
                self.load_selected(kind, new_name);
                logging::log_remote(
                    LogLevel::Info,
                    LogSubsystem::Profiles,
                    &self.remote,
                    format!("Added {} profile '{}'", kind, new_name),
                );
                Ok(CommitOutcome::Added(new_name.to_string()))
            }
            ProfileMode::Renaming { original } => {
                if original == new_name {
                    self.cancel_edit(kind);
                    return Ok(CommitOutcome::Unchanged);
                }
                if self.slot(kind).collection.contains(new_name) {
                    return Err(AppError::ProfileNameTaken(new_name.to_string()));
                }
                self.save(kind);
                {
                    let slot = self.slot_mut(kind);
                    slot.collection.rename(&original, new_name)?;
                    slot.selected = new_name.to_string();
                    slot.mode = ProfileMode::Idle;
                }

                self.queue_rename(kind, &original, new_name);
                logging::log_remote(
                    LogLevel::Info,
                    LogSubsystem::Profiles,
                    &self.remote,
                    format!("Renamed {} profile '{}' to '{}'", kind, original, new_name),
                );
                Ok(CommitOutcome::Renamed {
                    from: original,
                    to: new_name.to_string(),
                })
            }
        }
    }

    /// Chain onto an earlier rename of the same profile so `from` stays the saved name
    fn queue_rename(&mut self, kind: OperationKind, from: &str, to: &str) {
        match self
            .pending_renames
            .iter()
            .position(|r| r.kind == kind && r.to == from)
        {
            Some(i) if self.pending_renames[i].from == to => {
                self.pending_renames.remove(i);
            }
            Some(i) => self.pending_renames[i].to = to.to_string(),
            // `from` was itself freed by an earlier rename, so nothing runs under it
            None if self
                .pending_renames
                .iter()
                .any(|r| r.kind == kind && r.from == from) => {}
            None => self.pending_renames.push(PendingRename {
                kind,
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn pending_renames(&self) -> &[PendingRename] {
        &self.pending_renames
    }

    /// Name running bindings know `name` by, or `None` for a profile that
    /// only exists in this store
    fn bound_name(&self, kind: OperationKind, name: &str) -> Option<String> {
        let mut renames = self.pending_renames.iter().filter(|r| r.kind == kind);
        if let Some(rename) = renames.clone().find(|r| r.to == name) {
            return Some(rename.from.clone());
        }
        if renames.any(|r| r.from == name) {
            return None;
        }
        Some(name.to_string())
    }

    /// Move running bindings of `kinds` to the committed names.
    /// Call once the renamed profiles are persisted.
    pub async fn apply_renames(&mut self, kinds: &[OperationKind]) -> usize {
        let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_renames)
            .into_iter()
            .partition(|r| kinds.contains(&r.kind));
        self.pending_renames = rest;

        let mut total = 0;
        for rename in due {
            let report = runtime::rename_cascade(
                &self.bindings,
                &self.remote,
                rename.kind,
                &rename.from,
                &rename.to,
            )
            .await;
            if report.total() > 0 {
                logging::log_remote(
                    LogLevel::Info,
                    LogSubsystem::Profiles,
                    &self.remote,
                    format!(
                        "{} running binding(s) moved from {} profile '{}' to '{}'",
                        report.total(),
                        rename.kind,
                        rename.from,
                        rename.to
                    ),
                );
            }
            total += report.total();
        }
        total
    }

    /// Remove a profile that nothing is running from
    pub async fn delete(&mut self, kind: OperationKind, name: &str) -> AppResult<()> {
        if name == DEFAULT_PROFILE {
            return Err(AppError::ProfileProtected(name.to_string()));
        }
        if !self.slot(kind).collection.contains(name) {
            return Err(AppError::ProfileNotFound(name.to_string()));
        }

        let usage = match self.bound_name(kind, name) {
            Some(bound) => runtime::find_usage(&self.bindings, &self.remote, kind, &bound).await?,
            None => None,
        };
        if let Some((subsystem, count)) = usage {
            logging::log_remote(
                LogLevel::Warn,
                LogSubsystem::Profiles,
                &self.remote,
                format!(
                    "Refusing to delete {} profile '{}': {} {} binding(s) active",
                    kind, name, count, subsystem
                ),
            );
            return Err(AppError::ProfileUsageConflict {
                profile: name.to_string(),
                count,
                subsystem: subsystem.to_string(),
            });
        }

        let was_selected = self.slot(kind).selected == name;
        self.slot_mut(kind).collection.remove(name)?;
        self.pending_renames.retain(|r| !(r.kind == kind && r.to == name));
        if was_selected {
            let fallback = self.slot(kind).collection.first_name();
            self.load_selected(kind, &fallback);
        }
        logging::log_remote(
            LogLevel::Info,
            LogSubsystem::Profiles,
            &self.remote,
            format!("Deleted {} profile '{}'", kind, name),
        );
        Ok(())
    }

    /// Saved collections of every kind written into `base`
    pub fn export(&mut self, mut base: RemoteSettings) -> RemoteSettings {
        self.save_all();
        for slot in &self.kinds {
            base.set_section(slot.kind, slot.collection.clone());
        }
        base
    }

    /// Saved collection of one kind
    pub fn export_kind(&mut self, kind: OperationKind) -> ProfileCollection {
        self.save(kind);
        self.slot(kind).collection.clone()
    }
}
