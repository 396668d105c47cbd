use crate::error::{AppError, AppResult};
use crate::runtime::Subsystem;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the profile every collection keeps
pub const DEFAULT_PROFILE: &str = "default";

/// Operation kinds that carry per-remote profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Mount,
    Sync,
    Copy,
    Move,
    Bisync,
    Serve,
    Filter,
    Vfs,
    Backend,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        OperationKind::Mount,
        OperationKind::Sync,
        OperationKind::Copy,
        OperationKind::Move,
        OperationKind::Bisync,
        OperationKind::Serve,
        OperationKind::Filter,
        OperationKind::Vfs,
        OperationKind::Backend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Mount => "mount",
            OperationKind::Sync => "sync",
            OperationKind::Copy => "copy",
            OperationKind::Move => "move",
            OperationKind::Bisync => "bisync",
            OperationKind::Serve => "serve",
            OperationKind::Filter => "filter",
            OperationKind::Vfs => "vfs",
            OperationKind::Backend => "backend",
        }
    }

    /// Key of this kind's section in persisted remote settings
    pub fn config_key(&self) -> &'static str {
        match self {
            OperationKind::Mount => "mountConfigs",
            OperationKind::Sync => "syncConfigs",
            OperationKind::Copy => "copyConfigs",
            OperationKind::Move => "moveConfigs",
            OperationKind::Bisync => "bisyncConfigs",
            OperationKind::Serve => "serveConfigs",
            OperationKind::Filter => "filterConfigs",
            OperationKind::Vfs => "vfsConfigs",
            OperationKind::Backend => "backendConfigs",
        }
    }

    /// `options/info` block holding this kind's flags
    pub fn options_block(&self) -> &'static str {
        match self {
            OperationKind::Mount => "mount",
            OperationKind::Vfs => "vfs",
            OperationKind::Filter => "filter",
            OperationKind::Serve => "http",
            OperationKind::Sync
            | OperationKind::Copy
            | OperationKind::Move
            | OperationKind::Bisync
            | OperationKind::Backend => "main",
        }
    }

    /// Whether profiles of this kind can be started (and autostarted)
    pub fn is_runnable(&self) -> bool {
        self.binding_subsystem().is_some()
    }

    /// Subsystem holding live bindings for this kind
    pub fn binding_subsystem(&self) -> Option<Subsystem> {
        match self {
            OperationKind::Mount => Some(Subsystem::Mounts),
            OperationKind::Serve => Some(Subsystem::Serves),
            OperationKind::Sync
            | OperationKind::Copy
            | OperationKind::Move
            | OperationKind::Bisync => Some(Subsystem::Jobs),
            OperationKind::Filter | OperationKind::Vfs | OperationKind::Backend => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named variant of an operation's settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationProfile {
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vfs_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_profile: Option<String>,
}

/// Profiles of one kind for one remote, in name order.
/// Always holds a [`DEFAULT_PROFILE`] entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, OperationProfile>",
    into = "BTreeMap<String, OperationProfile>"
)]
pub struct ProfileCollection {
    profiles: BTreeMap<String, OperationProfile>,
}

impl From<BTreeMap<String, OperationProfile>> for ProfileCollection {
    fn from(mut profiles: BTreeMap<String, OperationProfile>) -> Self {
        profiles
            .entry(DEFAULT_PROFILE.to_string())
            .or_default();
        Self { profiles }
    }
}

impl From<ProfileCollection> for BTreeMap<String, OperationProfile> {
    fn from(collection: ProfileCollection) -> Self {
        collection.profiles
    }
}

impl Default for ProfileCollection {
    fn default() -> Self {
        Self::from(BTreeMap::new())
    }
}

impl ProfileCollection {
    pub fn get(&self, name: &str) -> Option<&OperationProfile> {
        self.profiles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OperationProfile)> {
        self.profiles.iter()
    }

    /// First name in order; the collection is never empty
    pub fn first_name(&self) -> String {
        self.profiles
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    /// Insert or replace
    pub fn put(&mut self, name: &str, profile: OperationProfile) {
        self.profiles.insert(name.to_string(), profile);
    }

    /// Re-key a profile, keeping its settings
    pub fn rename(&mut self, old: &str, new: &str) -> AppResult<()> {
        if old == DEFAULT_PROFILE {
            return Err(AppError::ProfileProtected(old.to_string()));
        }
        if self.profiles.contains_key(new) {
            return Err(AppError::ProfileNameTaken(new.to_string()));
        }
        let profile = self
            .profiles
            .remove(old)
            .ok_or_else(|| AppError::ProfileNotFound(old.to_string()))?;
        self.profiles.insert(new.to_string(), profile);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> AppResult<OperationProfile> {
        if name == DEFAULT_PROFILE {
            return Err(AppError::ProfileProtected(name.to_string()));
        }
        let removed = self
            .profiles
            .remove(name)
            .ok_or_else(|| AppError::ProfileNotFound(name.to_string()))?;
        if self.profiles.is_empty() {
            self.profiles
                .insert(DEFAULT_PROFILE.to_string(), OperationProfile::default());
        }
        Ok(removed)
    }

    /// First `profile-N` not yet taken, counting from 1
    pub fn next_free_name(&self) -> String {
        (1..)
            .map(|n| format!("profile-{}", n))
            .find(|name| !self.profiles.contains_key(name))
            .unwrap_or_else(|| format!("profile-{}", self.profiles.len() + 1))
    }
}

fn default_true() -> bool {
    true
}

/// Persisted per-remote settings: one profile section per operation kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_configs: Option<ProfileCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_configs: Option<ProfileCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_configs: Option<ProfileCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_configs: Option<ProfileCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bisync_configs: Option<ProfileCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve_configs: Option<ProfileCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_configs: Option<ProfileCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vfs_configs: Option<ProfileCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_configs: Option<ProfileCollection>,
    #[serde(default = "default_true")]
    pub show_on_tray: bool,
    /// Keys written by other parts of the application
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            mount_configs: None,
            sync_configs: None,
            copy_configs: None,
            move_configs: None,
            bisync_configs: None,
            serve_configs: None,
            filter_configs: None,
            vfs_configs: None,
            backend_configs: None,
            show_on_tray: true,
            extra: Map::new(),
        }
    }
}

impl RemoteSettings {
    pub fn section(&self, kind: OperationKind) -> Option<&ProfileCollection> {
        match kind {
            OperationKind::Mount => self.mount_configs.as_ref(),
            OperationKind::Sync => self.sync_configs.as_ref(),
            OperationKind::Copy => self.copy_configs.as_ref(),
            OperationKind::Move => self.move_configs.as_ref(),
            OperationKind::Bisync => self.bisync_configs.as_ref(),
            OperationKind::Serve => self.serve_configs.as_ref(),
            OperationKind::Filter => self.filter_configs.as_ref(),
            OperationKind::Vfs => self.vfs_configs.as_ref(),
            OperationKind::Backend => self.backend_configs.as_ref(),
        }
    }

    fn slot(&mut self, kind: OperationKind) -> &mut Option<ProfileCollection> {
        match kind {
            OperationKind::Mount => &mut self.mount_configs,
            OperationKind::Sync => &mut self.sync_configs,
            OperationKind::Copy => &mut self.copy_configs,
            OperationKind::Move => &mut self.move_configs,
            OperationKind::Bisync => &mut self.bisync_configs,
            OperationKind::Serve => &mut self.serve_configs,
            OperationKind::Filter => &mut self.filter_configs,
            OperationKind::Vfs => &mut self.vfs_configs,
            OperationKind::Backend => &mut self.backend_configs,
        }
    }

    /// Section for `kind`, created with a default profile if missing
    pub fn section_mut(&mut self, kind: OperationKind) -> &mut ProfileCollection {
        self.slot(kind).get_or_insert_with(ProfileCollection::default)
    }

    pub fn set_section(&mut self, kind: OperationKind, collection: ProfileCollection) {
        *self.slot(kind) = Some(collection);
    }

    /// Profiles flagged for autostart, in kind order
    pub fn autostart_profiles(&self) -> Vec<(OperationKind, String)> {
        OperationKind::ALL
            .iter()
            .filter(|kind| kind.is_runnable())
            .filter_map(|kind| self.section(*kind).map(|section| (*kind, section)))
            .flat_map(|(kind, section)| {
                section
                    .iter()
                    .filter(|(_, profile)| profile.auto_start)
                    .map(move |(name, _)| (kind, name.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_always_has_default() {
        let collection: ProfileCollection =
            serde_json::from_value(json!({"nightly": {"autoStart": true}})).unwrap();
        assert!(collection.contains(DEFAULT_PROFILE));
        assert!(collection.get("nightly").unwrap().auto_start);
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_rename_and_remove_protect_default() {
        let mut collection = ProfileCollection::default();
        collection.put("profile-1", OperationProfile::default());
        assert!(matches!(
            collection.rename(DEFAULT_PROFILE, "x"),
            Err(AppError::ProfileProtected(_))
        ));
        assert!(matches!(
            collection.rename("profile-1", DEFAULT_PROFILE),
            Err(AppError::ProfileNameTaken(_))
        ));
        assert!(matches!(
            collection.remove(DEFAULT_PROFILE),
            Err(AppError::ProfileProtected(_))
        ));
        collection.rename("profile-1", "archive").unwrap();
        assert_eq!(collection.names(), vec!["archive", "default"]);
    }

    #[test]
    fn test_next_free_name() {
        let mut collection = ProfileCollection::default();
        assert_eq!(collection.next_free_name(), "profile-1");
        collection.put("profile-1", OperationProfile::default());
        collection.put("profile-3", OperationProfile::default());
        assert_eq!(collection.next_free_name(), "profile-2");
    }

    #[test]
    fn test_remote_settings_shape() {
        let mut settings = RemoteSettings::default();
        let mut profile = OperationProfile {
            auto_start: true,
            source: Some("gdrive:photos".into()),
            dest: Some("/mnt/photos".into()),
            vfs_profile: Some("default".into()),
            ..Default::default()
        };
        profile.options.insert("allow_other".into(), json!(true));
        settings.section_mut(OperationKind::Mount).put("photos", profile);

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["showOnTray"], true);
        assert_eq!(json["mountConfigs"]["photos"]["autoStart"], true);
        assert_eq!(json["mountConfigs"]["photos"]["vfsProfile"], "default");
        assert_eq!(json["mountConfigs"]["photos"]["options"]["allow_other"], true);
        assert!(json["mountConfigs"]["default"].is_object());
        assert!(json.get("syncConfigs").is_none());

        let back: RemoteSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
        assert_eq!(
            back.autostart_profiles(),
            vec![(OperationKind::Mount, "photos".to_string())]
        );
    }

    #[test]
    fn test_unknown_keys_survive() {
        let raw = json!({"showOnTray": false, "remoteColor": "#ff0000", "vfsConfigs": {}});
        let settings: RemoteSettings = serde_json::from_value(raw).unwrap();
        assert!(!settings.show_on_tray);
        assert_eq!(settings.extra.get("remoteColor"), Some(&json!("#ff0000")));
        assert!(settings.section(OperationKind::Vfs).unwrap().contains(DEFAULT_PROFILE));
    }

    #[test]
    fn test_kind_mappings() {
        assert_eq!(OperationKind::Serve.options_block(), "http");
        assert_eq!(OperationKind::Bisync.options_block(), "main");
        assert_eq!(OperationKind::Bisync.binding_subsystem(), Some(Subsystem::Jobs));
        assert!(!OperationKind::Vfs.is_runnable());
        assert_eq!(OperationKind::Move.config_key(), "moveConfigs");
    }
}
