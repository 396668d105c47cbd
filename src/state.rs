use crate::config::{AppSettings, JsonFileRepository, SettingsRepository};
use crate::error::AppResult;
use crate::rc::{RcClient, RcloneApi};
use crate::runtime::{BindingTable, ProfileBindings, ProfileRunner, RcProfileRunner, Subsystem};
use crate::schema::SchemaCache;
use crate::validation::ValidatorRegistry;
use crate::wizard::{ConfigWizard, WizardDeps, WizardMode};
use parking_lot::RwLock;
use std::sync::Arc;

/// Global application state
pub struct AppState {
    pub settings: Arc<RwLock<AppSettings>>,
    pub api: Arc<dyn RcloneApi>,
    pub schemas: Arc<SchemaCache>,
    pub validators: Arc<ValidatorRegistry>,
    pub repository: Arc<dyn SettingsRepository>,
    pub runner: Arc<dyn ProfileRunner>,
    pub jobs: Arc<BindingTable>,
    pub mounts: Arc<BindingTable>,
    pub serves: Arc<BindingTable>,
}

impl AppState {
    pub fn new(settings: AppSettings) -> AppResult<Self> {
        let api: Arc<dyn RcloneApi> = Arc::new(RcClient::new(&settings.rc)?);
        let repository = Arc::new(JsonFileRepository::new(crate::config::get_remotes_dir()?));
        Ok(Self::with_parts(settings, api, repository))
    }

    /// Assemble state around an already-built backend and repository
    pub fn with_parts(
        settings: AppSettings,
        api: Arc<dyn RcloneApi>,
        repository: Arc<dyn SettingsRepository>,
    ) -> Self {
        let jobs = Arc::new(BindingTable::new(Subsystem::Jobs));
        let mounts = Arc::new(BindingTable::new(Subsystem::Mounts));
        let serves = Arc::new(BindingTable::new(Subsystem::Serves));
        let runner = Arc::new(RcProfileRunner::new(
            Arc::clone(&api),
            Arc::clone(&repository),
            vec![jobs.clone(), mounts.clone(), serves.clone()],
        ));

        Self {
            settings: Arc::new(RwLock::new(settings)),
            schemas: Arc::new(SchemaCache::new(Arc::clone(&api))),
            api,
            validators: Arc::new(ValidatorRegistry::default()),
            repository,
            runner,
            jobs,
            mounts,
            serves,
        }
    }

    pub fn bindings(&self) -> Vec<Arc<dyn ProfileBindings>> {
        vec![
            self.jobs.clone() as Arc<dyn ProfileBindings>,
            self.mounts.clone() as Arc<dyn ProfileBindings>,
            self.serves.clone() as Arc<dyn ProfileBindings>,
        ]
    }

    pub fn deps(&self) -> WizardDeps {
        WizardDeps {
            api: Arc::clone(&self.api),
            schemas: Arc::clone(&self.schemas),
            validators: Arc::clone(&self.validators),
            repository: Arc::clone(&self.repository),
            runner: Arc::clone(&self.runner),
            bindings: self.bindings(),
            settings: self.settings.read().wizard.clone(),
        }
    }

    pub async fn open_wizard(&self, mode: WizardMode, remote: Option<&str>) -> AppResult<ConfigWizard> {
        ConfigWizard::open(self.deps(), mode, remote).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationKind;
    use crate::config::{OperationProfile, RemoteSettings};
    use crate::test_support::{MemoryRepository, ScriptedApi};

    fn state() -> AppState {
        AppState::with_parts(
            AppSettings::default(),
            Arc::new(ScriptedApi::default()),
            Arc::new(MemoryRepository::default()),
        )
    }

    #[tokio::test]
    async fn test_wizard_sees_every_binding_table() {
        let state = state();
        state.mounts.bind("gdrive", OperationKind::Mount, "media").await;

        let mut wizard = state
            .open_wizard(WizardMode::EditKind(OperationKind::Mount), Some("gdrive"))
            .await
            .unwrap();
        let store = wizard.profiles_mut();
        store.add(OperationKind::Mount);
        store.commit(OperationKind::Mount, "media").unwrap();

        let err = store.delete(OperationKind::Mount, "media").await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::ProfileUsageConflict { .. }));
    }

    #[tokio::test]
    async fn test_runner_binds_into_state_tables() {
        let repo = Arc::new(MemoryRepository::default());
        let mut settings = RemoteSettings::default();
        settings.section_mut(OperationKind::Copy).put(
            "archive",
            OperationProfile {
                source: Some("gdrive:docs".into()),
                dest: Some("/archive".into()),
                ..Default::default()
            },
        );
        repo.insert("gdrive", settings);
        let state = AppState::with_parts(AppSettings::default(), Arc::new(ScriptedApi::default()), repo);

        state
            .runner
            .start_profile(OperationKind::Copy, "gdrive", "archive")
            .await
            .unwrap();
        assert_eq!(state.jobs.list().await[0].profile, "archive");
        assert!(state.mounts.list().await.is_empty());
    }

    #[test]
    fn test_deps_follow_current_settings() {
        let state = state();
        state.settings.write().wizard.show_on_tray = false;
        assert!(!state.deps().settings.show_on_tray);
        assert_eq!(state.bindings().len(), 3);
    }
}
