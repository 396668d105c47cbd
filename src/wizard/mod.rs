//! Remote configuration wizard
//!
//! [`ConfigWizard`] walks the remote identity page and one page per operation
//! kind, keeps profile edits in a [`ProfileStore`], and on submit creates or
//! updates the backend entry, persists the assembled settings and fires
//! autostart requests. Nothing is persisted before submit; closing the wizard
//! discards all edits.

pub mod form;
pub mod steps;

pub use form::{FieldEntry, OptionsForm};
pub use steps::{WizardMode, WizardStep};

use crate::config::{
    OperationKind, ProfileStore, RemoteSettings, SettingsRepository, WizardSettings,
};
use crate::error::{AppError, AppResult};
use crate::interactive::{InteractiveSession, Question, StepOutcome};
use crate::logging::{self, redact_sensitive_values, LogLevel, LogSubsystem};
use crate::path_codec::PathDescriptor;
use crate::rc::{RawFields, RcloneApi};
use crate::runtime::{ProfileBindings, ProfileRunner};
use crate::schema::{FieldDefinition, SchemaCache};
use crate::validation::{FieldViolation, ValidatorRegistry, Violation};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Collaborators a wizard needs
#[derive(Clone)]
pub struct WizardDeps {
    pub api: Arc<dyn RcloneApi>,
    pub schemas: Arc<SchemaCache>,
    pub validators: Arc<ValidatorRegistry>,
    pub repository: Arc<dyn SettingsRepository>,
    pub runner: Arc<dyn ProfileRunner>,
    pub bindings: Vec<Arc<dyn ProfileBindings>>,
    pub settings: WizardSettings,
}

/// Result of submit or of answering an interactive question
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Configuration persisted; `autostarted` start requests were fired
    Completed { autostarted: usize },
    /// The backend needs an answer before the remote can be created
    AwaitingAnswer(Question),
}

pub struct ConfigWizard {
    id: Uuid,
    mode: WizardMode,
    deps: WizardDeps,
    remote_name: String,
    remote_type: Option<String>,
    remote_fields: Vec<FieldDefinition>,
    remote_form: OptionsForm,
    interactive_mode: bool,
    existing_remotes: Vec<String>,
    base: RemoteSettings,
    profiles: ProfileStore,
    session: Arc<InteractiveSession>,
    current: WizardStep,
    awaiting_answer: bool,
    backend_ready: bool,
}

impl ConfigWizard {
    /// Open a wizard. Edit modes need the name of an existing remote.
    pub async fn open(deps: WizardDeps, mode: WizardMode, remote: Option<&str>) -> AppResult<Self> {
        let remote_name = remote.map(str::trim).unwrap_or_default().to_string();
        if mode != WizardMode::Create && remote_name.is_empty() {
            return Err(AppError::InvalidState(
                "editing requires an existing remote".to_string(),
            ));
        }

        let existing_remotes = match deps.api.list_remotes().await {
            Ok(remotes) => remotes,
            Err(e) => {
                tracing::warn!("Could not list remotes: {}", e);
                Vec::new()
            }
        };

        let base = if remote_name.is_empty() {
            None
        } else {
            deps.repository.load(&remote_name).await?
        };
        let base = base.unwrap_or_else(|| RemoteSettings {
            show_on_tray: deps.settings.show_on_tray,
            ..Default::default()
        });

        let mut profiles = ProfileStore::new(&remote_name, &base, deps.bindings.clone());
        for kind in mode.kinds() {
            let fields = deps.schemas.flag_fields(kind).await;
            profiles.set_schema(kind, fields);
        }

        let session = Arc::new(InteractiveSession::new(Arc::clone(&deps.api)));
        let mut wizard = Self {
            id: Uuid::new_v4(),
            mode,
            deps,
            remote_name,
            remote_type: None,
            remote_fields: Vec::new(),
            remote_form: OptionsForm::default(),
            interactive_mode: false,
            existing_remotes,
            base,
            profiles,
            session,
            current: mode.first_step(),
            awaiting_answer: false,
            backend_ready: false,
        };

        if mode == WizardMode::EditRemote {
            wizard.load_backend_entry().await?;
        }

        logging::log_remote(
            LogLevel::Info,
            LogSubsystem::Wizard,
            &wizard.remote_name,
            format!("Opened configuration wizard ({:?})", mode),
        );
        Ok(wizard)
    }

    async fn load_backend_entry(&mut self) -> AppResult<()> {
        let mut entry = self.deps.api.get_backend_entry(&self.remote_name).await?;
        let remote_type = match entry.remove("type") {
            Some(Value::String(t)) => t,
            _ => {
                return Err(AppError::Config(format!(
                    "Remote '{}' has no type",
                    self.remote_name
                )))
            }
        };
        self.select_backend_type(&remote_type).await;
        self.remote_form.load(&entry);
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> WizardMode {
        self.mode
    }

    pub fn current_step(&self) -> WizardStep {
        self.current
    }

    pub fn steps(&self) -> Vec<WizardStep> {
        self.mode.steps()
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn remote_type(&self) -> Option<&str> {
        self.remote_type.as_deref()
    }

    pub fn remote_fields(&self) -> &[FieldDefinition] {
        &self.remote_fields
    }

    pub fn remote_form(&self) -> &OptionsForm {
        &self.remote_form
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn profiles_mut(&mut self) -> &mut ProfileStore {
        &mut self.profiles
    }

    pub fn session(&self) -> &Arc<InteractiveSession> {
        &self.session
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive_mode
    }

    pub fn set_interactive_mode(&mut self, interactive: bool) {
        self.interactive_mode = interactive;
    }

    /// Choose the backend type; resets the remote fields to its schema
    pub async fn select_backend_type(&mut self, remote_type: &str) {
        let fields = self.deps.schemas.remote_fields(remote_type).await;
        self.remote_form = OptionsForm::from_schema(&fields);
        self.remote_fields = fields;
        self.interactive_mode = self.deps.settings.is_interactive_backend(remote_type);
        self.remote_type = Some(remote_type.to_string());
    }

    /// Rename the remote being created; `currentRemote` paths follow
    pub fn set_remote_name(&mut self, name: &str) -> AppResult<()> {
        if self.mode != WizardMode::Create {
            return Err(AppError::InvalidState(
                "an existing remote cannot be renamed here".to_string(),
            ));
        }
        self.remote_name = name.trim().to_string();
        self.profiles.set_remote(&self.remote_name);
        Ok(())
    }

    pub fn set_remote_field(&mut self, name: &str, value: Value) {
        self.remote_form.set(name, value);
    }

    pub fn reset_remote_field(&mut self, name: &str) {
        self.remote_form.reset(name);
    }

    pub fn set_option(&mut self, kind: OperationKind, name: &str, value: Value) {
        self.profiles.set_option(kind, name, value);
    }

    pub fn reset_option(&mut self, kind: OperationKind, name: &str) {
        self.profiles.reset_option(kind, name);
    }

    pub fn set_auto_start(&mut self, kind: OperationKind, auto_start: bool) {
        self.profiles.form_mut(kind).auto_start = auto_start;
    }

    pub fn set_cron(&mut self, kind: OperationKind, enabled: Option<bool>, expression: Option<String>) {
        let form = self.profiles.form_mut(kind);
        form.cron_enabled = enabled;
        form.cron_expression = expression;
    }

    pub fn set_source(&mut self, kind: OperationKind, source: Option<PathDescriptor>) {
        self.profiles.form_mut(kind).source = source;
    }

    pub fn set_dest(&mut self, kind: OperationKind, dest: Option<PathDescriptor>) {
        self.profiles.form_mut(kind).dest = dest;
    }

    /// Link a vfs profile by name; `None` unlinks
    pub fn set_vfs_profile(&mut self, kind: OperationKind, profile: Option<String>) {
        self.profiles.form_mut(kind).vfs_profile = profile;
    }

    pub fn set_filter_profile(&mut self, kind: OperationKind, profile: Option<String>) {
        self.profiles.form_mut(kind).filter_profile = profile;
    }

    pub fn set_backend_profile(&mut self, kind: OperationKind, profile: Option<String>) {
        self.profiles.form_mut(kind).backend_profile = profile;
    }

    fn provider(&self) -> Option<String> {
        self.remote_form
            .get("provider")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Every violation on one page
    pub fn validate_step(&self, step: WizardStep) -> Vec<FieldViolation> {
        match step.kind() {
            Some(kind) => self.deps.validators.validate_fields(
                self.profiles.schema(kind),
                &self.profiles.form(kind).options.values(),
                None,
            ),
            None => self.validate_remote_identity(),
        }
    }

    fn validate_remote_identity(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        let name_violation = if self.remote_name.is_empty() {
            Some(Violation::Required)
        } else if self.remote_name.contains(':') || self.remote_name.contains('/') {
            Some(Violation::InvalidName)
        } else if self.mode == WizardMode::Create
            && self.existing_remotes.iter().any(|r| r == &self.remote_name)
        {
            Some(Violation::NameTaken)
        } else {
            None
        };
        if let Some(violation) = name_violation {
            violations.push(FieldViolation {
                field: "name".to_string(),
                violation,
            });
        }
        if self.remote_type.is_none() {
            violations.push(FieldViolation {
                field: "type".to_string(),
                violation: Violation::Required,
            });
        }

        let provider = self.provider();
        violations.extend(self.deps.validators.validate_fields(
            &self.remote_fields,
            &self.remote_form.values(),
            provider.as_deref(),
        ));
        violations
    }

    fn validate_all(&self) -> AppResult<()> {
        let violations: Vec<FieldViolation> = self
            .steps()
            .into_iter()
            .flat_map(|step| self.validate_step(step))
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(violations))
        }
    }

    fn save_current(&mut self) {
        if let Some(kind) = self.current.kind() {
            self.profiles.save(kind);
        }
    }

    /// Save the page being left, validate it, and advance
    pub fn next(&mut self) -> AppResult<WizardStep> {
        self.save_current();
        let violations = self.validate_step(self.current);
        if !violations.is_empty() {
            return Err(AppError::Validation(violations));
        }
        let steps = self.steps();
        if let Some(pos) = steps.iter().position(|s| *s == self.current) {
            if let Some(next) = steps.get(pos + 1) {
                self.current = *next;
            }
        }
        Ok(self.current)
    }

    /// Save the page being left and go back
    pub fn prev(&mut self) -> WizardStep {
        self.save_current();
        let steps = self.steps();
        if let Some(pos) = steps.iter().position(|s| *s == self.current) {
            if pos > 0 {
                self.current = steps[pos - 1];
            }
        }
        self.current
    }

    /// Jump to any applicable page
    pub fn go_to(&mut self, step: WizardStep) -> AppResult<WizardStep> {
        if !self.mode.is_applicable(step) {
            return Err(AppError::InvalidState(format!(
                "step {:?} is not part of this wizard",
                step
            )));
        }
        self.save_current();
        self.current = step;
        Ok(self.current)
    }

    fn backend_payload(&self) -> AppResult<RawFields> {
        let remote_type = self
            .remote_type
            .clone()
            .ok_or_else(|| AppError::Config("No backend type selected".to_string()))?;
        let mut payload = self.remote_form.changed_payload();
        payload.insert("type".to_string(), Value::String(remote_type));
        Ok(payload)
    }

    pub async fn submit(&mut self) -> AppResult<SubmitOutcome> {
        if self.awaiting_answer {
            return Err(AppError::InvalidState(
                "interactive configuration is waiting for an answer".to_string(),
            ));
        }
        match self.mode {
            WizardMode::Create => self.submit_create().await,
            WizardMode::EditKind(kind) => self.submit_kind(kind).await,
            WizardMode::EditRemote => self.submit_remote().await,
        }
    }

    async fn submit_create(&mut self) -> AppResult<SubmitOutcome> {
        self.profiles.save_all();
        self.validate_all()?;

        if !self.backend_ready {
            let payload = self.backend_payload()?;
            let redacted = Value::Object(redact_sensitive_values(&payload, &self.remote_fields));
            tracing::info!(
                wizard = %self.id,
                "Creating remote '{}' with {}",
                self.remote_name,
                redacted
            );

            if self.interactive_mode {
                let mut params = payload;
                let remote_type = match params.remove("type") {
                    Some(Value::String(t)) => t,
                    _ => String::new(),
                };
                match self
                    .session
                    .start(&self.remote_name, &remote_type, params)
                    .await?
                {
                    StepOutcome::Question(question) => {
                        self.awaiting_answer = true;
                        return Ok(SubmitOutcome::AwaitingAnswer(question));
                    }
                    StepOutcome::Finalized => {}
                    StepOutcome::Ignored => {
                        return Err(AppError::InvalidState(
                            "interactive configuration already running".to_string(),
                        ))
                    }
                }
            } else {
                self.deps
                    .api
                    .create_backend_entry(&self.remote_name, &payload)
                    .await?;
            }
            self.backend_ready = true;
        }

        self.finish_create().await
    }

    /// Store the answer to the pending question
    pub fn set_interactive_answer(&self, answer: Value) -> bool {
        self.session.set_answer(answer)
    }

    /// Send the pending answer; completes the submit once the backend is done
    pub async fn continue_interactive(&mut self) -> AppResult<SubmitOutcome> {
        if !self.awaiting_answer {
            return Err(AppError::InvalidState(
                "no interactive configuration in progress".to_string(),
            ));
        }
        match self.session.continue_session().await? {
            StepOutcome::Question(question) => Ok(SubmitOutcome::AwaitingAnswer(question)),
            StepOutcome::Finalized => {
                self.awaiting_answer = false;
                self.backend_ready = true;
                self.finish_create().await
            }
            StepOutcome::Ignored => Err(AppError::InvalidState(
                "previous answer is still being processed".to_string(),
            )),
        }
    }

    /// Abort the interactive flow; the wizard stays open
    pub async fn cancel_interactive(&mut self) {
        self.session.cancel().await;
        self.awaiting_answer = false;
    }

    async fn persist(&self, settings: &RemoteSettings) -> AppResult<()> {
        if let Err(e) = self.deps.repository.save(&self.remote_name, settings).await {
            logging::log_remote(
                LogLevel::Error,
                LogSubsystem::Persistence,
                &self.remote_name,
                format!("Failed to save settings: {}", e),
            );
            return Err(match e {
                AppError::Persistence(msg) => AppError::Persistence(msg),
                other => AppError::Persistence(other.to_string()),
            });
        }
        logging::log_remote(
            LogLevel::Info,
            LogSubsystem::Persistence,
            &self.remote_name,
            "Saved remote settings",
        );
        Ok(())
    }

    async fn finish_create(&mut self) -> AppResult<SubmitOutcome> {
        let settings = self.profiles.export(self.base.clone());
        self.persist(&settings).await?;
        self.base = settings;
        self.profiles.apply_renames(&OperationKind::ALL).await;

        let autostarted = fire_autostart(&self.deps.runner, &self.remote_name, &self.base);
        logging::log_remote(
            LogLevel::Info,
            LogSubsystem::Wizard,
            &self.remote_name,
            format!("Remote created, {} profile(s) autostarting", autostarted),
        );
        Ok(SubmitOutcome::Completed { autostarted })
    }

    async fn submit_kind(&mut self, kind: OperationKind) -> AppResult<SubmitOutcome> {
        self.profiles.save(kind);
        let violations = self.validate_step(WizardStep::for_kind(kind));
        if !violations.is_empty() {
            return Err(AppError::Validation(violations));
        }

        // Other sections may have changed since the wizard opened
        let mut settings = self
            .deps
            .repository
            .load(&self.remote_name)
            .await?
            .unwrap_or_else(|| self.base.clone());
        settings.set_section(kind, self.profiles.export_kind(kind));
        self.persist(&settings).await?;
        self.base = settings;
        self.profiles.apply_renames(&[kind]).await;
        Ok(SubmitOutcome::Completed { autostarted: 0 })
    }

    async fn submit_remote(&mut self) -> AppResult<SubmitOutcome> {
        self.profiles.save_all();
        self.validate_all()?;

        let payload = self.backend_payload()?;
        self.deps
            .api
            .update_backend_entry(&self.remote_name, &payload)
            .await?;

        let settings = self.profiles.export(self.base.clone());
        self.persist(&settings).await?;
        self.base = settings;
        self.profiles.apply_renames(&OperationKind::ALL).await;
        Ok(SubmitOutcome::Completed { autostarted: 0 })
    }

    /// Discard all edits, pending renames included; an active interactive flow
    /// is cancelled in the background
    pub fn close(self) {
        self.session.abandon();
        tracing::debug!(wizard = %self.id, "Closed wizard for '{}'", self.remote_name);
    }
}

/// Fire one start request per autostart profile without waiting for any of them
fn fire_autostart(runner: &Arc<dyn ProfileRunner>, remote: &str, settings: &RemoteSettings) -> usize {
    let targets = settings.autostart_profiles();
    for (kind, profile) in targets.iter().cloned() {
        let runner = Arc::clone(runner);
        let remote = remote.to_string();
        tokio::spawn(async move {
            match runner.start_profile(kind, &remote, &profile).await {
                Ok(_) => tracing::info!("Autostarted {} profile '{}' of '{}'", kind, profile, remote),
                Err(e) => logging::log_remote(
                    LogLevel::Warn,
                    LogSubsystem::Wizard,
                    &remote,
                    format!("Autostart of {} profile '{}' failed: {}", kind, profile, e),
                ),
            }
        });
    }
    targets.len()
}
