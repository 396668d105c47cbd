//! Interactive backend configuration
//!
//! Some backend types cannot be configured in one shot: later questions depend
//! on earlier answers (OAuth, drive selection, region lookups). The backend
//! drives the exchange by returning a state token and the next option to ask
//! about; an empty state token means the configuration is complete.
//!
//! The session is a small state machine:
//!
//! ```text
//! Inactive --start--> Active(question, answer) --continue--> Active(next) | Inactive
//!                           |                                     ^
//!                           +-------------- cancel ---------------+
//! ```
//!
//! `processing` is raised for the duration of every backend round trip and
//! guards against double submission.

use crate::error::{AppError, AppResult};
use crate::logging::{self, LogLevel, LogSubsystem};
use crate::rc::{RawFields, RcloneApi};
use crate::schema::FieldDefinition;
use crate::validation::{FieldViolation, Violation};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// One question asked by the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub state: String,
    pub option: Option<FieldDefinition>,
    pub error: Option<String>,
}

/// Backend reply to a start or continue call
#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveReply {
    Question(Question),
    Finalized,
}

impl InteractiveReply {
    /// Decode `{State, Option, Error}` as returned by config/create and config/update
    pub fn from_rclone(raw: &Value) -> AppResult<Self> {
        let state = raw.get("State").and_then(Value::as_str).ok_or_else(|| {
            AppError::InteractiveProtocol(format!("Reply without a state token: {}", raw))
        })?;
        if state.is_empty() {
            return Ok(InteractiveReply::Finalized);
        }

        let option = raw
            .get("Option")
            .filter(|o| !o.is_null())
            .map(FieldDefinition::from_rclone)
            .transpose()
            .map_err(|e| AppError::InteractiveProtocol(format!("Malformed question: {}", e)))?;

        let error = raw
            .get("Error")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        Ok(InteractiveReply::Question(Question {
            state: state.to_string(),
            option,
            error,
        }))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

impl Question {
    pub fn is_required(&self) -> bool {
        self.option.as_ref().map(|o| o.required).unwrap_or(false)
    }

    pub fn field_name(&self) -> &str {
        self.option.as_ref().map(|o| o.name.as_str()).unwrap_or("answer")
    }

    /// Pre-populated answer: current value, then default string, then typed
    /// default, then first example, then a type-safe fallback.
    pub fn default_answer(&self) -> Value {
        let option = match &self.option {
            Some(option) => option,
            None => return Value::String(String::new()),
        };
        let is_bool = option.is_bool();
        let coerce = |value: Value| -> Value {
            if !is_bool {
                return value;
            }
            match value {
                Value::String(s) => Value::Bool(s.trim().eq_ignore_ascii_case("true")),
                other => other,
            }
        };

        let default_str = Value::String(option.default_str.clone());
        let first_example = option
            .examples
            .first()
            .map(|e| Value::String(e.value.clone()));

        [
            option.value.clone(),
            Some(default_str),
            Some(option.default.clone()),
            first_example,
        ]
        .into_iter()
        .flatten()
        .find(|candidate| !is_blank(candidate))
        .map(coerce)
        .unwrap_or_else(|| {
            if is_bool {
                Value::Bool(true)
            } else {
                Value::String(String::new())
            }
        })
    }

    /// Whether `answer` lets the flow continue
    pub fn accepts(&self, answer: Option<&Value>) -> bool {
        if !self.is_required() {
            return true;
        }
        match answer {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }
}

/// Answers travel as strings; booleans become the literals "true"/"false"
pub fn answer_to_wire(answer: &Value) -> String {
    match answer {
        Value::Null => String::new(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result of a start or continue call
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The backend asked another question
    Question(Question),
    /// The configuration is complete and the session is inactive again
    Finalized,
    /// A round trip was already in flight; nothing was sent
    Ignored,
}

/// Read-only view of the session for rendering
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub processing: bool,
    pub question: Option<Question>,
    pub answer: Option<Value>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct SessionState {
    active: bool,
    processing: bool,
    remote_name: String,
    question: Option<Question>,
    answer: Option<Value>,
    last_error: Option<String>,
    params: RawFields,
    // Bumped on teardown so replies from an abandoned round trip are dropped
    generation: u64,
}

impl SessionState {
    fn teardown(&mut self) {
        self.active = false;
        self.processing = false;
        self.question = None;
        self.answer = None;
        self.params = RawFields::new();
        self.generation += 1;
    }
}

/// Interactive configuration session, owned by one wizard
pub struct InteractiveSession {
    id: Uuid,
    api: Arc<dyn RcloneApi>,
    state: Mutex<SessionState>,
}

impl InteractiveSession {
    pub fn new(api: Arc<dyn RcloneApi>) -> Self {
        Self {
            id: Uuid::new_v4(),
            api,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn is_processing(&self) -> bool {
        self.state.lock().processing
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            active: state.active,
            processing: state.processing,
            question: state.question.clone(),
            answer: state.answer.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Open the flow for `name`. An empty state token in the reply finalizes
    /// immediately without ever entering the active state.
    pub async fn start(
        &self,
        name: &str,
        remote_type: &str,
        params: RawFields,
    ) -> AppResult<StepOutcome> {
        let generation = {
            let mut state = self.state.lock();
            if state.active || state.processing {
                return Err(AppError::InvalidState(
                    "interactive configuration already in progress".to_string(),
                ));
            }
            state.processing = true;
            state.last_error = None;
            state.remote_name = name.to_string();
            state.generation
        };

        tracing::info!(session = %self.id, "Starting interactive config for '{}' ({})", name, remote_type);
        let reply = self
            .api
            .start_interactive_config(name, remote_type, &params)
            .await;

        let mut state = self.state.lock();
        if state.generation != generation {
            return Ok(StepOutcome::Ignored);
        }
        state.processing = false;
        match reply {
            Ok(InteractiveReply::Finalized) => {
                state.teardown();
                tracing::info!(session = %self.id, "Interactive config for '{}' finished on start", name);
                Ok(StepOutcome::Finalized)
            }
            Ok(InteractiveReply::Question(question)) => {
                state.active = true;
                state.params = params;
                state.answer = Some(question.default_answer());
                state.question = Some(question.clone());
                Ok(StepOutcome::Question(question))
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                logging::log_remote(
                    LogLevel::Error,
                    LogSubsystem::Interactive,
                    name,
                    format!("Interactive start failed: {}", e),
                );
                Err(e)
            }
        }
    }

    /// Store the pending answer; rejected while inactive or mid round trip
    pub fn set_answer(&self, answer: Value) -> bool {
        let mut state = self.state.lock();
        if !state.active || state.processing {
            return false;
        }
        state.answer = Some(answer);
        true
    }

    /// Validity gate for [`continue_session`](Self::continue_session)
    pub fn can_continue(&self) -> bool {
        let state = self.state.lock();
        if !state.active || state.processing {
            return false;
        }
        state
            .question
            .as_ref()
            .map(|q| q.accepts(state.answer.as_ref()))
            .unwrap_or(false)
    }

    /// Send the pending answer. A second call while a round trip is in flight
    /// is a no-op. On failure the session stays on the same question.
    pub async fn continue_session(&self) -> AppResult<StepOutcome> {
        let (name, token, answer, params, generation) = {
            let mut state = self.state.lock();
            if state.processing {
                return Ok(StepOutcome::Ignored);
            }
            if !state.active {
                return Err(AppError::InvalidState(
                    "no interactive configuration in progress".to_string(),
                ));
            }
            let question = match &state.question {
                Some(question) => question,
                None => {
                    return Err(AppError::InvalidState(
                        "interactive session has no question".to_string(),
                    ))
                }
            };
            if !question.accepts(state.answer.as_ref()) {
                return Err(AppError::Validation(vec![FieldViolation {
                    field: question.field_name().to_string(),
                    violation: Violation::Required,
                }]));
            }
            let token = question.state.clone();
            let answer = state
                .answer
                .as_ref()
                .map(answer_to_wire)
                .unwrap_or_default();
            state.processing = true;
            state.last_error = None;
            (
                state.remote_name.clone(),
                token,
                answer,
                state.params.clone(),
                state.generation,
            )
        };

        let reply = self
            .api
            .continue_interactive_config(&name, &token, &answer, &params)
            .await;

        let mut state = self.state.lock();
        if state.generation != generation {
            return Ok(StepOutcome::Ignored);
        }
        state.processing = false;
        match reply {
            Ok(InteractiveReply::Finalized) => {
                state.teardown();
                tracing::info!(session = %self.id, "Interactive config for '{}' finalized", name);
                Ok(StepOutcome::Finalized)
            }
            Ok(InteractiveReply::Question(question)) => {
                state.answer = Some(question.default_answer());
                state.question = Some(question.clone());
                Ok(StepOutcome::Question(question))
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                tracing::warn!(session = %self.id, "Interactive continue failed: {}", e);
                Err(e)
            }
        }
    }

    /// Ask the backend to abort, then tear down locally regardless of the outcome
    pub async fn cancel(&self) {
        let name = {
            let state = self.state.lock();
            if !state.active && !state.processing {
                return;
            }
            state.remote_name.clone()
        };

        if let Err(e) = self.api.cancel_interactive_config(&name).await {
            tracing::warn!(session = %self.id, "Cancel of interactive config for '{}' failed: {}", name, e);
        }
        self.state.lock().teardown();
    }

    /// Tear down immediately and send a best-effort cancel in the background
    pub fn abandon(&self) {
        let name = {
            let mut state = self.state.lock();
            if !state.active && !state.processing {
                return;
            }
            let name = state.remote_name.clone();
            state.teardown();
            name
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let api = Arc::clone(&self.api);
                handle.spawn(async move {
                    if let Err(e) = api.cancel_interactive_config(&name).await {
                        tracing::warn!("Background cancel for '{}' failed: {}", name, e);
                    }
                });
            }
            Err(_) => tracing::warn!("No runtime available to cancel interactive config for '{}'", name),
        }
    }
}
