//! WorkflowController: drives phone → code → session for both sign-in and
//! sign-up.
//!
//! State lives behind a `RwLock` that is never held across a collaborator
//! call. `loading` is the only submission guard: while it is set every
//! submit is rejected without touching the backend, so at most one request
//! is in flight per controller.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::session::SessionStore;
use super::state::{Flow, RegistrationFields, Stage, VerificationSession, sanitize_code};
use crate::api::{AuthenticatedSession, IdentityService, VehicleType, redact_phone};
use crate::config::ClientConfig;
use crate::dashboard::router::{Navigator, Route, landing_route};
use crate::error::{ApiError, WorkflowError};

/// Shown when a code could not be sent, whatever the cause.
pub const ISSUE_CODE_FAILED: &str = "Error sending OTP. Please try again.";

/// Shown when a verify call fails without a message from the backend.
pub const VERIFY_FAILED: &str = "Verification failed. Please try again.";

/// Collaborators a controller is built from.
#[derive(Clone)]
pub struct WorkflowDeps {
    pub identity: Arc<dyn IdentityService>,
    pub sessions: SessionStore,
    pub navigator: Arc<dyn Navigator>,
}

/// Owns one verification attempt from mount to authentication or teardown.
pub struct WorkflowController {
    deps: WorkflowDeps,
    min_phone_len: usize,
    state: RwLock<VerificationSession>,
    cancel: CancellationToken,
}

impl WorkflowController {
    pub fn new(deps: WorkflowDeps, config: &ClientConfig, flow: Flow) -> Self {
        Self {
            deps,
            min_phone_len: config.min_phone_len,
            state: RwLock::new(VerificationSession::new(flow)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn sign_in(deps: WorkflowDeps, config: &ClientConfig) -> Self {
        Self::new(deps, config, Flow::SignIn)
    }

    pub fn sign_up(deps: WorkflowDeps, config: &ClientConfig) -> Self {
        Self::new(deps, config, Flow::SignUp(RegistrationFields::default()))
    }

    /// Copy of the current state, for rendering.
    pub async fn snapshot(&self) -> VerificationSession {
        self.state.read().await.clone()
    }

    pub async fn stage(&self) -> Stage {
        self.state.read().await.stage
    }

    pub async fn can_request_code(&self) -> bool {
        !self.cancel.is_cancelled() && self.state.read().await.can_request_code(self.min_phone_len)
    }

    pub async fn can_submit_code(&self) -> bool {
        !self.cancel.is_cancelled() && self.state.read().await.can_submit_code()
    }

    // ── Input ───────────────────────────────────────────────────────────

    /// Edit the phone number. Returns false outside the identity stage or
    /// while a code request is in flight, so the code always goes to the
    /// number that is later verified.
    pub async fn set_phone(&self, phone: impl Into<String>) -> bool {
        let mut state = self.state.write().await;
        if !identity_editable(&state) {
            return false;
        }
        state.subject_phone = phone.into();
        true
    }

    pub async fn set_name(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        self.edit_fields(|f| f.name = name).await
    }

    /// Set the vehicle type from typed input. Anything outside
    /// [`VehicleType::ALL`] clears the field and returns false.
    pub async fn set_vehicle_type(&self, raw: &str) -> bool {
        let parsed = raw.parse::<VehicleType>().ok();
        if parsed.is_none() {
            tracing::debug!(input = raw, "Rejected vehicle type");
        }
        self.edit_fields(|f| f.vehicle_type = parsed).await && parsed.is_some()
    }

    pub async fn set_number_plate(&self, number_plate: impl Into<String>) -> bool {
        let number_plate = number_plate.into();
        self.edit_fields(|f| f.number_plate = number_plate).await
    }

    async fn edit_fields(&self, edit: impl FnOnce(&mut RegistrationFields)) -> bool {
        let mut state = self.state.write().await;
        if !identity_editable(&state) {
            return false;
        }
        match state.pending_fields_mut() {
            Some(fields) => {
                edit(fields);
                true
            }
            None => false,
        }
    }

    /// Replace the typed code. Non-digits are dropped and the value is
    /// capped at six digits. Returns the stored value, or `None` outside the
    /// code stage.
    pub async fn set_code(&self, raw: &str) -> Option<String> {
        let mut state = self.state.write().await;
        if state.stage != Stage::AwaitingCode {
            return None;
        }
        state.code = sanitize_code(raw);
        Some(state.code.clone())
    }

    // ── Transitions ─────────────────────────────────────────────────────

    /// Ask the identity service to send a code to the entered phone.
    pub async fn request_code(&self) -> Result<Stage, WorkflowError> {
        let (phone, flow) = {
            let mut state = self.state.write().await;
            self.check_submittable(&state)?;
            if !state.can_request_code(self.min_phone_len) {
                return Err(WorkflowError::SubmissionDisabled {
                    stage: state.stage.to_string(),
                });
            }
            state.loading = true;
            (state.subject_phone.trim().to_string(), state.flow.name())
        };

        tracing::info!(flow, phone = %redact_phone(&phone), "Requesting verification code");
        let result = self
            .deps
            .identity
            .issue_code(&phone, &self.cancel.child_token())
            .await;

        let mut state = self.state.write().await;
        state.loading = false;
        if self.cancel.is_cancelled() {
            tracing::debug!(flow, "Discarding code request result after teardown");
            return Err(WorkflowError::TornDown);
        }

        match result {
            Ok(()) => {
                state.transition(Stage::AwaitingCode)?;
                state.clear_errors();
                tracing::info!(flow, "Verification code sent");
                Ok(state.stage)
            }
            Err(e) => {
                tracing::warn!(flow, error = %e, "Failed to send verification code");
                state.last_error = Some(ISSUE_CODE_FAILED.to_string());
                state.last_failure = Some(e.kind());
                Err(WorkflowError::IssueCode(e))
            }
        }
    }

    /// Submit the entered code. On success the session is handed to the
    /// session store and the navigator is sent to the role's landing route.
    pub async fn submit_code(&self) -> Result<Route, WorkflowError> {
        let (phone, code, registration, flow) = {
            let mut state = self.state.write().await;
            self.check_submittable(&state)?;
            if !state.can_submit_code() {
                return Err(WorkflowError::SubmissionDisabled {
                    stage: state.stage.to_string(),
                });
            }
            let registration = match &state.flow {
                Flow::SignIn => None,
                Flow::SignUp(_) => Some(state.registration_request().ok_or_else(|| {
                    WorkflowError::SubmissionDisabled {
                        stage: state.stage.to_string(),
                    }
                })?),
            };
            state.transition(Stage::Verifying)?;
            state.loading = true;
            (
                state.subject_phone.trim().to_string(),
                state.code.clone(),
                registration,
                state.flow.name(),
            )
        };

        self.deps.sessions.clear_error().await;
        tracing::info!(flow, phone = %redact_phone(&phone), "Verifying code");

        let token = self.cancel.child_token();
        let result = match &registration {
            None => {
                self.deps
                    .identity
                    .verify_and_authenticate(&phone, &code, &token)
                    .await
            }
            Some(request) => self.deps.identity.verify_and_register(request, &token).await,
        };

        let mut state = self.state.write().await;
        state.loading = false;
        if self.cancel.is_cancelled() {
            state.transition(Stage::AwaitingCode)?;
            tracing::debug!(flow, "Discarding verify result after teardown");
            return Err(WorkflowError::TornDown);
        }

        match result {
            Ok(session) => {
                state.transition(Stage::Authenticated)?;
                state.clear_errors();
                drop(state);
                Ok(self.finish(session).await)
            }
            Err(e) => {
                state.transition(Stage::AwaitingCode)?;
                let message = verify_message(&e);
                tracing::warn!(flow, error = %e, "Verification failed");
                state.last_error = Some(message.clone());
                state.last_failure = Some(e.kind());
                drop(state);
                self.deps.sessions.set_error(message).await;
                Err(WorkflowError::Verify(e))
            }
        }
    }

    /// Return to the identity form, keeping what was typed there.
    pub async fn go_back(&self) -> Result<Stage, WorkflowError> {
        let mut state = self.state.write().await;
        if state.loading {
            return Err(WorkflowError::InFlight);
        }
        state.transition(Stage::CollectingIdentity)?;
        state.clear_errors();
        Ok(state.stage)
    }

    /// Abort any in-flight call. The controller rejects further submissions.
    pub fn teardown(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Verification view torn down");
            self.cancel.cancel();
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn check_submittable(&self, state: &VerificationSession) -> Result<(), WorkflowError> {
        if self.cancel.is_cancelled() {
            return Err(WorkflowError::TornDown);
        }
        if state.loading {
            return Err(WorkflowError::InFlight);
        }
        Ok(())
    }

    async fn finish(&self, session: AuthenticatedSession) -> Route {
        let route = landing_route(Some(&session));
        self.deps.sessions.establish(session).await;
        tracing::info!(route = %route, "Verification complete, redirecting");
        self.deps.navigator.navigate(route);
        route
    }
}

impl Drop for WorkflowController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn identity_editable(state: &VerificationSession) -> bool {
    state.stage == Stage::CollectingIdentity && !state.loading
}

fn verify_message(e: &ApiError) -> String {
    e.server_message().unwrap_or(VERIFY_FAILED).to_string()
}
