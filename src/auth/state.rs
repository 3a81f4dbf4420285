//! Verification state machine: stages, flows, and the per-view session.

use crate::api::{RegistrationRequest, VehicleType};
use crate::error::{ApiErrorKind, WorkflowError};

/// Number of digits in a one-time code.
pub const CODE_LEN: usize = 6;

/// The stages of a verification.
///
/// CollectingIdentity → AwaitingCode → Verifying → Authenticated, with
/// AwaitingCode → CollectingIdentity on "back" and Verifying → AwaitingCode
/// when the code is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CollectingIdentity,
    AwaitingCode,
    Verifying,
    /// Terminal: the session now belongs to the session store.
    Authenticated,
}

impl Stage {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, target),
            (CollectingIdentity, AwaitingCode)
                | (AwaitingCode, CollectingIdentity)
                | (AwaitingCode, Verifying)
                | (Verifying, AwaitingCode)
                | (Verifying, Authenticated)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CollectingIdentity => "collecting_identity",
            Self::AwaitingCode => "awaiting_code",
            Self::Verifying => "verifying",
            Self::Authenticated => "authenticated",
        };
        write!(f, "{s}")
    }
}

/// Profile attributes collected before a sign-up code is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFields {
    pub name: String,
    /// `None` until a recognised vehicle type is entered.
    pub vehicle_type: Option<VehicleType>,
    pub number_plate: String,
}

impl RegistrationFields {
    pub fn is_complete(&self) -> bool {
        self.vehicle_type.is_some()
            && [&self.name, &self.number_plate]
                .iter()
                .all(|f| !f.trim().is_empty())
    }
}

/// Which verification a controller drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Phone only, for an existing account.
    SignIn,
    /// Phone plus rider profile, creating the account.
    SignUp(RegistrationFields),
}

impl Flow {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::SignUp(_) => "sign_up",
        }
    }
}

/// Transient, view-held state of one verification attempt.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub subject_phone: String,
    pub flow: Flow,
    pub code: String,
    pub stage: Stage,
    /// Message shown above the active form.
    pub last_error: Option<String>,
    /// Kind of the collaborator failure behind `last_error`.
    pub last_failure: Option<ApiErrorKind>,
    /// A collaborator call is in flight; every submission is disabled.
    pub loading: bool,
}

impl VerificationSession {
    pub fn new(flow: Flow) -> Self {
        Self {
            subject_phone: String::new(),
            flow,
            code: String::new(),
            stage: Stage::CollectingIdentity,
            last_error: None,
            last_failure: None,
            loading: false,
        }
    }

    /// Profile fields for a sign-up, `None` for a sign-in.
    pub fn pending_fields(&self) -> Option<&RegistrationFields> {
        match &self.flow {
            Flow::SignIn => None,
            Flow::SignUp(fields) => Some(fields),
        }
    }

    pub(crate) fn pending_fields_mut(&mut self) -> Option<&mut RegistrationFields> {
        match &mut self.flow {
            Flow::SignIn => None,
            Flow::SignUp(fields) => Some(fields),
        }
    }

    /// Whether the identity form may be submitted.
    pub fn can_request_code(&self, min_phone_len: usize) -> bool {
        let phone = self.subject_phone.trim();
        !self.loading
            && self.stage == Stage::CollectingIdentity
            && !phone.is_empty()
            && phone.chars().count() >= min_phone_len
            && self.pending_fields().is_none_or(RegistrationFields::is_complete)
    }

    /// Whether the code form may be submitted.
    pub fn can_submit_code(&self) -> bool {
        !self.loading && self.stage == Stage::AwaitingCode && self.code.len() == CODE_LEN
    }

    /// Move to `target`, enforcing the stage graph.
    pub(crate) fn transition(&mut self, target: Stage) -> Result<(), WorkflowError> {
        if !self.stage.can_transition_to(target) {
            return Err(WorkflowError::InvalidTransition {
                from: self.stage.to_string(),
                to: target.to_string(),
            });
        }
        if target == Stage::CollectingIdentity {
            self.code.clear();
        }
        self.stage = target;
        Ok(())
    }

    pub(crate) fn clear_errors(&mut self) {
        self.last_error = None;
        self.last_failure = None;
    }

    /// Build the sign-up verify request from the collected fields. `None`
    /// for a sign-in or while the profile is incomplete.
    pub(crate) fn registration_request(&self) -> Option<RegistrationRequest> {
        let fields = self.pending_fields()?;
        Some(RegistrationRequest {
            phone: self.subject_phone.trim().to_string(),
            name: fields.name.trim().to_string(),
            vehicle_type: fields.vehicle_type?,
            number_plate: fields.number_plate.trim().to_string(),
            otp: self.code.clone(),
        })
    }
}

/// Strip non-digits from typed code input and cap it at [`CODE_LEN`].
pub fn sanitize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit())
        .take(CODE_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Stage; 4] = [
        Stage::CollectingIdentity,
        Stage::AwaitingCode,
        Stage::Verifying,
        Stage::Authenticated,
    ];

    #[test]
    fn valid_transitions() {
        use Stage::*;
        let transitions = [
            (CollectingIdentity, AwaitingCode),
            (AwaitingCode, CollectingIdentity),
            (AwaitingCode, Verifying),
            (Verifying, AwaitingCode),
            (Verifying, Authenticated),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use Stage::*;
        // Skipping the code
        assert!(!CollectingIdentity.can_transition_to(Verifying));
        assert!(!CollectingIdentity.can_transition_to(Authenticated));
        // Back out of an in-flight verify
        assert!(!Verifying.can_transition_to(CollectingIdentity));
        // Terminal
        for stage in ALL {
            assert!(!Authenticated.can_transition_to(stage));
        }
        // Self-transition
        for stage in ALL {
            assert!(!stage.can_transition_to(stage));
        }
    }

    #[test]
    fn only_authenticated_is_terminal() {
        for stage in ALL {
            assert_eq!(stage.is_terminal(), stage == Stage::Authenticated);
        }
    }

    #[test]
    fn sanitize_strips_and_caps() {
        assert_eq!(sanitize_code("12a3-4 5"), "12345");
        assert_eq!(sanitize_code("1234567890"), "123456");
        assert_eq!(sanitize_code("abc"), "");
        assert_eq!(sanitize_code("١٢٣"), "");
    }

    #[test]
    fn going_back_clears_code() {
        let mut session = VerificationSession::new(Flow::SignIn);
        session.subject_phone = "0712345678".into();
        session.transition(Stage::AwaitingCode).unwrap();
        session.code = "123456".into();
        session.transition(Stage::CollectingIdentity).unwrap();
        assert!(session.code.is_empty());
        assert_eq!(session.subject_phone, "0712345678");
    }

    #[test]
    fn invalid_transition_is_an_error() {
        let mut session = VerificationSession::new(Flow::SignIn);
        let err = session.transition(Stage::Verifying).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(session.stage, Stage::CollectingIdentity);
    }

    #[test]
    fn sign_up_requires_every_field() {
        let mut session = VerificationSession::new(Flow::SignUp(RegistrationFields::default()));
        session.subject_phone = "0712345678".into();
        assert!(!session.can_request_code(10));

        let fields = session.pending_fields_mut().unwrap();
        fields.name = "John Doe".into();
        fields.vehicle_type = Some(VehicleType::Motorcycle);
        assert!(!session.can_request_code(10));

        session.pending_fields_mut().unwrap().number_plate = "KCB 123A".into();
        assert!(session.can_request_code(10));

        session.pending_fields_mut().unwrap().name = "   ".into();
        assert!(!session.can_request_code(10));
    }

    #[test]
    fn registration_request_carries_code_and_fields() {
        let mut session = VerificationSession::new(Flow::SignUp(RegistrationFields {
            name: " John Doe ".into(),
            vehicle_type: Some(VehicleType::Motorcycle),
            number_plate: "KCB 123A".into(),
        }));
        session.subject_phone = "0712345678".into();
        session.code = "123456".into();
        let req = session.registration_request().unwrap();
        assert_eq!(req.name, "John Doe");
        assert_eq!(req.otp, "123456");
        assert_eq!(req.vehicle_type, VehicleType::Motorcycle);
        assert!(VerificationSession::new(Flow::SignIn).registration_request().is_none());
    }
}
