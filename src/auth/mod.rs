//! Phone verification: one state machine shared by sign-in and sign-up.
//!
//! A view mounts a [`WorkflowController`], feeds it form input, and calls
//! `request_code` then `submit_code`. A successful verify installs the
//! session in the [`SessionStore`] and redirects once to the landing route
//! for the returned role.

pub mod session;
pub mod state;
pub mod workflow;

pub use session::SessionStore;
pub use state::{CODE_LEN, Flow, RegistrationFields, Stage, VerificationSession, sanitize_code};
pub use workflow::{ISSUE_CODE_FAILED, VERIFY_FAILED, WorkflowController, WorkflowDeps};
