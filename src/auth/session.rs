//! Session store shared by the verification views and the dashboards.
//!
//! Views receive a `SessionStore` handle at construction instead of reaching
//! for ambient state. A session is created by a successful verification and
//! destroyed by [`SessionStore::logout`]. The store also carries the auth
//! error channel that verify failures are reported through.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::api::{AuthenticatedSession, IdentityService, Role, redact_phone};

#[derive(Debug, Default)]
struct Inner {
    session: Option<AuthenticatedSession>,
    error: Option<String>,
}

/// Cloneable handle to the process-wide authenticated session.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Inner>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly verified session, replacing any previous one.
    pub async fn establish(&self, session: AuthenticatedSession) {
        tracing::info!(
            phone = %redact_phone(&session.phone),
            role = %session.role,
            "Session established"
        );
        let mut inner = self.inner.write().await;
        inner.session = Some(session);
        inner.error = None;
    }

    pub async fn current(&self) -> Option<AuthenticatedSession> {
        self.inner.read().await.session.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.session.is_some()
    }

    pub async fn role(&self) -> Option<Role> {
        self.inner.read().await.session.as_ref().map(|s| s.role)
    }

    pub async fn credential(&self) -> Option<SecretString> {
        self.inner
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.credential.clone())
    }

    /// Report an auth failure to whichever view is showing the error slot.
    pub async fn set_error(&self, message: impl Into<String>) {
        self.inner.write().await.error = Some(message.into());
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.read().await.error.clone()
    }

    /// Read and clear the error in one step, so it is shown once.
    pub async fn take_error(&self) -> Option<String> {
        self.inner.write().await.error.take()
    }

    pub async fn clear_error(&self) {
        self.inner.write().await.error = None;
    }

    /// Drop the local session without telling the backend.
    pub async fn clear(&self) -> Option<AuthenticatedSession> {
        self.inner.write().await.session.take()
    }

    /// End the session locally and on the server.
    ///
    /// The local session is always cleared; a failed server-side logout is
    /// only logged.
    pub async fn logout(&self, identity: &dyn IdentityService, cancel: &CancellationToken) {
        let Some(session) = self.clear().await else {
            return;
        };
        if let Err(e) = identity.logout(&session.credential, cancel).await {
            tracing::warn!(error = %e, "Server-side logout failed");
        }
        tracing::info!(phone = %redact_phone(&session.phone), "Signed out");
    }
}
