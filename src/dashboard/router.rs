//! Role-driven routing after sign-in.

use tokio::sync::watch;

use crate::api::{AuthenticatedSession, Role};
use crate::auth::SessionStore;

/// Views the client can send a user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    RiderDashboard,
    ClientDashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Login => "/auth/login",
            Self::Register => "/auth/register",
            Self::Dashboard => "/dashboard",
            Self::RiderDashboard => "/dashboard/rider",
            Self::ClientDashboard => "/dashboard/client",
        }
    }

    pub fn requires_session(&self) -> bool {
        matches!(
            self,
            Self::Dashboard | Self::RiderDashboard | Self::ClientDashboard
        )
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Receives redirect decisions.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

impl Navigator for watch::Sender<Option<Route>> {
    fn navigate(&self, route: Route) {
        self.send_replace(Some(route));
    }
}

/// Where a viewer lands: the login view without a session, otherwise the
/// dashboard for their role. Riders get the rider view, every other role the
/// client view.
pub fn landing_route(session: Option<&AuthenticatedSession>) -> Route {
    match session.map(|s| s.role) {
        None => Route::Login,
        Some(Role::Rider) => Route::RiderDashboard,
        Some(Role::Client | Role::Unknown) => Route::ClientDashboard,
    }
}

/// Resolve the generic dashboard entry point and redirect once.
pub async fn route_dashboard(sessions: &SessionStore, navigator: &dyn Navigator) -> Route {
    let route = landing_route(sessions.current().await.as_ref());
    tracing::debug!(route = %route, "Routing dashboard visitor");
    navigator.navigate(route);
    route
}
