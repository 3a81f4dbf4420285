//! Role-scoped dashboards that consume an established session.

pub mod client;
pub mod rider;
pub mod router;
pub mod trips;

pub use client::{ClientDashboard, ClientServices, ClientSummary, DeliveryDraft};
pub use rider::{LocationStatus, RiderDashboard, RiderServices, RiderSummary};
pub use router::{Navigator, Route, landing_route, route_dashboard};
pub use trips::{TripBoard, TripCounts};

use crate::api::AuthenticatedSession;
use crate::auth::SessionStore;
use crate::error::ApiError;

/// Blocking acknowledgement shown after a user-triggered action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Failure(String),
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self::Info(text.into())
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self::Failure(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Info(text) | Self::Failure(text) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// Fetch the current session, or send the viewer to the login view.
pub(crate) async fn require_session(
    sessions: &SessionStore,
    navigator: &dyn Navigator,
) -> Result<AuthenticatedSession, ApiError> {
    match sessions.current().await {
        Some(session) => Ok(session),
        None => {
            tracing::debug!("No session, redirecting to login");
            navigator.navigate(Route::Login);
            Err(ApiError::Unauthorized)
        }
    }
}

/// Log a failed background fetch and fall back to nothing.
pub(crate) fn ok_or_warn<T>(what: &str, result: Result<T, ApiError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load {what}");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub services shared by the dashboard tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::api::{
        ClientProfile, ClientService, Coordinates, NewTrip, PaymentAck, PaymentRequest,
        PaymentService, RiderProfile, RiderService, Role, Subscription, Trip, TripStatus, Wallet,
        WalletService,
    };

    pub fn trip(id: &str, status: TripStatus) -> Trip {
        Trip {
            id: id.into(),
            status,
            pickup_location: None,
            delivery_location: None,
            item_type: None,
            description: None,
            recipient_phone: None,
            delivery_fee: Decimal::ZERO,
            created_at: None,
        }
    }

    pub fn session(role: Role) -> AuthenticatedSession {
        AuthenticatedSession {
            phone: "0712345678".into(),
            role,
            name: Some("John Doe".into()),
            credential: SecretString::from("tok"),
        }
    }

    #[derive(Default)]
    pub struct RecordingNavigator {
        pub routes: Mutex<Vec<Route>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: Route) {
            self.routes.lock().unwrap().push(route);
        }
    }

    fn boom(endpoint: &str) -> ApiError {
        ApiError::Http {
            endpoint: endpoint.into(),
            status: 500,
            message: "boom".into(),
        }
    }

    /// In-memory backend for both roles.
    #[derive(Default)]
    pub struct StubBackend {
        pub trips: Mutex<Vec<Trip>>,
        pub balance: Decimal,
        pub subscription_active: bool,
        pub fail_actions: bool,
        pub fail_payment: bool,
        pub fail_wallet: bool,
        pub trip_fetches: AtomicUsize,
        pub profile_fetches: AtomicUsize,
        pub location_updates: AtomicUsize,
        pub payments: Mutex<Vec<PaymentRequest>>,
        pub created: Mutex<Vec<NewTrip>>,
    }

    impl StubBackend {
        fn set_status(&self, trip_id: &str, status: TripStatus) -> Result<Trip, ApiError> {
            if self.fail_actions {
                return Err(boom("/riders/trips"));
            }
            let mut trips = self.trips.lock().unwrap();
            let trip = trips
                .iter_mut()
                .find(|t| t.id == trip_id)
                .ok_or_else(|| boom("/riders/trips"))?;
            trip.status = status;
            Ok(trip.clone())
        }
    }

    #[async_trait]
    impl RiderService for StubBackend {
        async fn profile(
            &self,
            _: &SecretString,
            _: &CancellationToken,
        ) -> Result<RiderProfile, ApiError> {
            self.profile_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(RiderProfile {
                name: Some("John Doe".into()),
                subscription: Some(Subscription {
                    active: self.subscription_active,
                    expires_at: None,
                }),
                ..Default::default()
            })
        }

        async fn trips(&self, _: &SecretString, _: &CancellationToken) -> Result<Vec<Trip>, ApiError> {
            self.trip_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.trips.lock().unwrap().clone())
        }

        async fn update_location(
            &self,
            _: &SecretString,
            _: Coordinates,
            _: &CancellationToken,
        ) -> Result<(), ApiError> {
            self.location_updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_actions {
                Err(boom("/riders/location"))
            } else {
                Ok(())
            }
        }

        async fn accept_trip(
            &self,
            _: &SecretString,
            trip_id: &str,
            _: &CancellationToken,
        ) -> Result<Trip, ApiError> {
            self.set_status(trip_id, TripStatus::Accepted)
        }

        async fn complete_trip(
            &self,
            _: &SecretString,
            trip_id: &str,
            _: &CancellationToken,
        ) -> Result<Trip, ApiError> {
            self.set_status(trip_id, TripStatus::Completed)
        }
    }

    #[async_trait]
    impl ClientService for StubBackend {
        async fn profile(
            &self,
            _: &SecretString,
            _: &CancellationToken,
        ) -> Result<ClientProfile, ApiError> {
            self.profile_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(ClientProfile {
                name: Some("Jane".into()),
                phone: Some("0712345678".into()),
            })
        }

        async fn trips(&self, _: &SecretString, _: &CancellationToken) -> Result<Vec<Trip>, ApiError> {
            self.trip_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.trips.lock().unwrap().clone())
        }

        async fn create_trip(
            &self,
            _: &SecretString,
            new_trip: &NewTrip,
            _: &CancellationToken,
        ) -> Result<Trip, ApiError> {
            if self.fail_actions {
                return Err(boom("/clients/trips"));
            }
            self.created.lock().unwrap().push(new_trip.clone());
            let mut trips = self.trips.lock().unwrap();
            let created = trip(&format!("new-{}", trips.len()), TripStatus::Pending);
            trips.push(created.clone());
            Ok(created)
        }
    }

    #[async_trait]
    impl WalletService for StubBackend {
        async fn wallet(&self, _: &SecretString, _: &CancellationToken) -> Result<Wallet, ApiError> {
            if self.fail_wallet {
                return Err(boom("/wallet"));
            }
            Ok(Wallet {
                balance: self.balance,
                transactions: Vec::new(),
            })
        }
    }

    #[async_trait]
    impl PaymentService for StubBackend {
        async fn initiate_payment(
            &self,
            _: &SecretString,
            request: &PaymentRequest,
            _: &CancellationToken,
        ) -> Result<PaymentAck, ApiError> {
            self.payments.lock().unwrap().push(request.clone());
            if self.fail_payment {
                Err(boom("/mpesa/initiate"))
            } else {
                Ok(PaymentAck::default())
            }
        }
    }

    pub fn fetches(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{RecordingNavigator, session};
    use super::*;
    use crate::api::Role;

    #[tokio::test]
    async fn require_session_redirects_when_missing() {
        let sessions = SessionStore::new();
        let navigator = RecordingNavigator::default();

        let err = require_session(&sessions, &navigator).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(*navigator.routes.lock().unwrap(), vec![Route::Login]);

        sessions.establish(session(Role::Rider)).await;
        assert!(require_session(&sessions, &navigator).await.is_ok());
        assert_eq!(navigator.routes.lock().unwrap().len(), 1);
    }

    #[test]
    fn notice_accessors() {
        let notice = Notice::failure("Payment failed. Please try again.");
        assert!(notice.is_failure());
        assert_eq!(notice.text(), "Payment failed. Please try again.");
        assert!(!Notice::info("ok").is_failure());
    }
}
